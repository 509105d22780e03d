// state local to the tui; synced from DisplayState every loop so key
// resolution can depend on what the console currently shows
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub playing: bool,
    pub selected_voice: u8,
    // flips on '?' so the key help row can be hidden on small terminals
    pub show_help: bool,
}
