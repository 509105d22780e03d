// The current input plan for the transport console:
//
// Transport:
//   Space         //  TogglePlay
//   , / .         //  AdjustBpm(-1 or +1), shift for -10 / +10
//   [ / ]         //  AdjustLoopStart(-1 or +1)
//   - / =         //  AdjustLoopEnd(-1 or +1)
//
// Voices:
//   1 2 3         //  SelectVoice(0 ..= 2)
//   w             //  CycleWaveform for the selected voice
//   f             //  ToggleVoiceFilter for the selected voice
//   p             //  PreviewNote (selected voice, middle row)
//   0             //  ClearVoice, wipes the selected voice's notes
//
// Shared filter:
//   t             //  CycleFilterType
//   j / k         //  AdjustCutoff(-5 or +5)
//   u / i         //  AdjustResonance(-5 or +5)
//
// Quit:
//   Esc / q       //  Quit
//
// Same idea as before: the middle layer owns the project and transport state,
// the TUI only turns keys into InputEvents and draws whatever DisplayState says.

pub const NUM_VOICES: usize = 3;
pub const PITCH_ROWS: usize = 37;
pub const DEFAULT_STEPS: usize = 64; // four bars of sixteenths
pub const STEPS_PER_BAR: usize = 16;

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const DEFAULT_BPM: u32 = 120;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    TogglePlay,
    AdjustBpm(i32),
    AdjustLoopStart(i32),
    AdjustLoopEnd(i32),

    SelectVoice(u8),
    CycleWaveform,
    ToggleVoiceFilter,
    PreviewNote,
    ClearVoice,

    CycleFilterType,
    AdjustCutoff(f32),
    AdjustResonance(f32),

    Quit,
}

// what the console draws every frame, nothing more
#[derive(Clone, Debug)]
pub struct DisplayState {
    pub playing: bool,
    pub bpm: u32,
    pub loop_start: usize, // bars, 1-based
    pub loop_end: usize,   // bars, inclusive
    pub current_beat: Option<usize>, // last beat that actually sounded
    pub selected_voice: u8,
    pub voice_labels: [String; NUM_VOICES],
    pub filter_label: String,
    pub note_count: usize,
    pub step_has_note: Vec<bool>, // one per grid column, any voice
    pub status: String, // last message worth showing (export done, audio error, ...)
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            playing: false,
            bpm: DEFAULT_BPM,
            loop_start: 1,
            loop_end: DEFAULT_STEPS / STEPS_PER_BAR,
            current_beat: None,
            selected_voice: 0,
            voice_labels: std::array::from_fn(|_| String::new()),
            filter_label: String::new(),
            note_count: 0,
            step_has_note: vec![false; DEFAULT_STEPS],
            status: String::new(),
        }
    }
}
