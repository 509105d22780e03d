use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::Block;

use crate::shared::STEPS_PER_BAR;

// one row per bar, one cell per step; the playhead and the loop region are
// coloured on top of the note markers
pub fn draw_step_strip(
    frame: &mut Frame,
    area: Rect,
    step_has_note: &[bool],
    current_beat: Option<usize>,
    loop_bars: (usize, usize),
) {
    let bars = step_has_note.len().div_ceil(STEPS_PER_BAR);
    if bars == 0 {
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); bars])
        .split(area);
    let loop_steps = loop_bars.0.saturating_sub(1) * STEPS_PER_BAR..loop_bars.1 * STEPS_PER_BAR;

    for (bar, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, STEPS_PER_BAR as u32); STEPS_PER_BAR])
            .split(*row_area);

        for (i, cell_area) in cols.iter().enumerate() {
            let step = bar * STEPS_PER_BAR + i;
            let Some(&has_note) = step_has_note.get(step) else {
                continue;
            };
            let style = if current_beat == Some(step) {
                Style::default().bg(Color::LightMagenta)
            } else if has_note {
                Style::default().bg(Color::Magenta)
            } else if loop_steps.contains(&step) {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default().bg(Color::Black)
            };
            frame.render_widget(Block::default().style(style), *cell_area);
        }
    }
}
