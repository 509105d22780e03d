use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};

use super::grid::draw_step_strip;
use super::mode::TuiState;
use crate::shared::{DisplayState, NUM_VOICES, STEPS_PER_BAR};

const HELP: &str =
    "[Space] Play  [,.<>] BPM  [[ ]] Loop start  [- =] Loop end  [1-3] Voice  [w] Wave  [f] Filter  \
     [p] Preview  [0] Clear  [t] Type  [j k] Cutoff  [u i] Res  [q] Quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let bars = state.step_has_note.len().div_ceil(STEPS_PER_BAR) as u16;
    let help_height = if ts.show_help { 3 } else { 0 };
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                // transport line
            Constraint::Length(NUM_VOICES as u16 + 3), // voices + filter
            Constraint::Length(bars + 2),         // step strip
            Constraint::Min(0),
            Constraint::Length(help_height),
        ])
        .split(area);

    draw_transport(frame, sections[0], state);
    draw_voices(frame, sections[1], state);

    let strip = Block::default().borders(Borders::ALL).title("steps");
    let inner = strip.inner(sections[2]);
    frame.render_widget(strip, sections[2]);
    draw_step_strip(frame, inner, &state.step_has_note, state.current_beat, (state.loop_start, state.loop_end));

    if ts.show_help {
        let help = Paragraph::new(HELP).block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, sections[4]);
    }
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let status = if state.playing { "PLAYING" } else { "STOPPED" };
    let beat = state
        .current_beat
        .map(|b| format!("{}.{:02}", b / STEPS_PER_BAR + 1, b % STEPS_PER_BAR + 1))
        .unwrap_or_else(|| "-.--".to_string());
    let text = format!(
        "{status}  {} BPM  loop {}-{}  pos {beat}  notes {}  {}",
        state.bpm, state.loop_start, state.loop_end, state.note_count, state.status
    );
    let style = if state.playing { Style::default().fg(Color::LightMagenta) } else { Style::default() };
    let header = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("sidgrid"));
    frame.render_widget(header, area);
}

fn draw_voices(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut rows: Vec<Row> = state
        .voice_labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let marker = if i == state.selected_voice as usize { ">" } else { " " };
            let row = Row::new([marker.to_string(), format!("V{}", i + 1), label.clone()]);
            if i == state.selected_voice as usize { row.bold() } else { row }
        })
        .collect();
    rows.push(Row::new([String::new(), "FLT".to_string(), state.filter_label.clone()]));

    let table = Table::new(rows, [Constraint::Length(2), Constraint::Length(4), Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title("voices"));
    frame.render_widget(table, area);
}
