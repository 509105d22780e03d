use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::TuiState;
use crate::shared::InputEvent;

const CUTOFF_STEP: f32 = 5.0;
const RESONANCE_STEP: f32 = 5.0;

// poll for one key within `timeout` and resolve it into input events
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

pub(crate) fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::TogglePlay],

        // tempo, shifted for coarse steps
        KeyCode::Char(',') => vec![InputEvent::AdjustBpm(-1)],
        KeyCode::Char('.') => vec![InputEvent::AdjustBpm(1)],
        KeyCode::Char('<') => vec![InputEvent::AdjustBpm(-10)],
        KeyCode::Char('>') => vec![InputEvent::AdjustBpm(10)],

        // loop region in bars
        KeyCode::Char('[') => vec![InputEvent::AdjustLoopStart(-1)],
        KeyCode::Char(']') => vec![InputEvent::AdjustLoopStart(1)],
        KeyCode::Char('-') => vec![InputEvent::AdjustLoopEnd(-1)],
        KeyCode::Char('=') => vec![InputEvent::AdjustLoopEnd(1)],

        KeyCode::Char(c @ ('1' | '2' | '3')) => {
            let voice = c as u8 - b'1';
            ts.selected_voice = voice;
            vec![InputEvent::SelectVoice(voice)]
        }
        KeyCode::Char('w') => vec![InputEvent::CycleWaveform],
        KeyCode::Char('f') => vec![InputEvent::ToggleVoiceFilter],
        // previewing while the loop runs just stacks on the voice; allowed
        KeyCode::Char('p') => vec![InputEvent::PreviewNote],
        KeyCode::Char('0') => vec![InputEvent::ClearVoice],

        KeyCode::Char('t') => vec![InputEvent::CycleFilterType],
        KeyCode::Char('j') => vec![InputEvent::AdjustCutoff(-CUTOFF_STEP)],
        KeyCode::Char('k') => vec![InputEvent::AdjustCutoff(CUTOFF_STEP)],
        KeyCode::Char('u') => vec![InputEvent::AdjustResonance(-RESONANCE_STEP)],
        KeyCode::Char('i') => vec![InputEvent::AdjustResonance(RESONANCE_STEP)],

        KeyCode::Char('?') => {
            ts.show_help = !ts.show_help;
            vec![]
        }

        _ => vec![],
    }
}
