// A short pattern that exercises every voice: pulse bass, saw arpeggio ring
// modulated against the bass, filtered noise hats.

use crate::pipeline::grid::Grid;
use crate::pipeline::project::{FilterType, Project, VoiceParam, Waveform};
use crate::shared::{DEFAULT_STEPS, STEPS_PER_BAR};

// rows counted down from C6
const BASS_ROWS: [usize; 4] = [33, 33, 29, 31]; // A3 A3 F3 G3 (one per bar)
const ARP: [usize; 4] = [12, 8, 5, 0]; // C5 E5 G5 C6
const HAT_ROW: usize = 0;

pub fn demo_project() -> Project {
    let mut project = Project { grid: Grid::new(DEFAULT_STEPS), ..Project::default() };

    project.set_voice_param(0, VoiceParam::Waveform(Waveform::Pulse));
    project.set_voice_param(0, VoiceParam::PulseWidth(0.25));
    project.set_voice_param(1, VoiceParam::Waveform(Waveform::Sawtooth));
    project.set_voice_param(1, VoiceParam::Sustain(0.4));
    project.set_voice_param(2, VoiceParam::Waveform(Waveform::Noise));
    project.set_voice_param(2, VoiceParam::Decay(0.05));
    project.set_voice_param(2, VoiceParam::Sustain(0.0));
    project.set_voice_param(2, VoiceParam::UseFilter(true));
    project.filter.kind = FilterType::Highpass;
    project.filter.set_cutoff(70.0);

    let grid = &mut project.grid;
    for (bar, &row) in BASS_ROWS.iter().enumerate() {
        let start = bar * STEPS_PER_BAR;
        // these spans are disjoint by construction, so Err can't happen
        let _ = grid.place(0, row, start, 6);
        let _ = grid.place(0, row, start + 8, 6);
    }
    for col in (0..DEFAULT_STEPS).step_by(2) {
        let row = ARP[(col / 2) % ARP.len()];
        let _ = grid.place(1, row, col, 1);
    }
    for col in (2..DEFAULT_STEPS).step_by(4) {
        let _ = grid.place(2, HAT_ROW, col, 1);
    }
    project
}
