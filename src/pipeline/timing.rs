//! Pitch table and step timing.
//!
//! Real-time playback, offline export and note preview all go through these
//! functions, so a note sounds the same length and pitch on every path.

use crate::shared::{PITCH_ROWS, STEPS_PER_BAR};

/// MIDI note of row 0 (C6). Each row below is one semitone lower.
pub const TOP_ROW_NOTE: i32 = 84;

/// Fraction of a note's nominal length that actually sounds, leaving a small
/// gap so back-to-back notes of the same pitch re-attack cleanly.
pub const DEFAULT_MARGIN_FACTOR: f64 = 0.95;

pub fn midi_note(row: usize) -> Option<i32> {
    (row < PITCH_ROWS).then(|| TOP_ROW_NOTE - row as i32)
}

pub fn frequency(row: usize) -> Option<f32> {
    midi_note(row).map(|note| 440.0 * 2f32.powf((note - 69) as f32 / 12.0))
}

pub fn note_name(row: usize) -> Option<String> {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    midi_note(row).map(|note| format!("{}{}", NAMES[note.rem_euclid(12) as usize], note.div_euclid(12) - 1))
}

/// One sixteenth note at the given tempo.
pub fn seconds_per_step(bpm: u32) -> f64 {
    60.0 / bpm.max(1) as f64 / 4.0
}

pub fn note_duration(length: usize, bpm: u32, margin: f64) -> f64 {
    length as f64 * seconds_per_step(bpm) * margin
}

pub fn bar_to_step(bar: usize) -> usize {
    bar.saturating_sub(1) * STEPS_PER_BAR
}
