// the project record the persistence side reads and writes; everything here is plain data

use serde::{Deserialize, Serialize};

use crate::pipeline::grid::Grid;
use crate::shared::{DEFAULT_BPM, DEFAULT_STEPS, MAX_BPM, MIN_BPM, NUM_VOICES, STEPS_PER_BAR};

pub const MIN_ENV_SECS: f32 = 0.001;
pub const MAX_ENV_SECS: f32 = 2.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Pulse,
    Sawtooth,
    Triangle,
    Noise,
}

impl Waveform {
    pub fn next(self) -> Self {
        match self {
            Waveform::Pulse => Waveform::Sawtooth,
            Waveform::Sawtooth => Waveform::Triangle,
            Waveform::Triangle => Waveform::Noise,
            Waveform::Noise => Waveform::Pulse,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Waveform::Pulse => "PULSE",
            Waveform::Sawtooth => "SAW",
            Waveform::Triangle => "TRI",
            Waveform::Noise => "NOISE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceParams {
    pub waveform: Waveform,
    pub pulse_width: f32, // only read by the pulse oscillator
    pub attack: f32,      // seconds
    pub decay: f32,
    pub sustain: f32, // level, 0..1
    pub release: f32,
    pub use_filter: bool,
    pub ring_mod: bool,
    pub sync: bool,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Pulse,
            pulse_width: 0.5,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.6,
            release: 0.2,
            use_filter: false,
            ring_mod: false,
            sync: false,
        }
    }
}

// one typed setter instead of matching on parameter name strings
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoiceParam {
    Waveform(Waveform),
    PulseWidth(f32),
    Attack(f32),
    Decay(f32),
    Sustain(f32),
    Release(f32),
    UseFilter(bool),
    RingMod(bool),
    Sync(bool),
}

impl VoiceParams {
    pub fn set(&mut self, param: VoiceParam) {
        match param {
            VoiceParam::Waveform(w) => self.waveform = w,
            VoiceParam::PulseWidth(v) => self.pulse_width = clamp_unit(v),
            VoiceParam::Attack(v) => self.attack = clamp_env_secs(v),
            VoiceParam::Decay(v) => self.decay = clamp_env_secs(v),
            VoiceParam::Sustain(v) => self.sustain = clamp_unit(v),
            VoiceParam::Release(v) => self.release = clamp_env_secs(v),
            VoiceParam::UseFilter(b) => self.use_filter = b,
            VoiceParam::RingMod(b) => self.ring_mod = b,
            VoiceParam::Sync(b) => self.sync = b,
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn clamp_env_secs(v: f32) -> f32 {
    if v.is_nan() { MIN_ENV_SECS } else { v.clamp(MIN_ENV_SECS, MAX_ENV_SECS) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Bandpass,
    Highpass,
}

impl FilterType {
    pub fn next(self) -> Self {
        match self {
            FilterType::Lowpass => FilterType::Bandpass,
            FilterType::Bandpass => FilterType::Highpass,
            FilterType::Highpass => FilterType::Lowpass,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterType::Lowpass => "LP",
            FilterType::Bandpass => "BP",
            FilterType::Highpass => "HP",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    #[serde(rename = "type")]
    pub kind: FilterType,
    pub cutoff: f32,    // 0..100, log-mapped to 20 Hz..20 kHz
    pub resonance: f32, // 0..100, linear to Q 0.5..20
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            kind: FilterType::Lowpass,
            cutoff: 70.0,
            resonance: 10.0,
        }
    }
}

impl FilterParams {
    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff = clamp_percent(cutoff);
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        self.resonance = clamp_percent(resonance);
    }

    /// Cutoff knob position mapped onto 20 Hz .. 20 kHz.
    pub fn cutoff_hz(&self) -> f32 {
        20.0 * 1000f32.powf(clamp_percent(self.cutoff) / 100.0)
    }

    pub fn q(&self) -> f32 {
        0.5 + clamp_percent(self.resonance) / 100.0 * 19.5
    }
}

fn clamp_percent(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub bpm: u32,
    pub voices: [VoiceParams; NUM_VOICES],
    pub filter: FilterParams,
    pub grid: Grid,

    // not part of the minimal interchange record, older files simply lack them
    #[serde(default = "default_loop_start")]
    pub loop_start: usize,
    #[serde(default = "default_loop_end")]
    pub loop_end: usize,
}

fn default_loop_start() -> usize {
    1
}

fn default_loop_end() -> usize {
    DEFAULT_STEPS / STEPS_PER_BAR
}

impl Default for Project {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            voices: [
                VoiceParams::default(),
                VoiceParams { waveform: Waveform::Sawtooth, ..VoiceParams::default() },
                VoiceParams { waveform: Waveform::Triangle, ..VoiceParams::default() },
            ],
            filter: FilterParams::default(),
            grid: Grid::default(),
            loop_start: default_loop_start(),
            loop_end: default_loop_end(),
        }
    }
}

impl Project {
    pub fn clamp_bpm(bpm: i64) -> u32 {
        bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32
    }

    pub fn set_voice_param(&mut self, voice: usize, param: VoiceParam) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.set(param);
        }
    }
}
