pub use crate::audio::StereoFrame;
use crate::pipeline::project::{FilterParams, VoiceParams};

// Everything the engine needs to start one note. The voice parameters ride
// along as a whole record so the audio side never sees a half-applied edit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerParams {
    pub voice: usize,
    pub frequency: f32,
    pub duration: f64, // seconds until release starts
    pub at: f64,       // absolute time on the audio clock, seconds
    pub params: VoiceParams,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    // queued and fired at `at`, sample-accurate
    Trigger(TriggerParams),

    // drop everything queued and fade all voices out now
    StopAll,

    // applies on the next block
    SetFilter(FilterParams),
}

// The transport's view of the audio side: a clock to schedule against and a
// fire-and-forget command sink. The cpal handle implements it; so do test doubles.
pub trait AudioOut {
    fn now(&self) -> f64;
    fn send(&self, cmd: AudioCommand);
}
