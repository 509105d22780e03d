use super::oscillator::{NoiseTable, Oscillator};
use crate::pipeline::project::VoiceParams;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

// Piecewise-linear ADSR laid out in frames from the trigger point:
// 0 -> peak over attack, peak -> sustain*peak over decay, hold until
// release_at, then whatever level we reached -> 0 over release.
#[derive(Clone, Copy, Debug)]
pub struct Envelope {
    attack: u64,
    decay: u64,
    sustain: f32, // absolute level, already scaled by peak
    release: u64,
    release_at: u64,
    peak: f32,
}

impl Envelope {
    pub fn new(params: &VoiceParams, duration_secs: f64, peak: f32, sample_rate: f32) -> Self {
        let frames = |secs: f64| ((secs.max(0.0) * sample_rate as f64).round() as u64).max(1);
        Self {
            attack: frames(params.attack as f64),
            decay: frames(params.decay as f64),
            sustain: params.sustain.clamp(0.0, 1.0) * peak,
            release: frames(params.release as f64),
            release_at: (duration_secs.max(0.0) * sample_rate as f64).round() as u64,
            peak,
        }
    }

    fn held_level(&self, t: u64) -> f32 {
        if t < self.attack {
            self.peak * t as f32 / self.attack as f32
        } else if t < self.attack + self.decay {
            lerp(self.peak, self.sustain, (t - self.attack) as f32 / self.decay as f32)
        } else {
            self.sustain
        }
    }

    /// Level `t` frames after the trigger; `None` once the release has run out.
    pub fn level(&self, t: u64) -> Option<f32> {
        if t < self.release_at {
            return Some(self.held_level(t));
        }
        let into_release = t - self.release_at;
        if into_release >= self.release {
            return None;
        }
        let from = self.held_level(self.release_at);
        Some(from * (1.0 - into_release as f32 / self.release as f32))
    }

    pub fn total_frames(&self) -> u64 {
        self.release_at + self.release
    }
}

#[derive(Clone, Copy, Debug)]
struct Fade {
    start: u64,
    from: f32,
    len: u64,
}

impl Fade {
    fn gain(&self, now: u64) -> Option<f32> {
        let t = now.saturating_sub(self.start);
        (t < self.len).then(|| self.from * (1.0 - t as f32 / self.len as f32))
    }
}

// One sounding note. Its routing flags are frozen at trigger time so
// parameter edits never reach a note that's already playing.
#[derive(Clone, Copy, Debug)]
struct SoundInstance {
    osc: Oscillator,
    env: Envelope,
    start: u64,
    fade: Option<Fade>,
    use_filter: bool,
    ring_mod: bool,
    sync: bool,
}

impl SoundInstance {
    fn gain(&self, now: u64) -> Option<f32> {
        match self.fade {
            Some(fade) => fade.gain(now),
            None => self.env.level(now.saturating_sub(self.start)),
        }
    }

    fn retire(&mut self, now: u64, fade_frames: u64) {
        if self.fade.is_some() {
            return; // already on its way out
        }
        let from = self.gain(now).unwrap_or(0.0);
        self.fade = Some(Fade { start: now, from, len: fade_frames });
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoiceOutput {
    pub dry: f32,
    pub filtered: f32,
}

// Retired notes that may still be fading at once. Retriggers faster than the
// fade window fill these; past that the quietest fade is dropped.
const MAX_RETIRING: usize = 4;

// Monophonic: one active note, plus retired notes still fading out.
#[derive(Clone, Debug)]
pub struct Voice {
    sample_rate: f32,
    peak: f32,
    fade_frames: u64,
    active: Option<SoundInstance>,
    retiring: [Option<SoundInstance>; MAX_RETIRING],
}

impl Voice {
    pub fn new(sample_rate: f32, peak: f32, fade_secs: f32) -> Self {
        Self {
            sample_rate,
            peak,
            fade_frames: ((fade_secs * sample_rate).round() as u64).max(1),
            active: None,
            retiring: [None; MAX_RETIRING],
        }
    }

    pub fn trigger(&mut self, now: u64, frequency: f32, duration_secs: f64, params: &VoiceParams) {
        self.stop(now);
        let osc = Oscillator::new(params.waveform, frequency, params.pulse_width, self.sample_rate);
        self.active = Some(SoundInstance {
            osc,
            env: Envelope::new(params, duration_secs, self.peak, self.sample_rate),
            start: now,
            fade: None,
            use_filter: params.use_filter,
            ring_mod: params.ring_mod,
            sync: params.sync,
        });
    }

    /// Fade whatever is playing to zero over the fade window, whatever phase
    /// its envelope is in.
    pub fn stop(&mut self, now: u64) {
        let Some(mut inst) = self.active.take() else {
            return;
        };
        inst.retire(now, self.fade_frames);
        let slot = match self.retiring.iter().position(|r| r.is_none_or(|r| r.gain(now).is_none())) {
            Some(free) => free,
            None => self.quietest_retiring(now),
        };
        self.retiring[slot] = Some(inst);
    }

    fn quietest_retiring(&self, now: u64) -> usize {
        let gain = |i: usize| self.retiring[i].and_then(|r| r.gain(now)).unwrap_or(0.0);
        (1..MAX_RETIRING).fold(0, |best, i| if gain(i) < gain(best) { i } else { best })
    }

    pub fn is_silent(&self) -> bool {
        self.active.is_none() && self.retiring.iter().all(Option::is_none)
    }

    pub fn is_sounding(&self) -> bool {
        self.active.is_some()
    }

    // ring mod / sync source for the next voice over
    pub fn msb(&self) -> bool {
        self.active.is_some_and(|inst| inst.osc.msb())
    }

    /// Produce this voice's sample at `now`. `ring` is the modulating voice's
    /// upper-half flag.
    pub fn render(&mut self, now: u64, noise: &NoiseTable, ring: bool) -> VoiceOutput {
        let mut out = VoiceOutput::default();
        for slot in std::iter::once(&mut self.active).chain(self.retiring.iter_mut()) {
            let Some(inst) = slot.as_mut() else {
                continue;
            };
            let Some(gain) = inst.gain(now) else {
                *slot = None;
                continue;
            };
            let mut s = inst.osc.sample(noise) * gain;
            if inst.ring_mod && ring {
                s = -s;
            }
            if inst.use_filter {
                out.filtered += s;
            } else {
                out.dry += s;
            }
        }
        out
    }

    /// Step the oscillators one frame. Returns true if the active note's phase wrapped.
    pub fn advance(&mut self) -> bool {
        for inst in self.retiring.iter_mut().flatten() {
            inst.osc.advance();
        }
        self.active.as_mut().is_some_and(|inst| inst.osc.advance())
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Option<f32> {
        self.active.map(|inst| inst.osc.phase())
    }

    pub fn hard_sync(&mut self) {
        if let Some(inst) = self.active.as_mut().filter(|inst| inst.sync) {
            inst.osc.reset_phase();
        }
    }
}
