use std::collections::VecDeque;

use tracing::trace;

use super::filter::SharedFilter;
use super::frame::StereoFrame;
use super::oscillator::NoiseTable;
use super::voice::Voice;
use crate::audio_api::{AudioCommand, TriggerParams};
use crate::config::Config;
use crate::pipeline::project::FilterParams;
use crate::shared::NUM_VOICES;

const QUEUE_CAPACITY: usize = 1024; // reserved up front so pushes don't malloc in the audio callback

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    frame: u64,
    trigger: TriggerParams,
}

// The synth: three voices, the shared filter and a time-ordered queue of
// pending triggers. It counts absolute frames from its creation, which is the
// audio clock for live playback and the virtual clock for offline renders.
pub struct Synth {
    sample_rate: f32,
    voices: [Voice; NUM_VOICES],
    filter: SharedFilter,
    noise: NoiseTable,
    queue: VecDeque<Scheduled>,
    frame: u64,
}

impl Synth {
    pub fn new(sample_rate: u32, filter: FilterParams, config: &Config) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            sample_rate,
            voices: std::array::from_fn(|_| Voice::new(sample_rate, config.voice_peak, config.fade_secs)),
            filter: SharedFilter::new(filter, sample_rate),
            noise: NoiseTable::new(),
            queue: VecDeque::with_capacity(QUEUE_CAPACITY),
            frame: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_silent(&self) -> bool {
        self.queue.is_empty() && self.voices.iter().all(Voice::is_silent)
    }

    pub fn seconds_to_frame(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.sample_rate as f64).round() as u64
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Trigger(t) => self.schedule(t),
            AudioCommand::StopAll => self.stop_all(),
            AudioCommand::SetFilter(params) => self.filter.apply(params),
        }
    }

    fn schedule(&mut self, trigger: TriggerParams) {
        if trigger.voice >= NUM_VOICES {
            return;
        }
        // late arrivals play on the next frame rather than never
        let frame = self.seconds_to_frame(trigger.at).max(self.frame);
        let pos = self.queue.partition_point(|s| s.frame <= frame);
        self.queue.insert(pos, Scheduled { frame, trigger });
    }

    fn stop_all(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        for voice in &mut self.voices {
            voice.stop(self.frame);
        }
        trace!(dropped, frame = self.frame, "synth stopped");
    }

    fn fire_due(&mut self) {
        while let Some(next) = self.queue.front() {
            if next.frame > self.frame {
                break;
            }
            let Some(Scheduled { trigger: t, .. }) = self.queue.pop_front() else {
                break;
            };
            self.voices[t.voice].trigger(self.frame, t.frequency, t.duration, &t.params);
        }
    }

    fn next_sample(&mut self) -> f32 {
        self.fire_due();

        // voice i is modulated by voice i-1 (wrapping), like the chip
        let msb: [bool; NUM_VOICES] = std::array::from_fn(|i| self.voices[i].msb());
        let mut dry = 0.0f32;
        let mut wet = 0.0f32;
        for (i, voice) in self.voices.iter_mut().enumerate() {
            let out = voice.render(self.frame, &self.noise, msb[modulator(i)]);
            dry += out.dry;
            wet += out.filtered;
        }

        let wrapped: [bool; NUM_VOICES] = std::array::from_fn(|i| self.voices[i].advance());
        for i in 0..NUM_VOICES {
            if wrapped[modulator(i)] {
                self.voices[i].hard_sync();
            }
        }

        self.frame += 1;
        (dry + self.filter.process(wet)).clamp(-1.0, 1.0)
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            let s = self.next_sample();
            *frame = StereoFrame::mono(s);
        }
    }
}

fn modulator(voice: usize) -> usize {
    (voice + NUM_VOICES - 1) % NUM_VOICES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::project::{VoiceParams, Waveform};

    fn synth() -> Synth {
        Synth::new(1000, FilterParams::default(), &Config::default())
    }

    fn trigger(voice: usize, at: f64) -> AudioCommand {
        AudioCommand::Trigger(TriggerParams {
            voice,
            frequency: 50.0,
            duration: 0.5,
            at,
            params: VoiceParams::default(),
        })
    }

    fn render(s: &mut Synth, n: usize) -> Vec<f32> {
        let mut buf = vec![StereoFrame::zero(); n];
        s.render_block(&mut buf);
        buf.iter().map(|f| f.left).collect()
    }

    #[test]
    fn trigger_starts_on_its_frame() {
        let mut s = synth();
        s.handle_cmd(trigger(0, 0.1));
        let out = render(&mut s, 200);
        assert!(out[..101].iter().all(|&x| x == 0.0));
        assert!(out[101..].iter().any(|&x| x != 0.0));
    }

    #[test]
    fn queue_stays_time_ordered() {
        let mut s = synth();
        s.handle_cmd(trigger(1, 0.3));
        s.handle_cmd(trigger(0, 0.1));
        s.handle_cmd(trigger(2, 0.2));
        let frames: Vec<u64> = s.queue.iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![100, 200, 300]);
    }

    #[test]
    fn stop_all_cancels_pending_and_fades() {
        let mut s = synth();
        s.handle_cmd(trigger(0, 0.0));
        s.handle_cmd(trigger(1, 0.5));
        render(&mut s, 100);
        s.handle_cmd(AudioCommand::StopAll);
        assert_eq!(s.pending(), 0);
        // 20 ms fade at 1 kHz
        render(&mut s, 25);
        assert!(s.is_silent());
        assert!(render(&mut s, 600).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn out_of_range_voice_is_ignored() {
        let mut s = synth();
        s.handle_cmd(trigger(7, 0.0));
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn three_voices_at_peak_stay_below_full_scale() {
        let mut s = synth();
        for v in 0..NUM_VOICES {
            s.handle_cmd(trigger(v, 0.0));
        }
        let out = render(&mut s, 500);
        let peak = out.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak > 0.8 && peak <= 0.9 + 1e-6, "peak {peak}");
    }

    // power-of-two rate and pitches keep every phase step exact
    const SR2: u32 = 1024;

    fn note(voice: usize, frequency: f32, params: VoiceParams) -> AudioCommand {
        AudioCommand::Trigger(TriggerParams { voice, frequency, duration: 1.0, at: 0.0, params })
    }

    #[test]
    fn sync_follows_the_previous_voice() {
        let mut s = Synth::new(SR2, FilterParams::default(), &Config::default());
        let synced = VoiceParams { waveform: Waveform::Sawtooth, sync: true, ..VoiceParams::default() };
        s.handle_cmd(note(0, 128.0, VoiceParams::default())); // wraps every 8 frames
        s.handle_cmd(note(1, 32.0, synced));
        s.handle_cmd(note(2, 32.0, synced));

        render(&mut s, 8);
        assert_eq!(s.voices[1].phase(), Some(0.0));
        render(&mut s, 4);
        assert_eq!(s.voices[0].phase(), Some(0.5));
        assert_eq!(s.voices[1].phase(), Some(0.125));
        // voice 2 listens to voice 1, which never gets to wrap
        assert_eq!(s.voices[2].phase(), Some(0.375));
    }

    #[test]
    fn sync_off_runs_free() {
        let mut s = Synth::new(SR2, FilterParams::default(), &Config::default());
        let saw = VoiceParams { waveform: Waveform::Sawtooth, ..VoiceParams::default() };
        s.handle_cmd(note(0, 128.0, VoiceParams::default()));
        s.handle_cmd(note(1, 32.0, saw));
        render(&mut s, 12);
        assert_eq!(s.voices[1].phase(), Some(0.375));
    }

    #[test]
    fn ring_mod_keys_off_the_previous_voice() {
        let run = |ring_mod: bool| {
            let mut s = Synth::new(SR2, FilterParams::default(), &Config::default());
            s.handle_cmd(note(0, 64.0, VoiceParams::default())); // upper half on frames 8..16 of 16
            s.handle_cmd(note(1, 128.0, VoiceParams::default())); // upper half on frames 4..8 of 8
            // 1 Hz pulse: a flat positive level for the whole window
            s.handle_cmd(note(2, 1.0, VoiceParams { ring_mod, ..VoiceParams::default() }));
            render(&mut s, 64)
        };
        let plain = run(false);
        let ringed = run(true);
        for n in 1..64 {
            let flipped = ringed[n] != plain[n];
            assert_eq!(flipped, n % 8 >= 4, "frame {n}");
        }
    }
}
