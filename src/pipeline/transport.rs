//! Look-ahead playback scheduler.
//!
//! The transport never plays anything itself. Each tick it looks at the audio
//! clock, and every step whose start falls inside the look-ahead window is sent
//! to the synth as triggers stamped with the step's exact time. The tick only
//! has to run often enough to keep the window filled; timing accuracy comes
//! from the timestamps, not from when the tick happens to run.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::audio_api::{AudioCommand, AudioOut, TriggerParams};
use crate::config::Config;
use crate::pipeline::project::Project;
use crate::pipeline::timing::{bar_to_step, frequency, note_duration, seconds_per_step};
use crate::shared::STEPS_PER_BAR;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    // a step started sounding; fired at its scheduled time, not when it was queued
    Beat(usize),
    Stopped,
}

pub struct Transport {
    state: TransportState,
    bpm: u32,
    loop_start: usize, // bars, 1-based
    loop_end: usize,   // bars, inclusive
    total_bars: usize,
    current_beat: usize,
    // beat times are anchor + n * step so live playback lands on the same
    // frames as an export; bpm changes and stalls start a new anchor
    anchor_time: f64,
    beats_since_anchor: u64,
    next_beat_time: f64,
    lookahead: f64,
    margin: f64,
    pending_beats: VecDeque<(f64, usize)>,
    stop_pending: bool,
}

impl Transport {
    pub fn new(project: &Project, config: &Config) -> Self {
        let total_bars = project.grid.total_bars();
        let loop_start = project.loop_start.clamp(1, total_bars);
        let loop_end = project.loop_end.clamp(loop_start, total_bars);
        Self {
            state: TransportState::Stopped,
            bpm: Project::clamp_bpm(project.bpm as i64),
            loop_start,
            loop_end,
            total_bars,
            current_beat: bar_to_step(loop_start),
            anchor_time: 0.0,
            beats_since_anchor: 0,
            next_beat_time: 0.0,
            lookahead: config.lookahead_secs.max(0.0),
            margin: config.margin_factor,
            pending_beats: VecDeque::new(),
            stop_pending: false,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    pub fn loop_end(&self) -> usize {
        self.loop_end
    }

    pub fn current_beat(&self) -> usize {
        self.current_beat
    }

    pub fn next_beat_time(&self) -> f64 {
        self.next_beat_time
    }

    pub fn loop_start_beat(&self) -> usize {
        bar_to_step(self.loop_start)
    }

    pub fn loop_end_beat(&self) -> usize {
        self.loop_end * STEPS_PER_BAR
    }

    pub fn seconds_per_beat(&self) -> f64 {
        seconds_per_step(self.bpm)
    }

    /// Start from the loop start, anchored to the audio clock's present.
    /// Schedules the first window straight away.
    pub fn play(&mut self, out: &impl AudioOut, project: &Project) {
        if self.is_playing() {
            return;
        }
        self.state = TransportState::Playing;
        self.current_beat = self.loop_start_beat();
        self.reanchor(out.now());
        self.stop_pending = false;
        info!(bpm = self.bpm, loop_start = self.loop_start, loop_end = self.loop_end, "transport playing");
        self.tick(out, project);
    }

    /// Silence everything and forget whatever was queued, including beat
    /// notifications that haven't come due. Safe to call when already stopped.
    pub fn stop(&mut self, out: &impl AudioOut) {
        if !self.is_playing() {
            return;
        }
        self.state = TransportState::Stopped;
        out.send(AudioCommand::StopAll);
        self.pending_beats.clear();
        self.current_beat = self.loop_start_beat();
        self.stop_pending = true;
        info!("transport stopped");
    }

    /// One scheduling pass. Returns how many steps were queued.
    pub fn tick(&mut self, out: &impl AudioOut, project: &Project) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let now = out.now();
        let spb = self.seconds_per_beat();
        if self.next_beat_time + spb < now {
            // fell more than a step behind (stalled control thread); rejoin the clock
            debug!(behind = now - self.next_beat_time, "transport re-anchored");
            self.reanchor(now);
        }

        let horizon = now + self.lookahead;
        let mut scheduled = 0;
        while self.next_beat_time < horizon {
            self.schedule_beat(out, project, self.current_beat, self.next_beat_time);
            scheduled += 1;
            self.advance();
        }
        scheduled
    }

    fn reanchor(&mut self, at: f64) {
        self.anchor_time = at;
        self.beats_since_anchor = 0;
        self.next_beat_time = at;
    }

    fn advance(&mut self) {
        self.beats_since_anchor += 1;
        self.next_beat_time = self.anchor_time + self.beats_since_anchor as f64 * self.seconds_per_beat();
        self.current_beat += 1;
        if self.current_beat >= self.loop_end_beat() || self.current_beat < self.loop_start_beat() {
            self.current_beat = self.loop_start_beat();
        }
    }

    fn schedule_beat(&mut self, out: &impl AudioOut, project: &Project, beat: usize, at: f64) {
        let col = beat % project.grid.steps();
        for (voice, row, length) in project.grid.notes_starting_at(col) {
            let Some(freq) = frequency(row) else {
                continue;
            };
            out.send(AudioCommand::Trigger(TriggerParams {
                voice,
                frequency: freq,
                duration: note_duration(length, self.bpm, self.margin),
                at,
                params: project.voices[voice],
            }));
        }
        self.pending_beats.push_back((at, beat));
    }

    /// Beat and stop notifications whose time has come.
    pub fn poll_events(&mut self, now: f64) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Some(&(at, beat)) = self.pending_beats.front() {
            if at > now {
                break;
            }
            self.pending_beats.pop_front();
            events.push(TransportEvent::Beat(beat));
        }
        if self.stop_pending {
            self.stop_pending = false;
            events.push(TransportEvent::Stopped);
        }
        events
    }

    /// Takes effect from the next step that gets scheduled.
    pub fn set_bpm(&mut self, bpm: i64) -> u32 {
        let bpm = Project::clamp_bpm(bpm);
        if bpm != self.bpm {
            // the already computed next beat keeps its time; steps after it use the new tempo
            self.reanchor(self.next_beat_time);
        }
        self.bpm = bpm;
        debug!(bpm = self.bpm, "bpm set");
        self.bpm
    }

    pub fn set_loop_start(&mut self, bar: i64) -> usize {
        self.loop_start = bar.clamp(1, self.loop_end as i64) as usize;
        debug!(loop_start = self.loop_start, "loop start set");
        self.loop_start
    }

    pub fn set_loop_end(&mut self, bar: i64) -> usize {
        self.loop_end = bar.clamp(self.loop_start as i64, self.total_bars as i64) as usize;
        debug!(loop_end = self.loop_end, "loop end set");
        self.loop_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::testing::FakeOut;

    fn setup() -> (Transport, Project, FakeOut) {
        let project = Project::default();
        let transport = Transport::new(&project, &Config::default());
        (transport, project, FakeOut::default())
    }

    #[test]
    fn first_tick_schedules_one_beat_at_120() {
        let (mut t, p, out) = setup();
        t.play(&out, &p);
        assert_eq!(t.current_beat(), 1);
        assert_eq!(t.next_beat_time(), 0.125);
        assert_eq!(t.tick(&out, &p), 0);
        out.clock.set(0.03);
        assert_eq!(t.tick(&out, &p), 1);
    }

    #[test]
    fn triggers_carry_exact_time_and_duration() {
        let (mut t, mut p, out) = setup();
        p.grid.place(1, 15, 0, 4).unwrap();
        p.grid.place(2, 0, 2, 1).unwrap();
        out.clock.set(10.0);
        t.play(&out, &p);
        out.clock.set(10.2);
        t.tick(&out, &p);

        let trig = out.triggers();
        assert_eq!(trig.len(), 2);
        assert_eq!(trig[0].voice, 1);
        assert!((trig[0].frequency - 440.0).abs() < 1e-3);
        assert_eq!(trig[0].at, 10.0);
        assert!((trig[0].duration - 0.475).abs() < 1e-9);
        assert_eq!(trig[1].voice, 2);
        assert_eq!(trig[1].at, 10.25);
        assert_eq!(trig[1].params, p.voices[2]);
    }

    #[test]
    fn loop_wraps_to_start_after_last_beat() {
        let (mut t, p, out) = setup();
        assert_eq!(t.loop_start_beat(), 0);
        assert_eq!(t.loop_end_beat(), 64);
        t.play(&out, &p);
        let mut beats = Vec::new();
        for i in 1..=80 {
            out.clock.set(i as f64 * 0.125);
            t.tick(&out, &p);
            beats.extend(t.poll_events(out.now()));
        }
        let expected: Vec<TransportEvent> =
            (0..64).chain(0..17).map(TransportEvent::Beat).collect();
        assert_eq!(beats, expected);
    }

    #[test]
    fn beat_events_wait_for_their_time() {
        let (mut t, p, out) = setup();
        t.play(&out, &p);
        out.clock.set(0.06);
        t.tick(&out, &p); // queues beat 1 at 0.125
        assert_eq!(t.poll_events(0.06), vec![TransportEvent::Beat(0)]);
        assert_eq!(t.poll_events(0.1), vec![]);
        assert_eq!(t.poll_events(0.125), vec![TransportEvent::Beat(1)]);
    }

    #[test]
    fn stop_is_idempotent_and_cancels_notifications() {
        let (mut t, p, out) = setup();
        t.play(&out, &p);
        out.clock.set(0.06);
        t.tick(&out, &p);
        t.stop(&out);
        t.stop(&out);
        assert_eq!(t.state(), TransportState::Stopped);
        assert_eq!(t.current_beat(), 0);
        assert_eq!(t.poll_events(100.0), vec![TransportEvent::Stopped]);
        assert_eq!(t.poll_events(100.0), vec![]);
        let stops = out.sent.borrow().iter().filter(|c| **c == AudioCommand::StopAll).count();
        assert_eq!(stops, 1);
        assert_eq!(t.tick(&out, &p), 0);
    }

    #[test]
    fn play_twice_does_not_restart() {
        let (mut t, p, out) = setup();
        t.play(&out, &p);
        out.clock.set(0.3);
        t.tick(&out, &p);
        let beat = t.current_beat();
        t.play(&out, &p);
        assert_eq!(t.current_beat(), beat);
    }

    #[test]
    fn bpm_clamps_and_applies_to_next_step() {
        let (mut t, p, out) = setup();
        assert_eq!(t.set_bpm(20), 60);
        assert_eq!(t.set_bpm(500), 200);
        t.set_bpm(120);
        t.play(&out, &p); // beat 0 at 0.0, next at 0.125
        t.set_bpm(60);
        out.clock.set(0.1);
        t.tick(&out, &p); // beat 1 at 0.125, next is a 60 bpm step later
        assert!((t.next_beat_time() - 0.375).abs() < 1e-12);
    }

    #[test]
    fn beat_times_match_offline_step_times() {
        let (mut t, mut p, out) = setup();
        for col in 0..64 {
            p.grid.place(0, 15, col, 1).unwrap();
        }
        t.set_bpm(72);
        t.play(&out, &p);
        for i in 1..=48 {
            out.clock.set(i as f64 * 0.2);
            t.tick(&out, &p);
        }
        let spb = seconds_per_step(72);
        let trig = out.triggers();
        assert!(trig.len() > 40);
        for (n, tr) in trig.iter().enumerate() {
            assert_eq!(tr.at, n as f64 * spb, "beat {n}");
        }
    }

    #[test]
    fn loop_points_clamp_against_each_other() {
        let (mut t, _, _) = setup();
        assert_eq!(t.set_loop_end(9), 4);
        assert_eq!(t.set_loop_start(3), 3);
        assert_eq!(t.set_loop_end(1), 3); // a one-bar loop is the minimum
        assert_eq!(t.set_loop_start(0), 1);
        assert_eq!(t.set_loop_start(5), 3);
        assert!(t.loop_start_beat() < t.loop_end_beat());
    }

    #[test]
    fn loop_of_bar_two_only() {
        let (mut t, p, out) = setup();
        t.set_loop_start(2);
        t.set_loop_end(2);
        t.play(&out, &p);
        let mut beats = Vec::new();
        for i in 1..=20 {
            out.clock.set(i as f64 * 0.125);
            t.tick(&out, &p);
            beats.extend(t.poll_events(out.now()));
        }
        assert_eq!(beats[0], TransportEvent::Beat(16));
        assert_eq!(beats[15], TransportEvent::Beat(31));
        assert_eq!(beats[16], TransportEvent::Beat(16));
    }

    #[test]
    fn stalled_tick_rejoins_the_clock() {
        let (mut t, p, out) = setup();
        t.play(&out, &p);
        out.clock.set(5.0);
        assert_eq!(t.tick(&out, &p), 1);
        assert!(t.next_beat_time() > 5.0);
    }
}
