// The middle layer: owns the project and the transport, turns semantic input
// events into edits and audio commands, and hands the TUI a DisplayState.
// The TUI never touches the project directly.

use tracing::{info, warn};

use crate::audio_api::{AudioCommand, AudioOut, TriggerParams};
use crate::config::Config;
use crate::error::OverlapError;
use crate::pipeline::project::{Project, VoiceParam};
use crate::pipeline::timing::{frequency, note_duration, note_name};
use crate::pipeline::transport::{Transport, TransportEvent};
use crate::shared::{DisplayState, InputEvent, NUM_VOICES};

const PREVIEW_ROW: usize = 15; // A4
const PREVIEW_STEPS: usize = 2;

pub struct Middle<A: AudioOut> {
    pub project: Project,
    transport: Transport,
    audio: Option<A>, // None when the output device failed to open; editing still works
    config: Config,
    selected_voice: u8,
    last_beat: Option<usize>,
    status: String,
    display: DisplayState,
}

impl<A: AudioOut> Middle<A> {
    pub fn with_state(project: Project, audio: Option<A>, config: Config) -> Self {
        let transport = Transport::new(&project, &config);
        let mut middle = Self {
            project,
            transport,
            audio,
            config,
            selected_voice: 0,
            last_beat: None,
            status: String::new(),
            display: DisplayState::default(),
        };
        if middle.audio.is_none() {
            middle.status = "NO AUDIO".to_string();
        }
        middle.sync_filter();
        middle
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::TogglePlay => {
                if self.transport.is_playing() {
                    self.stop();
                } else {
                    self.play();
                }
            }
            InputEvent::AdjustBpm(delta) => {
                self.set_bpm(self.transport.bpm() as i64 + delta as i64);
            }
            InputEvent::AdjustLoopStart(delta) => {
                self.project.loop_start = self.transport.set_loop_start(self.transport.loop_start() as i64 + delta as i64);
            }
            InputEvent::AdjustLoopEnd(delta) => {
                self.project.loop_end = self.transport.set_loop_end(self.transport.loop_end() as i64 + delta as i64);
            }
            InputEvent::SelectVoice(v) => {
                if (v as usize) < NUM_VOICES {
                    self.selected_voice = v;
                }
            }
            InputEvent::CycleWaveform => {
                let voice = self.selected_voice as usize;
                let next = self.project.voices[voice].waveform.next();
                self.project.set_voice_param(voice, VoiceParam::Waveform(next));
            }
            InputEvent::ToggleVoiceFilter => {
                let voice = self.selected_voice as usize;
                let routed = !self.project.voices[voice].use_filter;
                self.project.set_voice_param(voice, VoiceParam::UseFilter(routed));
            }
            InputEvent::PreviewNote => {
                self.preview(self.selected_voice as usize, PREVIEW_ROW);
            }
            InputEvent::ClearVoice => {
                let voice = self.selected_voice as usize;
                self.project.grid.clear_voice(voice);
                self.status = format!("V{} cleared", voice + 1);
            }
            InputEvent::CycleFilterType => {
                self.project.filter.kind = self.project.filter.kind.next();
                self.sync_filter();
            }
            InputEvent::AdjustCutoff(delta) => {
                let cutoff = self.project.filter.cutoff + delta;
                self.project.filter.set_cutoff(cutoff);
                self.sync_filter();
            }
            InputEvent::AdjustResonance(delta) => {
                let resonance = self.project.filter.resonance + delta;
                self.project.filter.set_resonance(resonance);
                self.sync_filter();
            }
            InputEvent::Quit => {}
        }
    }

    pub fn play(&mut self) {
        let Some(audio) = self.audio.as_ref() else {
            warn!("play requested without an audio output");
            self.status = "NO AUDIO".to_string();
            return;
        };
        self.transport.play(audio, &self.project);
    }

    pub fn stop(&mut self) {
        if let Some(audio) = self.audio.as_ref() {
            self.transport.stop(audio);
        }
    }

    pub fn set_bpm(&mut self, bpm: i64) {
        self.project.bpm = self.transport.set_bpm(bpm);
    }

    /// Grid edit passthrough so callers get the overlap feedback.
    pub fn place_note(&mut self, voice: usize, row: usize, col: usize, length: usize) -> Result<bool, OverlapError> {
        self.project.grid.place(voice, row, col, length)
    }

    pub fn preview(&mut self, voice: usize, row: usize) {
        let (Some(audio), Some(freq)) = (self.audio.as_ref(), frequency(row)) else {
            return;
        };
        if voice >= NUM_VOICES {
            return;
        }
        audio.send(AudioCommand::Trigger(TriggerParams {
            voice,
            frequency: freq,
            duration: note_duration(PREVIEW_STEPS, self.transport.bpm(), self.config.margin_factor),
            at: audio.now(),
            params: self.project.voices[voice],
        }));
        if let Some(name) = note_name(row) {
            self.status = format!("V{} {name}", voice + 1);
        }
    }

    fn sync_filter(&self) {
        if let Some(audio) = self.audio.as_ref() {
            audio.send(AudioCommand::SetFilter(self.project.filter));
        }
    }

    /// The periodic scheduling pass; call every `tick_interval_ms`.
    pub fn tick(&mut self) -> usize {
        match self.audio.as_ref() {
            Some(audio) => self.transport.tick(audio, &self.project),
            None => 0,
        }
    }

    /// Deliver beat/stop notifications that are due; call every UI frame.
    pub fn poll(&mut self) -> Vec<TransportEvent> {
        let Some(audio) = self.audio.as_ref() else {
            return Vec::new();
        };
        let events = self.transport.poll_events(audio.now());
        for event in &events {
            match event {
                TransportEvent::Beat(beat) => self.last_beat = Some(*beat),
                TransportEvent::Stopped => {
                    self.last_beat = None;
                    info!("playback halted");
                }
            }
        }
        events
    }

    pub fn display_state(&mut self) -> &DisplayState {
        let p = &self.project;
        self.display = DisplayState {
            playing: self.transport.is_playing(),
            bpm: self.transport.bpm(),
            loop_start: self.transport.loop_start(),
            loop_end: self.transport.loop_end(),
            current_beat: self.last_beat,
            selected_voice: self.selected_voice,
            voice_labels: std::array::from_fn(|i| {
                let v = &p.voices[i];
                format!("{}{}", v.waveform.label(), if v.use_filter { " +F" } else { "" })
            }),
            filter_label: format!(
                "{} {:>5.0}Hz Q{:.1}",
                p.filter.kind.label(),
                p.filter.cutoff_hz(),
                p.filter.q()
            ),
            note_count: p.grid.note_count(),
            step_has_note: (0..p.grid.steps())
                .map(|col| p.grid.notes_starting_at(col).next().is_some())
                .collect(),
            status: self.status.clone(),
        };
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::testing::FakeOut;
    use crate::pipeline::project::{FilterType, Waveform};

    fn middle() -> Middle<FakeOut> {
        Middle::with_state(Project::default(), Some(FakeOut::default()), Config::default())
    }

    fn out(m: &Middle<FakeOut>) -> &FakeOut {
        m.audio.as_ref().unwrap()
    }

    #[test]
    fn toggle_play_and_stop() {
        let mut m = middle();
        m.handle_input(InputEvent::TogglePlay);
        assert!(m.transport().is_playing());
        out(&m).clock.set(0.05);
        assert_eq!(m.poll(), vec![TransportEvent::Beat(0)]);
        assert_eq!(m.display_state().current_beat, Some(0));

        m.handle_input(InputEvent::TogglePlay);
        assert!(!m.transport().is_playing());
        assert_eq!(m.poll(), vec![TransportEvent::Stopped]);
        assert_eq!(m.display_state().current_beat, None);
    }

    #[test]
    fn bpm_edits_are_clamped_and_mirrored() {
        let mut m = middle();
        m.handle_input(InputEvent::AdjustBpm(500));
        assert_eq!(m.project.bpm, 200);
        m.handle_input(InputEvent::AdjustBpm(-1000));
        assert_eq!(m.project.bpm, 60);
        assert_eq!(m.display_state().bpm, 60);
    }

    #[test]
    fn loop_edits_mirror_into_project() {
        let mut m = middle();
        m.handle_input(InputEvent::AdjustLoopStart(2));
        m.handle_input(InputEvent::AdjustLoopEnd(-3));
        assert_eq!(m.project.loop_start, 3);
        assert_eq!(m.project.loop_end, 3);
    }

    #[test]
    fn voice_edits_target_selected_voice() {
        let mut m = middle();
        m.handle_input(InputEvent::SelectVoice(2));
        m.handle_input(InputEvent::CycleWaveform);
        m.handle_input(InputEvent::ToggleVoiceFilter);
        assert_eq!(m.project.voices[2].waveform, Waveform::Noise);
        assert!(m.project.voices[2].use_filter);
        m.handle_input(InputEvent::SelectVoice(9));
        assert_eq!(m.display_state().selected_voice, 2);
    }

    #[test]
    fn clear_voice_only_touches_the_selected_voice() {
        let mut m = middle();
        m.place_note(0, 3, 0, 2).unwrap();
        m.place_note(1, 3, 0, 2).unwrap();
        m.place_note(1, 9, 8, 1).unwrap();
        m.handle_input(InputEvent::SelectVoice(1));
        m.handle_input(InputEvent::ClearVoice);
        assert!(m.project.grid.notes(1).is_empty());
        assert_eq!(m.project.grid.notes(0), vec![(3, 0, 2)]);
        assert_eq!(m.display_state().note_count, 1);
    }

    #[test]
    fn filter_changes_reach_the_engine_immediately() {
        let mut m = middle();
        m.handle_input(InputEvent::CycleFilterType);
        m.handle_input(InputEvent::AdjustCutoff(500.0));
        let last = *out(&m).sent.borrow().last().unwrap();
        match last {
            AudioCommand::SetFilter(f) => {
                assert_eq!(f.kind, FilterType::Bandpass);
                assert_eq!(f.cutoff, 100.0);
            }
            other => panic!("expected SetFilter, got {other:?}"),
        }
    }

    #[test]
    fn preview_triggers_now_with_current_params() {
        let mut m = middle();
        out(&m).clock.set(3.0);
        m.handle_input(InputEvent::SelectVoice(1));
        m.handle_input(InputEvent::PreviewNote);
        let t = out(&m).triggers();
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].voice, 1);
        assert_eq!(t[0].at, 3.0);
        assert!((t[0].frequency - 440.0).abs() < 1e-3);
        assert_eq!(m.display_state().status, "V2 A4");
    }

    #[test]
    fn without_audio_editing_still_works() {
        let mut m: Middle<FakeOut> = Middle::with_state(Project::default(), None, Config::default());
        m.handle_input(InputEvent::TogglePlay);
        assert!(!m.transport().is_playing());
        assert_eq!(m.display_state().status, "NO AUDIO");
        assert_eq!(m.place_note(0, 0, 0, 4), Ok(true));
        assert!(m.place_note(0, 0, 2, 1).is_err());
        assert_eq!(m.tick(), 0);
    }
}
