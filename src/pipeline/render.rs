//! Offline export.
//!
//! One straight pass over the grid from step 0, no looping. Notes are queued on
//! a fresh [`Synth`] against a virtual clock (step `s` starts at
//! `s * seconds_per_step`), then the whole buffer is rendered in one go. The
//! pitch, duration and margin math is the same the live transport uses, so an
//! export sounds like live playback started from the top.

use std::io::{Seek, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::audio::{StereoFrame, Synth};
use crate::audio_api::{AudioCommand, TriggerParams};
use crate::config::Config;
use crate::error::ExportError;
use crate::pipeline::project::Project;
use crate::pipeline::timing::{frequency, note_duration, seconds_per_step};
use crate::pipeline::wav;
use crate::shared::NUM_VOICES;

const RENDER_BLOCK: usize = 4096;

#[derive(Clone, Debug)]
pub struct RenderedAudio {
    pub frames: Vec<StereoFrame>,
    pub sample_rate: u32,
}

impl RenderedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }

    pub fn peak(&self) -> f32 {
        self.frames.iter().fold(0.0, |m, f| m.max(f.peak()))
    }
}

// cleared on drop, so an early return or a panic can't leave export locked
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ExportError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct OfflineRenderer {
    config: Config,
    busy: AtomicBool,
}

impl OfflineRenderer {
    pub fn new(config: Config) -> Self {
        Self { config, busy: AtomicBool::new(false) }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Length of the export: every step once, plus the release tail.
    pub fn render_duration(&self, project: &Project) -> f64 {
        let bpm = Project::clamp_bpm(project.bpm as i64);
        project.grid.steps() as f64 * seconds_per_step(bpm) + self.config.release_tail_secs.max(0.0)
    }

    /// Render to memory. `progress` gets fractions in `0..=1`.
    pub fn render(&self, project: &Project, progress: impl FnMut(f32)) -> Result<RenderedAudio, ExportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        self.render_locked(project, progress)
    }

    pub fn export_wav<W: Write + Seek>(
        &self,
        project: &Project,
        writer: W,
        progress: impl FnMut(f32),
    ) -> Result<RenderedAudio, ExportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let audio = self.render_locked(project, progress)?;
        wav::write_wav(writer, &audio.frames, audio.sample_rate)?;
        Ok(audio)
    }

    pub fn export_wav_file(
        &self,
        project: &Project,
        path: &Path,
        progress: impl FnMut(f32),
    ) -> Result<RenderedAudio, ExportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let audio = self.render_locked(project, progress)?;
        if let Err(e) = wav::write_wav_file(path, &audio.frames, audio.sample_rate) {
            warn!(path = %path.display(), "wav export failed: {e}");
            return Err(e.into());
        }
        info!(path = %path.display(), secs = audio.duration_secs(), "wav exported");
        Ok(audio)
    }

    fn render_locked(&self, project: &Project, mut progress: impl FnMut(f32)) -> Result<RenderedAudio, ExportError> {
        let sample_rate = self.config.sample_rate.max(1);
        let bpm = Project::clamp_bpm(project.bpm as i64);
        let step_secs = seconds_per_step(bpm);
        let total_frames = (self.render_duration(project) * sample_rate as f64).round() as usize;
        if total_frames == 0 {
            return Err(ExportError::EmptyRender);
        }
        info!(bpm, steps = project.grid.steps(), total_frames, "offline render started");

        let mut synth = Synth::new(sample_rate, project.filter, &self.config);
        let stages = (NUM_VOICES + 1) as f32;
        for voice in 0..NUM_VOICES {
            for (row, col, length) in project.grid.notes(voice) {
                let Some(freq) = frequency(row) else {
                    continue;
                };
                synth.handle_cmd(AudioCommand::Trigger(TriggerParams {
                    voice,
                    frequency: freq,
                    duration: note_duration(length, bpm, self.config.margin_factor),
                    at: col as f64 * step_secs,
                    params: project.voices[voice],
                }));
            }
            progress((voice + 1) as f32 / stages);
        }

        let mut frames = vec![StereoFrame::zero(); total_frames];
        for block in frames.chunks_mut(RENDER_BLOCK) {
            synth.render_block(block);
        }
        progress(1.0);

        Ok(RenderedAudio { frames, sample_rate })
    }
}
