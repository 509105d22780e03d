use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};

use crate::audio_api::{AudioCommand, AudioOut};
use crate::config::Config;
use crate::pipeline::project::FilterParams;

mod engine;
mod filter;
mod frame;
mod oscillator;
mod voice;

pub use engine::Synth;
pub use filter::SharedFilter;
pub use frame::{StereoFrame, to_i16};
pub use oscillator::{NoiseTable, Oscillator};
pub use voice::{Envelope, Voice, VoiceOutput};

const MAX_BLOCK: usize = 4096; // scratch frames, preallocated so the callback never mallocs

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    frames: Arc<AtomicU64>, // frames rendered so far; this is the audio clock
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOut for AudioHandle {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            warn!("audio command queue full, dropping {:?}", cmd);
        }
    }
}

pub fn start_audio(filter: FilterParams, config: &Config) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;

    let sample_rate = supported.sample_rate();
    let channels = supported.channels() as usize;
    info!(sample_rate, channels, "opening audio output");

    let frames = Arc::new(AtomicU64::new(0));

    match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let synth = Synth::new(sample_rate, filter, config);
            let output_stream = build_output_stream_f32(
                &device, &supported.into(), rx, synth, Arc::clone(&frames), channels,
            )?;
            output_stream.play().context("failed to play output stream")?;

            Ok(AudioHandle {
                tx,
                frames,
                sample_rate,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut synth: Synth,
    frames: Arc<AtomicU64>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut scratch = vec![StereoFrame::zero(); MAX_BLOCK];
    let channels = channels.max(1);

    let err_fn = |err| warn!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                synth.handle_cmd(cmd);
            }

            for chunk in data.chunks_mut(MAX_BLOCK * channels) {
                let n_frames = chunk.len() / channels;
                let block = &mut scratch[..n_frames];
                synth.render_block(block);
                for (out, frame) in chunk.chunks_exact_mut(channels).zip(block.iter()) {
                    out[0] = frame.left;
                    if channels > 1 {
                        out[1] = frame.right;
                    }
                    for extra in out.iter_mut().skip(2) {
                        *extra = 0.0;
                    }
                }
            }
            frames.store(synth.frame(), Ordering::Release);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
