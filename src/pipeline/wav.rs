// 16-bit stereo PCM export. hound writes the RIFF/fmt/data headers and
// patches the chunk sizes when the writer is finalized.

use std::io::{Seek, Write};
use std::path::Path;

use crate::audio::{StereoFrame, to_i16};

pub const CHANNELS: u16 = 2;
pub const BITS_PER_SAMPLE: u16 = 16;

pub fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

pub fn write_wav<W: Write + Seek>(writer: W, frames: &[StereoFrame], sample_rate: u32) -> Result<(), hound::Error> {
    let mut wav = hound::WavWriter::new(writer, wav_spec(sample_rate))?;
    {
        let mut samples = wav.get_i16_writer(frames.len() as u32 * CHANNELS as u32);
        for f in frames {
            samples.write_sample(to_i16(f.left));
            samples.write_sample(to_i16(f.right));
        }
        samples.flush()?;
    }
    wav.finalize()
}

pub fn write_wav_file(path: &Path, frames: &[StereoFrame], sample_rate: u32) -> Result<(), hound::Error> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_wav(file, frames, sample_rate)
}
