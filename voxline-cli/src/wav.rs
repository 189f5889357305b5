use std::path::Path;

use anyhow::{bail, Context, Result};
use voxline_core::AudioData;

/// Write 16-bit little-endian PCM out as a WAV file
pub fn write_wav(path: &Path, audio: &AudioData) -> Result<()> {
    if audio.pcm_data.len() % 2 != 0 {
        bail!(
            "PCM payload has an odd byte count ({}), expected 16-bit samples",
            audio.pcm_data.len()
        );
    }

    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {path:?}"))?;

    for sample in audio.pcm_data.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file {path:?}"))
}
