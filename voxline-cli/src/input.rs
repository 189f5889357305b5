use std::path::{Path, PathBuf};

use voxline_core::VoicePreset;

/// Parse a `LABEL=VOICE` speaker mapping
pub fn parse_speaker(value: &str) -> Result<(String, VoicePreset), String> {
    let (label, voice) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected LABEL=VOICE, got {value:?}"))?;
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("Missing speaker label in {value:?}"));
    }
    Ok((label.to_string(), voice.parse()?))
}

/// Split text into blank-line separated paragraphs
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

/// `out.wav` for a single clip, `out_001.wav`, `out_002.wav`, ... for batches
pub fn output_path(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "speech".to_string());
    let extension = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());

    base.with_file_name(format!("{stem}_{:03}.{extension}", index + 1))
}
