//! WAV container creation for handles opened with a write permission.

use crate::decoder::{DecodeSession, DecodedChunk, SessionInfo};
use crate::error::{AudioFileError, Result};
use crate::format::FormatDescriptor;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Create an empty WAV file at `path` in `format`.
///
/// Only `.wav`/`.wave` paths can be created. The container is finalized right
/// away, so the new file is a valid zero-length WAV.
///
/// # Errors
///
/// - [`AudioFileError::UnsupportedFormat`] for other extensions or sample widths
///   the WAV container cannot hold
/// - [`AudioFileError::PermissionDenied`] / [`AudioFileError::FileNotFound`]
///   when the parent directory is not writable or does not exist
pub fn create_wav(path: &Path, format: &FormatDescriptor) -> Result<EmptySession> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    if !matches!(extension.as_deref(), Some("wav") | Some("wave")) {
        return Err(AudioFileError::UnsupportedFormat(format!(
            "cannot create {}: only WAV files can be created",
            path.display()
        )));
    }

    let spec = wav_spec(format)?;
    debug!("Creating WAV container: {:?}", spec);

    let writer = WavWriter::create(path, spec).map_err(|e| match e {
        hound::Error::IoError(io) => AudioFileError::from_open_io(path, io),
        other => AudioFileError::UnsupportedFormat(other.to_string()),
    })?;
    writer
        .finalize()
        .map_err(|e| AudioFileError::Internal(format!("finalize {}: {}", path.display(), e)))?;

    info!("Created empty WAV file {}", path.display());

    let mut file_format = format.clone();
    file_format.is_interleaved = true;

    Ok(EmptySession::new(file_format))
}

fn wav_spec(format: &FormatDescriptor) -> Result<WavSpec> {
    let sample_format = match (format.is_float, format.bits_per_channel) {
        (true, 32) => SampleFormat::Float,
        (false, 8 | 16 | 24 | 32) => SampleFormat::Int,
        (is_float, bits) => {
            return Err(AudioFileError::UnsupportedFormat(format!(
                "WAV cannot hold {}-bit {} samples",
                bits,
                if is_float { "float" } else { "integer" }
            )))
        }
    };

    if format.channel_count == 0 || format.channel_count > u16::MAX as u32 {
        return Err(AudioFileError::UnsupportedFormat(format!(
            "invalid channel count {}",
            format.channel_count
        )));
    }

    if !format.sample_rate.is_finite() || format.sample_rate < 1.0 {
        return Err(AudioFileError::UnsupportedFormat(format!(
            "invalid sample rate {}",
            format.sample_rate
        )));
    }

    Ok(WavSpec {
        channels: format.channel_count as u16,
        sample_rate: format.sample_rate.round() as u32,
        bits_per_sample: format.bits_per_channel as u16,
        sample_format,
    })
}

/// Session on a file that holds no audio yet.
#[derive(Debug, Clone)]
pub struct EmptySession {
    info: SessionInfo,
}

impl EmptySession {
    /// Create a session reporting `format` and zero frames.
    pub fn new(format: FormatDescriptor) -> Self {
        Self {
            info: SessionInfo {
                format,
                total_frames: 0,
                metadata: HashMap::new(),
            },
        }
    }
}

impl DecodeSession for EmptySession {
    fn info(&self) -> SessionInfo {
        self.info.clone()
    }

    fn seek(&mut self, _frame: u64) -> Result<()> {
        Ok(())
    }

    fn next_chunk(&mut self) -> Result<Option<DecodedChunk>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_readable_empty_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.wav");

        let mut session = create_wav(&path, &FormatDescriptor::float_planar(22_050.0, 1)).unwrap();
        let info = session.info();
        assert_eq!(info.total_frames, 0);
        assert!(info.format.is_interleaved);
        assert!(info.metadata.is_empty());
        assert!(session.next_chunk().unwrap().is_none());

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);
        assert_eq!(reader.duration(), 0);
    }

    #[test]
    fn rejects_non_wav_extension() {
        let dir = TempDir::new().unwrap();
        let result = create_wav(&dir.path().join("new.mp3"), &FormatDescriptor::canonical());
        assert!(matches!(result, Err(AudioFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn rejects_double_precision() {
        let dir = TempDir::new().unwrap();
        let format = FormatDescriptor::linear_pcm(48_000.0, 1, 64, true, true);
        let result = create_wav(&dir.path().join("new.wav"), &format);
        assert!(matches!(result, Err(AudioFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no/such/dir/new.wav");
        let result = create_wav(&path, &FormatDescriptor::canonical());
        assert!(matches!(result, Err(AudioFileError::FileNotFound(_))));
    }
}
