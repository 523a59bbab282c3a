//! # Symphonia Decode Session
//!
//! Synchronous decode session on a local file using the Symphonia library.

use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::decoder::{DecodeSession, DecodedChunk, SessionInfo};
use crate::error::{AudioFileError, Result};
use crate::format::{AudioCodec, FormatDescriptor};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::TimeBase;
use tracing::{debug, error, info, instrument, warn};

/// Consecutive packet failures tolerated before a read gives up.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Decode session over one track of a local file.
///
/// The session owns the demuxer and codec decoder and converts every decoded
/// packet to planar `f32`. It is `Send` and is driven by one owner at a time.
///
/// ## State Management
///
/// - Selected audio track and its time base
/// - A decoded chunk held back while probing the channel layout
/// - End-of-stream flag
pub struct SymphoniaSession {
    /// Format reader (demuxer), owns the media source stream
    format_reader: Box<dyn FormatReader>,

    /// Codec decoder for the selected track
    decoder: Box<dyn Decoder>,

    /// Selected track ID
    track_id: u32,

    /// Time base of packet timestamps, if the container declares one
    time_base: Option<TimeBase>,

    /// Native format of the track
    format: FormatDescriptor,

    /// Total native frames
    total_frames: u64,

    /// Tags read from the container
    tags: HashMap<String, String>,

    /// Chunk decoded ahead of time (channel probing)
    pending: Option<DecodedChunk>,

    /// End-of-stream flag
    eof: bool,

    /// Path used in log and error messages
    source_info: String,
}

impl SymphoniaSession {
    /// Open `path` and prepare its first audio track for decoding.
    ///
    /// # Errors
    ///
    /// - [`AudioFileError::FileNotFound`] / [`AudioFileError::PermissionDenied`]
    ///   if the file cannot be opened
    /// - [`AudioFileError::UnsupportedFormat`] if no container or codec matches
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening decode session");
        let source_info = path.display().to_string();

        let mss = Self::open_local_file(path)?;
        let hint = FormatDetector::hint_from_path(path);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                debug!("Format probe failed: {}", e);
                AudioFileError::UnsupportedFormat(format!("{}: {}", source_info, e))
            })?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                AudioFileError::UnsupportedFormat(format!("{}: no audio track", source_info))
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();
        debug!("Selected track ID: {}", track_id);

        let codec = FormatDetector::detect_codec(params.codec);
        FormatDetector::validate_codec_support(&codec)?;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            AudioFileError::UnsupportedFormat(format!("{}: missing sample rate", source_info))
        })?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                error!("Failed to create decoder: {}", e);
                AudioFileError::UnsupportedFormat(format!("{}: {}", source_info, e))
            })?;

        let format = FormatDescriptor {
            is_interleaved: codec == AudioCodec::Pcm,
            is_float: FormatDetector::is_float_pcm(params.codec),
            bits_per_channel: params.bits_per_sample.unwrap_or(0),
            channel_count: params.channels.map_or(0, |ch| ch.count() as u32),
            sample_rate: sample_rate as f64,
            codec,
        };

        let mut session = Self {
            format_reader,
            decoder,
            track_id,
            time_base: params.time_base,
            format,
            total_frames: 0,
            tags: HashMap::new(),
            pending: None,
            eof: false,
            source_info,
        };

        session.total_frames = match params.n_frames {
            Some(frames) => frames,
            None => session.count_frames(path)?,
        };

        // Some containers only reveal the channel layout once a packet is decoded
        if session.format.channel_count == 0 {
            session.pending = session.next_chunk()?;
            session.format.channel_count = session
                .pending
                .as_ref()
                .map_or(0, |chunk| chunk.channels.len() as u32);
            debug!(
                "Channel count detected from decoded audio: {}",
                session.format.channel_count
            );
        }

        info!(
            "Session ready: {:?} {}Hz, {} channels, {} frames",
            session.format.codec,
            sample_rate,
            session.format.channel_count,
            session.total_frames
        );

        Ok(session)
    }

    /// Attach tags read by the metadata reader.
    pub fn with_metadata(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    fn open_local_file(path: &Path) -> Result<MediaSourceStream> {
        let file = File::open(path).map_err(|e| {
            debug!("Failed to open file {:?}: {}", path, e);
            AudioFileError::from_open_io(path, e)
        })?;

        let media_source = Box::new(file) as Box<dyn MediaSource>;
        Ok(MediaSourceStream::new(media_source, Default::default()))
    }

    /// Count frames by walking every packet of a second reader on the file.
    fn count_frames(&self, path: &Path) -> Result<u64> {
        debug!("Frame count not declared, scanning packets");

        let mss = Self::open_local_file(path)?;
        let hint = FormatDetector::hint_from_path(path);
        let mut reader = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?
            .format;

        let mut end_ts = 0u64;
        loop {
            match reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => {
                    end_ts = end_ts.max(packet.ts() + packet.dur());
                }
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(e) => {
                    warn!("Packet scan stopped early: {}", e);
                    break;
                }
            }
        }

        Ok(self.ts_to_frame(end_ts))
    }

    fn ts_to_frame(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.denom != 0 => {
                let rate = self.format.sample_rate as u128;
                (ts as u128 * tb.numer as u128 * rate / tb.denom as u128) as u64
            }
            _ => ts,
        }
    }

    fn frame_to_ts(&self, frame: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.numer != 0 && self.format.sample_rate > 0.0 => {
                let rate = self.format.sample_rate as u128;
                (frame as u128 * tb.denom as u128 / (tb.numer as u128 * rate)) as u64
            }
            _ => frame,
        }
    }
}

impl DecodeSession for SymphoniaSession {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            format: self.format.clone(),
            total_frames: self.total_frames,
            metadata: self.tags.clone(),
        }
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.pending = None;

        if frame >= self.total_frames {
            debug!("Seek to {} is past the end ({})", frame, self.total_frames);
            self.eof = true;
            return Ok(());
        }

        let ts = self.frame_to_ts(frame);
        match self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts,
                track_id: self.track_id,
            },
        ) {
            Ok(seeked) => {
                self.decoder.reset();
                self.eof = false;
                debug!(
                    "Seeked to frame {} (actual ts {}, required ts {})",
                    frame, seeked.actual_ts, seeked.required_ts
                );
                Ok(())
            }
            Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                self.eof = true;
                Ok(())
            }
            Err(e) => {
                error!("Seek failed on {}: {}", self.source_info, e);
                Err(AudioFileError::DecodeIo(format!("seek to frame {}: {}", frame, e)))
            }
        }
    }

    /// Read and decode the next packet of the selected track.
    ///
    /// Corrupted packets are skipped; the session only fails after
    /// `MAX_CONSECUTIVE_ERRORS` failures in a row.
    #[instrument(skip(self), level = "trace")]
    fn next_chunk(&mut self) -> Result<Option<DecodedChunk>> {
        if let Some(chunk) = self.pending.take() {
            return Ok(Some(chunk));
        }

        if self.eof {
            return Ok(None);
        }

        let mut consecutive_errors = 0;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Decoder reset required for track list change");
                    return Err(AudioFileError::DecodeIo(
                        "track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream");
                    self.eof = true;
                    return Ok(None);
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error reading packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(AudioFileError::DecodeIo(format!(
                            "stream I/O failure after {} attempts: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }

                    continue;
                }
                Err(e) => {
                    error!("Fatal format reader error: {}", e);
                    return Err(AudioFileError::DecodeIo(format!(
                        "failed to read packet: {}",
                        e
                    )));
                }
            };

            while !self.format_reader.metadata().is_latest() {
                self.format_reader.metadata().pop();
            }

            if packet.track_id() != self.track_id {
                continue;
            }

            let start_frame = self.ts_to_frame(packet.ts());

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let channels = SampleConverter::to_planar_f32(&decoded);
                    let chunk = DecodedChunk::new(start_frame, channels);
                    if chunk.is_empty() {
                        continue;
                    }
                    return Ok(Some(chunk));
                }
                Err(SymphoniaError::IoError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet (I/O error, attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(AudioFileError::DecodeIo(format!(
                            "stream corruption after {} failed packets",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping packet with decode error (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(AudioFileError::DecodeIo(format!(
                            "decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, err
                        )));
                    }
                }
                Err(e) => {
                    error!("Fatal decode error: {}", e);
                    return Err(AudioFileError::DecodeIo(format!(
                        "failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }
}

#[cfg(all(test, feature = "decoder-wav"))]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_ramp(dir: &TempDir, frames: u32) -> std::path::PathBuf {
        let path = dir.path().join("ramp.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            let value = (i % 100) as i16 * 100;
            writer.write_sample(value).unwrap();
            writer.write_sample(-value).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn drain(session: &mut SymphoniaSession) -> (u64, usize) {
        let mut first = None;
        let mut frames = 0;
        while let Some(chunk) = session.next_chunk().unwrap() {
            first.get_or_insert(chunk.start_frame);
            frames += chunk.frames();
        }
        (first.unwrap_or(0), frames)
    }

    #[test]
    fn opens_pcm_wav() {
        let dir = TempDir::new().unwrap();
        let path = write_ramp(&dir, 4_000);

        let session = SymphoniaSession::open(&path).unwrap();
        let info = session.info();

        assert_eq!(info.total_frames, 4_000);
        assert_eq!(info.format.codec, AudioCodec::Pcm);
        assert_eq!(info.format.sample_rate, 8_000.0);
        assert_eq!(info.format.channel_count, 2);
        assert_eq!(info.format.bits_per_channel, 16);
        assert!(!info.format.is_float);
    }

    #[test]
    fn decodes_every_frame() {
        let dir = TempDir::new().unwrap();
        let path = write_ramp(&dir, 4_000);
        let mut session = SymphoniaSession::open(&path).unwrap();

        let (first, frames) = drain(&mut session);
        assert_eq!(first, 0);
        assert_eq!(frames, 4_000);
        assert!(session.next_chunk().unwrap().is_none());
    }

    #[test]
    fn seek_restarts_decoding_near_target() {
        let dir = TempDir::new().unwrap();
        let path = write_ramp(&dir, 4_000);
        let mut session = SymphoniaSession::open(&path).unwrap();

        session.seek(1_000).unwrap();
        let chunk = session.next_chunk().unwrap().unwrap();
        assert!(chunk.start_frame <= 1_000);
        assert!(chunk.start_frame + chunk.frames() as u64 > 1_000);

        // Right channel mirrors the left one
        let offset = (1_000 - chunk.start_frame) as usize;
        assert_eq!(chunk.channels[0][offset], -chunk.channels[1][offset]);
    }

    #[test]
    fn seek_past_end_reports_end_of_stream() {
        let dir = TempDir::new().unwrap();
        let path = write_ramp(&dir, 500);
        let mut session = SymphoniaSession::open(&path).unwrap();

        session.seek(10_000).unwrap();
        assert!(session.next_chunk().unwrap().is_none());

        session.seek(0).unwrap();
        assert_eq!(drain(&mut session).1, 500);
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let dir = TempDir::new().unwrap();
        let result = SymphoniaSession::open(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(AudioFileError::FileNotFound(_))));
    }

    #[test]
    fn garbage_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let result = SymphoniaSession::open(&path);
        assert!(matches!(result, Err(AudioFileError::UnsupportedFormat(_))));
    }
}
