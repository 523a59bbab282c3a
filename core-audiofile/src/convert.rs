//! # File → Client Conversion
//!
//! The negotiated conversion path from a file's native format to the caller's
//! client format:
//!
//! 1. **Resample**: linear interpolation at source position
//!    `client_frame × file_rate / client_rate`
//! 2. **Channel mapping**: identity, mono → N duplication, N → mono averaging,
//!    or per-channel selection with wrap-around
//! 3. **Encoding**: bit depth, float-ness and interleaving of the client format
//!    (see [`PcmBuffer`])
//!
//! Native frames are buffered in a [`SourceWindow`] that slides forward as the
//! cursor advances.

use crate::buffer::PcmBuffer;
use crate::decoder::DecodedChunk;
use crate::error::{AudioFileError, Result};
use crate::format::FormatDescriptor;
use tracing::debug;

// ============================================================================
// Channel Mapping
// ============================================================================

/// How client channels are derived from native channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMap {
    /// Same channel count, channel `k` reads native channel `k`
    Identity,
    /// Mono source, every client channel carries it
    Duplicate,
    /// Mono client, the average of every native channel
    Downmix,
    /// Client channel `k` reads native channel `sources[k]`
    Select(Vec<usize>),
}

impl ChannelMap {
    /// Choose the mapping for `source` native channels and `target` client channels.
    pub fn between(source: usize, target: usize) -> Self {
        if source == target {
            ChannelMap::Identity
        } else if source == 1 {
            ChannelMap::Duplicate
        } else if target == 1 {
            ChannelMap::Downmix
        } else {
            ChannelMap::Select(
                (0..target)
                    .map(|k| if k < source { k } else { k % source })
                    .collect(),
            )
        }
    }

    /// Map one frame of native samples into `out` (one slot per client channel).
    pub fn apply(&self, frame: &[f32], out: &mut [f32]) {
        match self {
            ChannelMap::Identity => out.copy_from_slice(&frame[..out.len()]),
            ChannelMap::Duplicate => out.fill(frame[0]),
            ChannelMap::Downmix => {
                out[0] = frame.iter().sum::<f32>() / frame.len() as f32;
            }
            ChannelMap::Select(sources) => {
                for (slot, &source) in out.iter_mut().zip(sources) {
                    *slot = frame[source];
                }
            }
        }
    }
}

// ============================================================================
// Source Window
// ============================================================================

/// Contiguous run of decoded native frames starting at `start`.
#[derive(Debug, Clone)]
pub struct SourceWindow {
    start: u64,
    channels: Vec<Vec<f32>>,
    exhausted: bool,
    failure: Option<String>,
}

impl SourceWindow {
    /// Create an empty window for `channel_count` native channels.
    pub fn new(channel_count: usize) -> Self {
        Self {
            start: 0,
            channels: vec![Vec::new(); channel_count],
            exhausted: false,
            failure: None,
        }
    }

    /// Drop all buffered frames and restart the window at `start`.
    pub fn reset(&mut self, start: u64) {
        self.start = start;
        for plane in &mut self.channels {
            plane.clear();
        }
        self.exhausted = false;
        self.failure = None;
    }

    /// First buffered native frame.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// One past the last buffered native frame.
    pub fn end(&self) -> u64 {
        self.start + self.len() as u64
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Returns `true` if no frames are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if decoding can continue from `frame` without a seek.
    pub fn can_continue_from(&self, frame: u64) -> bool {
        frame >= self.start && frame <= self.end()
    }

    /// The session has nothing more to deliver.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Mark the session as drained.
    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// Record a decode failure; the window stops growing.
    pub fn mark_failed(&mut self, reason: String) {
        self.exhausted = true;
        self.failure = Some(reason);
    }

    /// The decode failure that stopped the window, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Discard frames before `frame`.
    pub fn discard_before(&mut self, frame: u64) {
        if frame <= self.start {
            return;
        }
        let count = ((frame - self.start) as usize).min(self.len());
        for plane in &mut self.channels {
            plane.drain(..count);
        }
        self.start += count as u64;
    }

    /// Append a decoded chunk, trimming overlap and zero-filling gaps.
    pub fn append(&mut self, chunk: DecodedChunk) {
        let end = self.end();
        let frames = chunk.frames();
        let chunk_end = chunk.start_frame + frames as u64;

        if chunk_end <= end {
            return;
        }

        let skip = end.saturating_sub(chunk.start_frame) as usize;
        let gap = chunk.start_frame.saturating_sub(end) as usize;
        if gap > 0 {
            debug!("Zero-filling {} missing frames at {}", gap, end);
        }

        for (index, plane) in self.channels.iter_mut().enumerate() {
            plane.extend(std::iter::repeat(0.0).take(gap));
            match chunk.channels.get(index) {
                Some(source) => plane.extend_from_slice(&source[skip..frames]),
                None => plane.extend(std::iter::repeat(0.0).take(frames - skip)),
            }
        }
    }

    /// Sample of native channel `channel` at native frame `frame`.
    pub fn sample(&self, channel: usize, frame: u64) -> Option<f32> {
        let index = frame.checked_sub(self.start)? as usize;
        self.channels.get(channel)?.get(index).copied()
    }

    fn contains(&self, frame: u64) -> bool {
        frame >= self.start && frame < self.end()
    }
}

// ============================================================================
// Format Converter
// ============================================================================

/// Negotiated conversion from a file format to a client format.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    file: FormatDescriptor,
    client: FormatDescriptor,
    /// file_rate / client_rate
    step: f64,
    map: ChannelMap,
}

impl FormatConverter {
    /// Establish the conversion path from `file` to `client`.
    ///
    /// # Errors
    ///
    /// - [`AudioFileError::InvalidClientFormat`] if `client` is not a valid
    ///   client format
    /// - [`AudioFileError::UnsupportedFormat`] if the file format has no
    ///   sample rate or no channels
    pub fn negotiate(file: &FormatDescriptor, client: &FormatDescriptor) -> Result<Self> {
        client.validate_client()?;

        if !file.sample_rate.is_finite() || file.sample_rate <= 0.0 || file.channel_count == 0 {
            return Err(AudioFileError::UnsupportedFormat(format!(
                "file format has {} channels at {} Hz",
                file.channel_count, file.sample_rate
            )));
        }

        let map = ChannelMap::between(file.channel_count as usize, client.channel_count as usize);
        debug!(
            "Negotiated conversion {}Hz/{}ch -> {}Hz/{}ch ({:?})",
            file.sample_rate, file.channel_count, client.sample_rate, client.channel_count, map
        );

        Ok(Self {
            step: file.sample_rate / client.sample_rate,
            file: file.clone(),
            client: client.clone(),
            map,
        })
    }

    /// The native format.
    pub fn file_format(&self) -> &FormatDescriptor {
        &self.file
    }

    /// The client format.
    pub fn client_format(&self) -> &FormatDescriptor {
        &self.client
    }

    /// The channel mapping in effect.
    pub fn channel_map(&self) -> &ChannelMap {
        &self.map
    }

    /// Frame count in the client format for `file_frames` native frames.
    pub fn client_frames(&self, file_frames: u64) -> u64 {
        (file_frames as f64 * self.client.sample_rate / self.file.sample_rate).round() as u64
    }

    /// Native position (fractional) that client frame `client_frame` samples.
    pub fn source_position(&self, client_frame: u64) -> f64 {
        client_frame as f64 * self.step
    }

    /// Native frames `[first, last]` needed to render `count` client frames from
    /// `client_frame`, clamped to `file_frames`.
    pub fn source_span(&self, client_frame: u64, count: u64, file_frames: u64) -> (u64, u64) {
        let last_native = file_frames.saturating_sub(1);
        let first = (self.source_position(client_frame).floor() as u64).min(last_native);
        let last_client = client_frame + count.saturating_sub(1);
        let last = (self.source_position(last_client).floor() as u64 + 1).min(last_native);
        (first, last.max(first))
    }

    /// Render up to `count` client frames from `client_frame` out of `window`.
    ///
    /// Stops early at the first frame whose native sample is not in the window.
    /// Returns one plane per client channel.
    pub fn render(&self, window: &SourceWindow, client_frame: u64, count: usize) -> Vec<Vec<f32>> {
        let native_channels = self.file.channel_count as usize;
        let client_channels = self.client.channel_count as usize;
        let mut planes = vec![Vec::with_capacity(count); client_channels];
        let mut native = vec![0.0f32; native_channels];
        let mut mapped = vec![0.0f32; client_channels];

        for offset in 0..count as u64 {
            let position = self.source_position(client_frame + offset);
            let index = position.floor() as u64;
            if !window.contains(index) {
                break;
            }
            let frac = (position - index as f64) as f32;

            for (channel, slot) in native.iter_mut().enumerate() {
                let s0 = window.sample(channel, index).unwrap_or(0.0);
                *slot = if frac > 0.0 {
                    let s1 = window.sample(channel, index + 1).unwrap_or(s0);
                    s0 + (s1 - s0) * frac
                } else {
                    s0
                };
            }

            self.map.apply(&native, &mut mapped);
            for (plane, &value) in planes.iter_mut().zip(&mapped) {
                plane.push(value);
            }
        }

        planes
    }

    /// Encode rendered planes into a client-format buffer.
    pub fn encode(&self, planes: &[Vec<f32>], frame_capacity: u32) -> PcmBuffer {
        let frames = planes.first().map_or(0, Vec::len);
        PcmBuffer::encode(self.client.clone(), planes, frames, frame_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(start: u64, planes: Vec<Vec<f32>>) -> SourceWindow {
        let mut window = SourceWindow::new(planes.len());
        window.reset(start);
        window.append(DecodedChunk::new(start, planes));
        window
    }

    #[test]
    fn channel_map_selection() {
        assert_eq!(ChannelMap::between(2, 2), ChannelMap::Identity);
        assert_eq!(ChannelMap::between(1, 6), ChannelMap::Duplicate);
        assert_eq!(ChannelMap::between(6, 1), ChannelMap::Downmix);
        assert_eq!(ChannelMap::between(2, 4), ChannelMap::Select(vec![0, 1, 0, 1]));
        assert_eq!(ChannelMap::between(6, 2), ChannelMap::Select(vec![0, 1]));
    }

    #[test]
    fn channel_map_apply() {
        let mut out = [0.0; 2];
        ChannelMap::Duplicate.apply(&[0.5], &mut out);
        assert_eq!(out, [0.5, 0.5]);

        let mut mono = [0.0; 1];
        ChannelMap::Downmix.apply(&[1.0, 0.0, -0.4, 0.2], &mut mono);
        assert!((mono[0] - 0.2).abs() < 1e-6);

        let mut quad = [0.0; 4];
        ChannelMap::between(3, 4).apply(&[0.1, 0.2, 0.3], &mut quad);
        assert_eq!(quad, [0.1, 0.2, 0.3, 0.1]);
    }

    #[test]
    fn window_trims_overlap_and_fills_gaps() {
        let mut window = window_with(10, vec![vec![1.0, 2.0, 3.0]]);
        assert_eq!(window.end(), 13);

        // Overlapping chunk: only frames 13.. are kept
        window.append(DecodedChunk::new(12, vec![vec![9.0, 4.0, 5.0]]));
        assert_eq!(window.end(), 15);
        assert_eq!(window.sample(0, 13), Some(4.0));

        // Gap of two frames is zero-filled
        window.append(DecodedChunk::new(17, vec![vec![8.0]]));
        assert_eq!(window.sample(0, 15), Some(0.0));
        assert_eq!(window.sample(0, 17), Some(8.0));

        window.discard_before(14);
        assert_eq!(window.start(), 14);
        assert_eq!(window.sample(0, 13), None);
        assert_eq!(window.sample(0, 14), Some(5.0));
    }

    #[test]
    fn window_trims_chunk_starting_before_reset_point() {
        let mut window = SourceWindow::new(1);
        window.reset(5);
        window.append(DecodedChunk::new(0, vec![(0..10).map(|i| i as f32).collect()]));
        assert_eq!(window.start(), 5);
        assert_eq!(window.sample(0, 5), Some(5.0));
        assert_eq!(window.end(), 10);
    }

    #[test]
    fn client_frames_rounds() {
        let file = FormatDescriptor::linear_pcm(44_100.0, 2, 16, false, true);
        let client = FormatDescriptor::float_planar(48_000.0, 2);
        let converter = FormatConverter::negotiate(&file, &client).unwrap();

        // 44100 * 48000 / 44100
        assert_eq!(converter.client_frames(44_100), 48_000);
        // 1000 * 48000 / 44100 = 1088.43
        assert_eq!(converter.client_frames(1_000), 1_088);
    }

    #[test]
    fn negotiate_rejects_encoded_client() {
        let file = FormatDescriptor::cd_quality();
        let mut client = FormatDescriptor::canonical();
        client.codec = crate::format::AudioCodec::Aac;

        let result = FormatConverter::negotiate(&file, &client);
        assert!(matches!(result, Err(AudioFileError::InvalidClientFormat(_))));
    }

    #[test]
    fn upsampling_interpolates_linearly() {
        let file = FormatDescriptor::float_planar(1_000.0, 1);
        let client = FormatDescriptor::float_planar(2_000.0, 1);
        let converter = FormatConverter::negotiate(&file, &client).unwrap();
        let window = window_with(0, vec![vec![0.0, 1.0, 0.0]]);

        let planes = converter.render(&window, 0, 6);
        assert_eq!(planes[0], vec![0.0, 0.5, 1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn downsampling_picks_source_positions() {
        let file = FormatDescriptor::float_planar(2_000.0, 2);
        let client = FormatDescriptor::float_planar(1_000.0, 1);
        let converter = FormatConverter::negotiate(&file, &client).unwrap();
        let window = window_with(
            0,
            vec![vec![0.0, 0.1, 0.2, 0.3], vec![1.0, 1.1, 1.2, 1.3]],
        );

        let planes = converter.render(&window, 0, 4);
        // Client frames 0 and 1 read native frames 0 and 2; the rest are past the window
        assert_eq!(planes[0].len(), 2);
        assert!((planes[0][0] - 0.5).abs() < 1e-6);
        assert!((planes[0][1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn source_span_is_clamped() {
        let file = FormatDescriptor::float_planar(1_000.0, 1);
        let client = FormatDescriptor::float_planar(1_000.0, 1);
        let converter = FormatConverter::negotiate(&file, &client).unwrap();

        assert_eq!(converter.source_span(0, 10, 100), (0, 10));
        assert_eq!(converter.source_span(95, 10, 100), (95, 99));
    }

    #[test]
    fn encode_uses_client_format() {
        let file = FormatDescriptor::float_planar(8_000.0, 1);
        let client = FormatDescriptor::cd_quality();
        let converter = FormatConverter::negotiate(&file, &client).unwrap();

        let buffer = converter.encode(&[vec![0.0, 1.0], vec![0.0, 1.0]], 16);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.frame_capacity(), 16);
        assert_eq!(buffer.buffers().len(), 1);
        assert_eq!(buffer.buffer(0).map(|b| b.len()), Some(8));
    }
}
