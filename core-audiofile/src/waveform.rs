//! # Waveform Reduction
//!
//! Reduces an audio stream to a fixed number of amplitude points per channel
//! for visualization.
//!
//! ## Algorithm
//!
//! The frames `[0, total)` are partitioned into `points` contiguous buckets of
//! `ceil(total / points)` frames (the last bucket may be shorter). The source
//! is rewound, streamed once in chunks of `chunk_frames`, and every sample is
//! folded into its bucket's statistic. The source cursor is restored afterwards.
//!
//! ```text
//! frames:  |----800----|----800----| ... |----800----|
//! points:       p0          p1       ...      p99
//! ```

use crate::config::AudioFileConfig;
use crate::error::{AudioFileError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Per-bucket statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionStatistic {
    /// Maximum absolute amplitude; keeps transients visible
    #[default]
    Peak,
    /// Root mean square amplitude
    Rms,
}

/// A run of float frames read from a [`FrameSource`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FloatChunk {
    /// One plane per channel
    pub channels: Vec<Vec<f32>>,
    /// Frames in every plane
    pub frames: usize,
    /// Fewer frames than requested were available
    pub reached_end: bool,
}

/// Seekable stream of float frames the reducer can scan.
pub trait FrameSource {
    /// Channels in every chunk.
    fn channel_count(&self) -> usize;

    /// Frames in the whole stream.
    fn total_frames(&self) -> u64;

    /// Current read position.
    fn position(&self) -> u64;

    /// Move the read position.
    fn seek_to(&mut self, frame: u64) -> Result<()>;

    /// Read up to `max_frames` frames from the current position.
    fn read_chunk(&mut self, max_frames: usize) -> Result<FloatChunk>;
}

/// Fixed-size amplitude summary of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformSummary {
    /// Number of channels
    pub channel_count: u32,
    /// Values in every channel's sequence
    pub points_per_channel: usize,
    /// One sequence of values in `[0, 1]` per channel
    pub data: Vec<Vec<f32>>,
}

impl WaveformSummary {
    /// A summary whose every value is `0.0`.
    pub fn zeroed(channel_count: usize, points: usize) -> Self {
        Self {
            channel_count: channel_count as u32,
            points_per_channel: points,
            data: vec![vec![0.0; points]; channel_count],
        }
    }

    /// Values of one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.data.get(index).map(Vec::as_slice)
    }

    /// Returns `true` if the summary holds no points.
    pub fn is_empty(&self) -> bool {
        self.points_per_channel == 0
    }
}

/// Streams a [`FrameSource`] into a [`WaveformSummary`].
#[derive(Debug, Clone, Copy)]
pub struct WaveformReducer {
    chunk_frames: usize,
    statistic: ReductionStatistic,
}

impl WaveformReducer {
    /// Create a reducer reading `chunk_frames` frames per chunk.
    pub fn new(chunk_frames: usize, statistic: ReductionStatistic) -> Self {
        Self {
            chunk_frames: chunk_frames.max(1),
            statistic,
        }
    }

    /// Create a reducer using the configured chunk size and statistic.
    pub fn from_config(config: &AudioFileConfig) -> Self {
        Self::new(config.read_chunk_frames, config.reduction)
    }

    /// The statistic computed per bucket.
    pub fn statistic(&self) -> ReductionStatistic {
        self.statistic
    }

    /// Reduce `source` to `points` values per channel.
    ///
    /// Never fails: a scan interrupted by a decode error keeps the buckets
    /// filled so far, and a closed source yields a zeroed summary.
    #[instrument(skip(self, source), fields(statistic = ?self.statistic))]
    pub fn reduce<S: FrameSource + ?Sized>(&self, source: &mut S, points: usize) -> WaveformSummary {
        let channel_count = source.channel_count();
        let total = source.total_frames();

        if points == 0 || total == 0 {
            debug!("Nothing to reduce ({} frames, {} points)", total, points);
            return WaveformSummary::zeroed(channel_count, points);
        }

        let bucket_frames = total.div_ceil(points as u64);
        let saved = source.position();

        if let Err(e) = source.seek_to(0) {
            warn!("Cannot rewind source for reduction: {}", e);
            return WaveformSummary::zeroed(channel_count, points);
        }

        let mut buckets = BucketAccumulator::new(self.statistic, channel_count, points, bucket_frames);
        let mut frame_index = 0u64;

        loop {
            match source.read_chunk(self.chunk_frames) {
                Ok(chunk) => {
                    buckets.push(frame_index, &chunk.channels, chunk.frames);
                    frame_index += chunk.frames as u64;
                    if chunk.reached_end || chunk.frames == 0 {
                        break;
                    }
                }
                Err(AudioFileError::HandleClosed) => {
                    debug!("Source closed during reduction");
                    return WaveformSummary::zeroed(channel_count, points);
                }
                Err(e) => {
                    warn!("Reduction stopped at frame {}: {}", frame_index, e);
                    break;
                }
            }
        }

        if let Err(e) = source.seek_to(saved) {
            warn!("Cannot restore cursor {} after reduction: {}", saved, e);
        }

        debug!(
            "Reduced {} frames into {} points of {} frames",
            frame_index, points, bucket_frames
        );

        buckets.finish()
    }
}

impl Default for WaveformReducer {
    fn default() -> Self {
        Self::from_config(&AudioFileConfig::default())
    }
}

/// Running per-channel, per-bucket statistic.
struct BucketAccumulator {
    statistic: ReductionStatistic,
    bucket_frames: u64,
    points: usize,
    /// Peak: running maximum. Rms: running sum of squares.
    values: Vec<Vec<f64>>,
    counts: Vec<u64>,
}

impl BucketAccumulator {
    fn new(statistic: ReductionStatistic, channels: usize, points: usize, bucket_frames: u64) -> Self {
        Self {
            statistic,
            bucket_frames,
            points,
            values: vec![vec![0.0; points]; channels],
            counts: vec![0; points],
        }
    }

    /// Fold `frames` frames starting at absolute frame `start`.
    fn push(&mut self, start: u64, channels: &[Vec<f32>], frames: usize) {
        let mut offset = 0usize;

        while offset < frames {
            let absolute = start + offset as u64;
            let bucket = (absolute / self.bucket_frames) as usize;
            if bucket >= self.points {
                break;
            }

            let bucket_end = (bucket as u64 + 1) * self.bucket_frames;
            let run = ((bucket_end - absolute) as usize).min(frames - offset);

            for (values, plane) in self.values.iter_mut().zip(channels) {
                let samples = &plane[offset..offset + run];
                let slot = &mut values[bucket];
                match self.statistic {
                    ReductionStatistic::Peak => {
                        for &sample in samples {
                            *slot = slot.max(sample.abs() as f64);
                        }
                    }
                    ReductionStatistic::Rms => {
                        *slot += samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
                    }
                }
            }

            self.counts[bucket] += run as u64;
            offset += run;
        }
    }

    fn finish(self) -> WaveformSummary {
        let channel_count = self.values.len();
        let data = self
            .values
            .into_iter()
            .map(|values| {
                values
                    .into_iter()
                    .zip(&self.counts)
                    .map(|(value, &count)| {
                        let value = match self.statistic {
                            _ if count == 0 => 0.0,
                            ReductionStatistic::Peak => value,
                            ReductionStatistic::Rms => (value / count as f64).sqrt(),
                        };
                        value.clamp(0.0, 1.0) as f32
                    })
                    .collect()
            })
            .collect();

        WaveformSummary {
            channel_count: channel_count as u32,
            points_per_channel: self.points,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mono source whose sample at frame `i` is `shape(i)`.
    struct SyntheticSource {
        total: u64,
        position: u64,
        shape: fn(u64) -> f32,
        fail_at: Option<u64>,
        closed: bool,
        seeks: Vec<u64>,
    }

    impl SyntheticSource {
        fn new(total: u64, shape: fn(u64) -> f32) -> Self {
            Self {
                total,
                position: 0,
                shape,
                fail_at: None,
                closed: false,
                seeks: Vec::new(),
            }
        }
    }

    impl FrameSource for SyntheticSource {
        fn channel_count(&self) -> usize {
            1
        }

        fn total_frames(&self) -> u64 {
            self.total
        }

        fn position(&self) -> u64 {
            self.position
        }

        fn seek_to(&mut self, frame: u64) -> Result<()> {
            self.seeks.push(frame);
            self.position = frame;
            Ok(())
        }

        fn read_chunk(&mut self, max_frames: usize) -> Result<FloatChunk> {
            if self.closed {
                return Err(AudioFileError::HandleClosed);
            }
            if self.fail_at.is_some_and(|at| self.position >= at) {
                return Err(AudioFileError::DecodeIo("bad packet".to_string()));
            }

            let remaining = self.total.saturating_sub(self.position);
            let frames = (max_frames as u64).min(remaining) as usize;
            let plane = (0..frames as u64)
                .map(|i| (self.shape)(self.position + i))
                .collect();
            self.position += frames as u64;

            Ok(FloatChunk {
                channels: vec![plane],
                frames,
                reached_end: frames < max_frames,
            })
        }
    }

    /// Every 800-frame bucket `b` peaks at `b / 100`, alternating sign.
    fn stepped(frame: u64) -> f32 {
        let bucket = frame / 800;
        let level = bucket as f32 / 100.0;
        if frame % 2 == 0 {
            level
        } else {
            -level * 0.5
        }
    }

    #[test]
    fn ten_seconds_at_8khz_to_100_points() {
        let mut source = SyntheticSource::new(80_000, stepped);
        let summary = WaveformReducer::new(4096, ReductionStatistic::Peak).reduce(&mut source, 100);

        assert_eq!(summary.channel_count, 1);
        assert_eq!(summary.points_per_channel, 100);
        let values = summary.channel(0).unwrap();
        assert_eq!(values.len(), 100);
        for (bucket, &value) in values.iter().enumerate() {
            assert!((value - bucket as f32 / 100.0).abs() < 1e-6, "bucket {bucket}");
        }
    }

    #[test]
    fn zero_points_is_empty() {
        let mut source = SyntheticSource::new(1_000, stepped);
        let summary = WaveformReducer::default().reduce(&mut source, 0);
        assert!(summary.is_empty());
        assert_eq!(summary.data, vec![Vec::<f32>::new()]);
        assert!(source.seeks.is_empty());
    }

    #[test]
    fn empty_source_is_zeroed() {
        let mut source = SyntheticSource::new(0, stepped);
        let summary = WaveformReducer::default().reduce(&mut source, 16);
        assert_eq!(summary, WaveformSummary::zeroed(1, 16));
    }

    #[test]
    fn more_points_than_frames_leaves_empty_buckets() {
        let mut source = SyntheticSource::new(3, |_| 0.5);
        let summary = WaveformReducer::default().reduce(&mut source, 8);

        let values = summary.channel(0).unwrap();
        assert_eq!(values.len(), 8);
        assert_eq!(&values[..3], &[0.5, 0.5, 0.5]);
        assert!(values[3..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn uneven_division_shortens_last_bucket() {
        // 10 frames into 4 points: buckets of 3, 3, 3, 1
        let mut source = SyntheticSource::new(10, |i| i as f32 / 10.0);
        let summary = WaveformReducer::new(4, ReductionStatistic::Peak).reduce(&mut source, 4);
        let values = summary.channel(0).unwrap();
        assert!((values[0] - 0.2).abs() < 1e-6);
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert!((values[2] - 0.8).abs() < 1e-6);
        assert!((values[3] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn restores_cursor() {
        let mut source = SyntheticSource::new(5_000, stepped);
        source.position = 1_234;
        WaveformReducer::default().reduce(&mut source, 10);
        assert_eq!(source.position(), 1_234);
        assert_eq!(source.seeks, vec![0, 1_234]);
    }

    #[test]
    fn decode_failure_keeps_partial_buckets() {
        let mut source = SyntheticSource::new(1_000, |_| 0.25);
        source.fail_at = Some(500);
        let summary = WaveformReducer::new(100, ReductionStatistic::Peak).reduce(&mut source, 10);

        let values = summary.channel(0).unwrap();
        assert!(values[..5].iter().all(|&v| v == 0.25));
        assert!(values[5..].iter().all(|&v| v == 0.0));
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn closed_source_is_zeroed() {
        let mut source = SyntheticSource::new(1_000, |_| 0.9);
        source.closed = true;
        let summary = WaveformReducer::default().reduce(&mut source, 4);
        assert_eq!(summary, WaveformSummary::zeroed(1, 4));
    }

    #[test]
    fn rms_of_constant_signal() {
        let mut source = SyntheticSource::new(400, |i| if i % 2 == 0 { 0.5 } else { -0.5 });
        let summary = WaveformReducer::new(64, ReductionStatistic::Rms).reduce(&mut source, 4);
        for &value in summary.channel(0).unwrap() {
            assert!((value - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn values_are_clamped() {
        let mut source = SyntheticSource::new(100, |_| -3.0);
        let summary = WaveformReducer::default().reduce(&mut source, 2);
        assert_eq!(summary.channel(0).unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn summary_serializes() {
        let summary = WaveformSummary::zeroed(2, 3);
        let json = serde_json::to_string(&summary).unwrap();
        let back: WaveformSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
