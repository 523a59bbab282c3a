//! # PCM Buffers
//!
//! Owned buffers of client-format audio returned by every read.
//!
//! Samples are stored little-endian in the width and layout described by the
//! buffer's [`FormatDescriptor`]: one byte block per channel for non-interleaved
//! formats, a single block for interleaved ones. Integer samples are signed and
//! scaled symmetrically (`1.0` maps to the type's maximum); 24-bit samples are
//! packed in three bytes.

use crate::format::FormatDescriptor;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A block of decoded frames in the client format.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    format: FormatDescriptor,
    frame_capacity: u32,
    frames: u32,
    buffers: Vec<Bytes>,
}

impl PcmBuffer {
    /// Create a buffer holding no frames.
    pub fn empty(format: FormatDescriptor, frame_capacity: u32) -> Self {
        let buffers = vec![Bytes::new(); format.buffer_count()];
        Self {
            format,
            frame_capacity,
            frames: 0,
            buffers,
        }
    }

    /// Encode `frames` frames of planar float samples into `format`.
    ///
    /// `channels` must hold `format.channel_count` planes of at least `frames`
    /// samples each.
    pub fn encode(
        format: FormatDescriptor,
        channels: &[Vec<f32>],
        frames: usize,
        frame_capacity: u32,
    ) -> Self {
        let channel_count = format.channel_count as usize;
        let sample_bytes = format.bytes_per_sample();

        let buffers = if format.is_interleaved {
            let mut block = BytesMut::with_capacity(frames * sample_bytes * channel_count);
            for frame in 0..frames {
                for plane in channels.iter().take(channel_count) {
                    put_sample(&mut block, &format, plane[frame]);
                }
            }
            vec![block.freeze()]
        } else {
            channels
                .iter()
                .take(channel_count)
                .map(|plane| {
                    let mut block = BytesMut::with_capacity(frames * sample_bytes);
                    for &sample in &plane[..frames] {
                        put_sample(&mut block, &format, sample);
                    }
                    block.freeze()
                })
                .collect()
        };

        Self {
            format,
            frame_capacity,
            frames: frames as u32,
            buffers,
        }
    }

    /// Format of the samples in this buffer.
    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    /// Number of valid frames.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Number of frames the read asked for.
    pub fn frame_capacity(&self) -> u32 {
        self.frame_capacity
    }

    /// Returns `true` if the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// The raw byte blocks (one per channel, or one interleaved block).
    pub fn buffers(&self) -> &[Bytes] {
        &self.buffers
    }

    /// A single raw byte block.
    pub fn buffer(&self, index: usize) -> Option<&Bytes> {
        self.buffers.get(index)
    }

    /// Decode the buffer back into per-channel float samples.
    pub fn to_float_channels(&self) -> Vec<Vec<f32>> {
        let channel_count = self.format.channel_count as usize;
        let frames = self.frames as usize;
        let mut planes = vec![Vec::with_capacity(frames); channel_count];

        if self.format.is_interleaved {
            if let Some(block) = self.buffers.first() {
                let mut src: &[u8] = block;
                for _ in 0..frames {
                    for plane in planes.iter_mut() {
                        plane.push(get_sample(&mut src, &self.format));
                    }
                }
            }
        } else {
            for (plane, block) in planes.iter_mut().zip(&self.buffers) {
                let mut src: &[u8] = block;
                for _ in 0..frames {
                    plane.push(get_sample(&mut src, &self.format));
                }
            }
        }

        planes
    }
}

fn quantize(value: f32, scale: f64) -> i64 {
    (value.clamp(-1.0, 1.0) as f64 * scale).round() as i64
}

fn put_sample(dst: &mut BytesMut, format: &FormatDescriptor, value: f32) {
    match (format.is_float, format.bits_per_channel) {
        (true, 64) => dst.put_f64_le(value as f64),
        (true, _) => dst.put_f32_le(value),
        (false, 8) => dst.put_i8(quantize(value, i8::MAX as f64) as i8),
        (false, 16) => dst.put_i16_le(quantize(value, i16::MAX as f64) as i16),
        (false, 24) => dst.put_int_le(quantize(value, I24_MAX), 3),
        (false, _) => dst.put_i32_le(quantize(value, i32::MAX as f64) as i32),
    }
}

fn get_sample(src: &mut &[u8], format: &FormatDescriptor) -> f32 {
    let value = match (format.is_float, format.bits_per_channel) {
        (true, 64) => return src.get_f64_le() as f32,
        (true, _) => return src.get_f32_le(),
        (false, 8) => src.get_i8() as f64 / i8::MAX as f64,
        (false, 16) => src.get_i16_le() as f64 / i16::MAX as f64,
        (false, 24) => src.get_int_le(3) as f64 / I24_MAX,
        (false, _) => src.get_i32_le() as f64 / i32::MAX as f64,
    };
    value.clamp(-1.0, 1.0) as f32
}

const I24_MAX: f64 = 8_388_607.0;
