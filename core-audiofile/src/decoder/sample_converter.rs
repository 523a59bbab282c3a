//! # Sample Format Converter
//!
//! Converts decoded Symphonia buffers of any sample type to planar `f32`.

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Sample converter that normalizes audio to planar f32.
///
/// Symphonia outputs audio in various sample formats (i8..i32, u8..u32, f32,
/// f64). This converter normalizes everything to one `Vec<f32>` per channel
/// with samples in the range [-1.0, 1.0].
pub struct SampleConverter;

impl SampleConverter {
    /// Convert a Symphonia `AudioBufferRef` to planar f32 samples.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let decoded = decoder.decode(&packet)?;
    /// let planes = SampleConverter::to_planar_f32(&decoded);
    /// // planes[0] is the left channel, planes[1] the right one
    /// ```
    pub fn to_planar_f32(buffer: &AudioBufferRef<'_>) -> Vec<Vec<f32>> {
        match buffer {
            AudioBufferRef::F32(buf) => Self::copy_planes(buf),
            AudioBufferRef::F64(buf) => {
                Self::convert_planes(buf, |sample: f64| sample.into_sample())
            }
            AudioBufferRef::S32(buf) => {
                Self::convert_planes(buf, |sample: i32| sample.into_sample())
            }
            AudioBufferRef::S24(buf) => {
                Self::convert_planes(buf, |sample| IntoSample::into_sample(sample))
            }
            AudioBufferRef::S16(buf) => {
                Self::convert_planes(buf, |sample: i16| sample.into_sample())
            }
            AudioBufferRef::S8(buf) => Self::convert_planes(buf, |sample: i8| sample.into_sample()),
            AudioBufferRef::U32(buf) => {
                Self::convert_planes(buf, |sample: u32| sample.into_sample())
            }
            AudioBufferRef::U24(buf) => {
                Self::convert_planes(buf, |sample| IntoSample::into_sample(sample))
            }
            AudioBufferRef::U16(buf) => {
                Self::convert_planes(buf, |sample: u16| sample.into_sample())
            }
            AudioBufferRef::U8(buf) => Self::convert_planes(buf, |sample: u8| sample.into_sample()),
        }
    }

    /// Copy the planes of an f32 buffer.
    fn copy_planes(buf: &AudioBuffer<f32>) -> Vec<Vec<f32>> {
        let num_channels = buf.spec().channels.count();
        (0..num_channels).map(|ch| buf.chan(ch).to_vec()).collect()
    }

    /// Convert every plane of a buffer of any sample type.
    fn convert_planes<T>(buf: &AudioBuffer<T>, convert: fn(T) -> f32) -> Vec<Vec<f32>>
    where
        T: Sample + Copy,
    {
        let num_channels = buf.spec().channels.count();
        (0..num_channels)
            .map(|ch| buf.chan(ch).iter().map(|&sample| convert(sample)).collect())
            .collect()
    }
}
