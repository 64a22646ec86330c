use std::path::Path;

use super::codec_error::CodecError;
use crate::audio::domain::audio_buffer::AudioBuffer;

/// Domain interface for loading a voice recording from disk.
pub trait AudioReader: Send {
    /// Decode the file to a mono buffer at `target_sample_rate`,
    /// resampling if the file was recorded at another rate.
    fn read_audio(&self, path: &Path, target_sample_rate: u32) -> Result<AudioBuffer, CodecError>;

    /// Native sample rate and channel count, without decoding samples.
    fn audio_metadata(&self, path: &Path) -> Result<(u32, u16), CodecError>;
}
