use super::codec_error::CodecError;
use crate::audio::domain::audio_buffer::AudioBuffer;

/// Converts between in-memory audio and an encoded byte container.
pub trait AudioCodec: Send + Sync {
    /// Short identifier of the container, e.g. `"wav/pcm16"`.
    fn format(&self) -> &'static str;

    fn encode(&self, audio: &AudioBuffer) -> Result<Vec<u8>, CodecError>;

    /// Decode to mono. Multi-channel streams are averaged.
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, CodecError>;
}
