pub mod audio_codec;
pub mod audio_reader;
pub mod codec_error;
