pub mod rubato_resampler;
pub mod wav_file_reader;
pub mod wav_pcm16_codec;
