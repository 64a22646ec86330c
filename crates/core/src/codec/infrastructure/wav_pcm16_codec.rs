use std::io::{Cursor, Read};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::codec::domain::audio_codec::AudioCodec;
use crate::codec::domain::codec_error::CodecError;

const PCM16_SCALE: f32 = 32767.0;

/// Mono 16-bit PCM WAV, the anonymizer's output container.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavPcm16Codec;

impl AudioCodec for WavPcm16Codec {
    fn format(&self) -> &'static str {
        "wav/pcm16"
    }

    fn encode(&self, audio: &AudioBuffer) -> Result<Vec<u8>, CodecError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.len() * 2));
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in audio.samples() {
                writer.write_sample(to_pcm16(sample))?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, CodecError> {
        let (samples, sample_rate) = decode_mono(WavReader::new(Cursor::new(bytes))?)?;
        Ok(AudioBuffer::new(samples, sample_rate))
    }
}

/// Clamp to [-1, 1] and scale by 32767.
pub fn to_pcm16(sample: f32) -> i16 {
    let clamped = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (clamped * PCM16_SCALE).round() as i16
}

/// Read every sample of a WAV stream and average the channels into one.
pub fn decode_mono<R: Read>(reader: WavReader<R>) -> Result<(Vec<f32>, u32), CodecError> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(CodecError::UnsupportedFormat("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(CodecError::UnsupportedFormat(format!(
                    "{}-bit integer PCM",
                    spec.bits_per_sample
                )));
            }
            let max_val = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sine(len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        AudioBuffer::new(samples, 16000)
    }

    #[test]
    fn test_encode_produces_riff_header_and_sizes() {
        let bytes = WavPcm16Codec.encode(&sine(16000)).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 16000 * 2);
    }

    #[test]
    fn test_decode_restores_rate_and_length() {
        let original = sine(4000);
        let bytes = WavPcm16Codec.encode(&original).unwrap();
        let decoded = WavPcm16Codec.decode(&bytes).unwrap();
        assert_eq!(decoded.sample_rate(), 16000);
        assert_eq!(decoded.len(), 4000);
        for (a, b) in original.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() < 1.0 / 16000.0);
        }
    }

    #[rstest]
    #[case(1.5, 32767)]
    #[case(-1.5, -32767)]
    #[case(0.0, 0)]
    #[case(0.5, 16384)]
    #[case(f32::NAN, 0)]
    fn test_to_pcm16(#[case] input: f32, #[case] expected: i16) {
        assert_eq!(to_pcm16(input), expected);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            WavPcm16Codec.decode(b"not a wav file at all"),
            Err(CodecError::Wav(_))
        ));
    }

    #[test]
    fn test_decode_stereo_is_mixed_down() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..100 {
                writer.write_sample(16384i16).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        let decoded = WavPcm16Codec.decode(&cursor.into_inner()).unwrap();
        assert_eq!(decoded.len(), 100);
        assert_eq!(decoded.sample_rate(), 8000);
        assert!((decoded.samples()[0] - 0.25).abs() < 1e-4);
    }
}
