use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::WavReader;

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::codec::domain::audio_reader::AudioReader;
use crate::codec::domain::codec_error::CodecError;
use crate::codec::infrastructure::rubato_resampler::resample;
use crate::codec::infrastructure::wav_pcm16_codec::decode_mono;

/// Reads WAV files from disk, mixing down to mono and resampling to the
/// requested rate.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavFileReader;

impl WavFileReader {
    fn open(path: &Path) -> Result<WavReader<BufReader<File>>, CodecError> {
        let file = File::open(path).map_err(|source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(WavReader::new(BufReader::new(file))?)
    }
}

impl AudioReader for WavFileReader {
    fn read_audio(&self, path: &Path, target_sample_rate: u32) -> Result<AudioBuffer, CodecError> {
        let (samples, source_rate) = decode_mono(Self::open(path)?)?;
        if samples.is_empty() {
            return Err(CodecError::Empty);
        }
        if source_rate == 0 {
            return Err(CodecError::UnsupportedFormat("sample rate 0".to_string()));
        }

        let samples = if source_rate == target_sample_rate {
            samples
        } else {
            log::debug!(
                "Resampling {} from {source_rate} Hz to {target_sample_rate} Hz",
                path.display()
            );
            resample(&samples, source_rate, target_sample_rate)?
        };
        Ok(AudioBuffer::new(samples, target_sample_rate))
    }

    fn audio_metadata(&self, path: &Path) -> Result<(u32, u16), CodecError> {
        let spec = Self::open(path)?.spec();
        Ok((spec.sample_rate, spec.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_wav(dir: &TempDir, name: &str, rate: u32, channels: u16, frames: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let spec = WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            let v = ((2.0 * std::f32::consts::PI * 200.0 * i as f32 / rate as f32).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_read_audio_nonexistent_file() {
        let result = WavFileReader.read_audio(Path::new("/nonexistent/voice.wav"), 16000);
        assert!(matches!(result, Err(CodecError::Io { .. })));
    }

    #[test]
    fn test_read_audio_at_native_rate() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "a.wav", 16000, 1, 8000);
        let audio = WavFileReader.read_audio(&path, 16000).unwrap();
        assert_eq!(audio.sample_rate(), 16000);
        assert_eq!(audio.len(), 8000);
    }

    #[test]
    fn test_read_audio_resamples_and_mixes_down() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "b.wav", 44100, 2, 44100);
        let audio = WavFileReader.read_audio(&path, 16000).unwrap();
        assert_eq!(audio.sample_rate(), 16000);
        assert_eq!(audio.len(), 16000);
        assert!(audio.peak() > 0.2);
    }

    #[test]
    fn test_audio_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "c.wav", 22050, 2, 100);
        assert_eq!(WavFileReader.audio_metadata(&path).unwrap(), (22050, 2));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "d.wav", 16000, 1, 0);
        assert!(matches!(
            WavFileReader.read_audio(&path, 16000),
            Err(CodecError::Empty)
        ));
    }
}
