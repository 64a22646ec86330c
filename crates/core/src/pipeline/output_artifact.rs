use std::fs;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::codec::domain::audio_codec::AudioCodec;
use crate::codec::domain::codec_error::CodecError;
use crate::shared::constants::MIN_ARTIFACT_BYTES;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("encoded artifact is {size} bytes, below the {min} byte floor")]
    TooSmall { size: usize, min: usize },
    #[error("encoded artifact cannot be decoded: {0}")]
    Undecodable(#[source] CodecError),
    #[error(
        "encoded artifact decodes to {actual_samples} samples at {actual_rate} Hz, \
         expected {expected_samples} at {expected_rate} Hz"
    )]
    Mismatch {
        expected_samples: usize,
        expected_rate: u32,
        actual_samples: usize,
        actual_rate: u32,
    },
}

/// Encoded result of one anonymization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    bytes: Vec<u8>,
    sample_rate: u32,
    num_samples: usize,
    seed: u64,
}

impl OutputArtifact {
    /// Accept `bytes` only if they clear the size floor and decode back to
    /// exactly `num_samples` samples at `sample_rate`.
    pub fn verified(
        bytes: Vec<u8>,
        sample_rate: u32,
        num_samples: usize,
        seed: u64,
        codec: &dyn AudioCodec,
    ) -> Result<Self, IntegrityError> {
        if bytes.len() < MIN_ARTIFACT_BYTES {
            return Err(IntegrityError::TooSmall {
                size: bytes.len(),
                min: MIN_ARTIFACT_BYTES,
            });
        }
        let decoded = codec.decode(&bytes).map_err(IntegrityError::Undecodable)?;
        if decoded.len() != num_samples || decoded.sample_rate() != sample_rate {
            return Err(IntegrityError::Mismatch {
                expected_samples: num_samples,
                expected_rate: sample_rate,
                actual_samples: decoded.len(),
                actual_rate: decoded.sample_rate(),
            });
        }
        Ok(Self {
            bytes,
            sample_rate,
            num_samples,
            seed,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Seed of the run that produced this artifact; replaying with it
    /// reproduces the same bytes.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples as f64 / self.sample_rate as f64
    }

    /// Write next to `path` under a temporary name, then rename into place.
    /// Readers of `path` never see a partially written file.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut partial = path.as_os_str().to_owned();
        partial.push(".part");
        let partial = Path::new(&partial);

        let result = fs::File::create(partial)
            .and_then(|mut file| {
                file.write_all(&self.bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(partial, path));
        if result.is_err() {
            let _ = fs::remove_file(partial);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::domain::audio_buffer::AudioBuffer;
    use crate::codec::infrastructure::wav_pcm16_codec::WavPcm16Codec;

    fn encoded(len: usize) -> Vec<u8> {
        WavPcm16Codec
            .encode(&AudioBuffer::new(vec![0.1; len], 16000))
            .unwrap()
    }

    #[test]
    fn test_verified_accepts_valid_artifact() {
        let artifact = OutputArtifact::verified(encoded(16000), 16000, 16000, 7, &WavPcm16Codec)
            .unwrap();
        assert_eq!(artifact.byte_size(), 44 + 32000);
        assert_eq!(artifact.seed(), 7);
        approx::assert_relative_eq!(artifact.duration(), 1.0);
    }

    #[test]
    fn test_verified_rejects_small_artifact() {
        let result = OutputArtifact::verified(encoded(100), 16000, 100, 0, &WavPcm16Codec);
        assert!(matches!(
            result,
            Err(IntegrityError::TooSmall { size: 244, .. })
        ));
    }

    #[test]
    fn test_verified_rejects_garbage() {
        let result = OutputArtifact::verified(vec![7u8; 4000], 16000, 1978, 0, &WavPcm16Codec);
        assert!(matches!(result, Err(IntegrityError::Undecodable(_))));
    }

    #[test]
    fn test_verified_rejects_length_mismatch() {
        let result = OutputArtifact::verified(encoded(2000), 16000, 2001, 0, &WavPcm16Codec);
        assert!(matches!(result, Err(IntegrityError::Mismatch { .. })));
    }

    #[test]
    fn test_write_to_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        std::fs::write(&path, b"old").unwrap();

        let artifact =
            OutputArtifact::verified(encoded(1000), 16000, 1000, 1, &WavPcm16Codec).unwrap();
        artifact.write_to(&path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes());
        assert!(!dir.path().join("out.wav.part").exists());
    }

    #[test]
    fn test_write_to_missing_directory_fails_cleanly() {
        let artifact =
            OutputArtifact::verified(encoded(1000), 16000, 1000, 1, &WavPcm16Codec).unwrap();
        assert!(artifact
            .write_to(Path::new("/nonexistent/dir/out.wav"))
            .is_err());
    }
}
