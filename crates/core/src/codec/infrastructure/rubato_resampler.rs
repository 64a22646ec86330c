//! Band-limited sample-rate conversion for ingest.
//!
//! Uses rubato's FFT resampler, whose anti-aliasing filter removes content
//! above the lower of the two Nyquist frequencies before decimation.

use rubato::{FftFixedInOut, Resampler};

use crate::codec::domain::codec_error::CodecError;

/// Input frames per processing block; rubato rounds it to fit the rate ratio.
const CHUNK_SIZE: usize = 1024;

/// Resample mono `samples` from `from_rate` to `to_rate`.
///
/// The output is aligned with the input (the filter delay is removed) and
/// has `round(len * to_rate / from_rate)` samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, CodecError> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(CodecError::UnsupportedFormat(format!(
            "cannot resample {from_rate} Hz to {to_rate} Hz"
        )));
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 1)?;
    let expected =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();

    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut chunk: Vec<f32> = Vec::with_capacity(resampler.input_frames_max());
    let mut position = 0;
    while output.len() < delay + expected {
        let needed = resampler.input_frames_next();
        let end = (position + needed).min(samples.len());
        chunk.clear();
        chunk.extend_from_slice(&samples[position..end]);
        // Zeros past the end flush the filter tail.
        chunk.resize(needed, 0.0);
        position = end;

        let block = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = block.first() {
            output.extend_from_slice(channel);
        }
    }

    Ok(output[delay..delay + expected].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * amplitude)
            .collect()
    }

    /// RMS over the middle half, away from the edge transients.
    fn interior_rms(samples: &[f32]) -> f32 {
        let start = samples.len() / 4;
        let middle = &samples[start..samples.len() - start];
        (middle.iter().map(|s| s * s).sum::<f32>() / middle.len() as f32).sqrt()
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let input = tone(440.0, 16000, 1000, 0.5);
        assert_eq!(resample(&input, 16000, 16000).unwrap(), input);
    }

    #[test]
    fn test_output_length_follows_rate_ratio() {
        let input = tone(440.0, 44100, 44100, 0.5);
        assert_eq!(resample(&input, 44100, 16000).unwrap().len(), 16000);
        assert_eq!(resample(&input[..4410], 44100, 48000).unwrap().len(), 4800);
        assert_eq!(resample(&input[..1000], 16000, 8000).unwrap().len(), 500);
    }

    #[test]
    fn test_in_band_tone_survives_downsampling() {
        let input = tone(1000.0, 44100, 44100, 0.5);
        let output = resample(&input, 44100, 16000).unwrap();
        let rms = interior_rms(&output);
        assert!((rms - 0.3536).abs() < 0.02, "rms {rms}");
    }

    #[test]
    fn test_tone_above_target_nyquist_is_rejected() {
        // 12 kHz would fold to 4 kHz at 16 kHz without a lowpass.
        let input = tone(12000.0, 44100, 44100, 0.5);
        let output = resample(&input, 44100, 16000).unwrap();
        let rms = interior_rms(&output);
        assert!(rms < 0.01, "aliased rms {rms}");
    }

    #[test]
    fn test_output_is_time_aligned() {
        let input = tone(200.0, 48000, 9600, 0.5);
        let output = resample(&input, 48000, 16000).unwrap();
        let reference = tone(200.0, 16000, 3200, 0.5);
        for i in 800..2400 {
            assert!(
                (output[i] - reference[i]).abs() < 0.05,
                "sample {i}: {} vs {}",
                output[i],
                reference[i]
            );
        }
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            resample(&[0.1, 0.2], 0, 16000),
            Err(CodecError::UnsupportedFormat(_))
        ));
    }
}
