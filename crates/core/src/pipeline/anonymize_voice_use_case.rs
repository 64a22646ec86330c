use std::time::Instant;

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;
use crate::codec::domain::audio_codec::AudioCodec;
use crate::codec::infrastructure::wav_pcm16_codec::WavPcm16Codec;
use crate::shared::constants::MIN_INPUT_DURATION_SECS;

use super::anonymize_error::{AnonymizeError, BufferStats, PipelineFailure};
use super::output_artifact::OutputArtifact;
use super::pipeline_config::{ConfigError, PipelineConfig};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger, AUDIO_SECONDS_METRIC};
use super::stage_factory::build_stages;

/// Runs one recording through the configured stage list and returns a
/// verified PCM16 artifact.
///
/// Holds only immutable configuration and stateless stages; every run owns
/// its buffer and its own `RandomnessContext`, so one instance can serve
/// concurrent runs.
pub struct AnonymizeVoiceUseCase {
    config: PipelineConfig,
    stages: Vec<Box<dyn AudioStage>>,
    codec: Box<dyn AudioCodec>,
}

impl AnonymizeVoiceUseCase {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let stages = build_stages(&config);
        Ok(Self::with_parts(config, stages, Box::new(WavPcm16Codec)))
    }

    pub fn with_parts(
        config: PipelineConfig,
        stages: Vec<Box<dyn AudioStage>>,
        codec: Box<dyn AudioCodec>,
    ) -> Self {
        Self {
            config,
            stages,
            codec,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Anonymize with the configured seed (or fresh entropy if none).
    pub fn run(&self, samples: Vec<f32>, sample_rate: u32) -> Result<OutputArtifact, AnonymizeError> {
        self.run_with_seed(samples, sample_rate, self.config.seed)
    }

    pub fn run_with_seed(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        seed: Option<u64>,
    ) -> Result<OutputArtifact, AnonymizeError> {
        self.run_with_logger(samples, sample_rate, seed, &mut NullPipelineLogger)
    }

    pub fn run_with_logger(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        seed: Option<u64>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<OutputArtifact, AnonymizeError> {
        let mut rng = RandomnessContext::new(seed);
        log::info!(
            "Anonymizing {} samples at {sample_rate} Hz (seed {})",
            samples.len(),
            rng.seed()
        );

        match self.execute(samples, sample_rate, &mut rng, logger) {
            Ok(artifact) => {
                log::info!(
                    "Anonymized {:.2}s of audio into {} bytes of {}",
                    artifact.duration(),
                    artifact.byte_size(),
                    self.codec.format()
                );
                logger.summary();
                Ok(artifact)
            }
            Err(failure) => {
                log::error!("Anonymization failed (seed {}): {failure}", rng.seed());
                Err(failure.kind())
            }
        }
    }

    fn execute(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        rng: &mut RandomnessContext,
        logger: &mut dyn PipelineLogger,
    ) -> Result<OutputArtifact, PipelineFailure> {
        let mut audio = self.admit(samples, sample_rate)?;
        logger.metric(AUDIO_SECONDS_METRIC, audio.duration());

        let total = self.stages.len();
        for (i, stage) in self.stages.iter().enumerate() {
            let start = Instant::now();
            run_stage(stage.as_ref(), &mut audio, rng)?;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            log::debug!(
                "{}: {elapsed_ms:.1}ms, len={} peak={:.4} rms={:.4}",
                stage.name(),
                audio.len(),
                audio.peak(),
                audio.rms()
            );
            logger.timing(stage.name(), elapsed_ms);
            logger.progress(i + 1, total);
        }
        logger.metric("output_peak", audio.peak() as f64);

        let start = Instant::now();
        let bytes = self.codec.encode(&audio).map_err(PipelineFailure::Encode)?;
        let artifact = OutputArtifact::verified(
            bytes,
            audio.sample_rate(),
            audio.len(),
            rng.seed(),
            self.codec.as_ref(),
        )?;
        logger.timing("encode", start.elapsed().as_secs_f64() * 1000.0);
        Ok(artifact)
    }

    /// Reject buffers the stages cannot meaningfully process.
    fn admit(&self, samples: Vec<f32>, sample_rate: u32) -> Result<AudioBuffer, PipelineFailure> {
        if samples.is_empty() {
            return Err(PipelineFailure::EmptyInput);
        }
        if sample_rate == 0 {
            return Err(PipelineFailure::ZeroSampleRate);
        }
        if sample_rate != self.config.target_sample_rate {
            return Err(PipelineFailure::SampleRateMismatch {
                expected: self.config.target_sample_rate,
                actual: sample_rate,
            });
        }

        let audio = AudioBuffer::new(samples, sample_rate);
        if audio.duration() < MIN_INPUT_DURATION_SECS {
            return Err(PipelineFailure::TooShort {
                duration: audio.duration(),
                min: MIN_INPUT_DURATION_SECS,
            });
        }
        if let Some(index) = audio.first_non_finite() {
            return Err(PipelineFailure::NonFiniteInput { index });
        }
        Ok(audio)
    }
}

/// Apply one stage and check its output is still a usable buffer.
fn run_stage(
    stage: &dyn AudioStage,
    audio: &mut AudioBuffer,
    rng: &mut RandomnessContext,
) -> Result<(), PipelineFailure> {
    let failure = |audio: &AudioBuffer, source: StageError| PipelineFailure::Stage {
        stage: stage.name(),
        parameters: stage.parameters(),
        stats: BufferStats::of(audio),
        source,
    };

    stage
        .transform(audio, rng)
        .map_err(|source| failure(audio, source))?;

    if audio.is_empty() {
        return Err(failure(
            audio,
            StageError::BufferTooShort {
                stage: stage.name(),
                len: 0,
                required: 1,
            },
        ));
    }
    if let Some(index) = audio.first_non_finite() {
        return Err(failure(
            audio,
            StageError::NonFinite {
                stage: stage.name(),
                index,
            },
        ));
    }
    Ok(())
}
