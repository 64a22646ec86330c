use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::frame_executor::FrameExecutor;
use crate::audio::infrastructure::formant_warper::FormantWarper;
use crate::audio::infrastructure::mcadams_anonymizer::{McAdamsAnonymizer, McAdamsSettings};
use crate::audio::infrastructure::noise_reducer::NoiseReducer;
use crate::audio::infrastructure::normalizer::Normalizer;
use crate::audio::infrastructure::pitch_time_modifier::PitchTimeModifier;
use crate::audio::infrastructure::pre_emphasis_filter::PreEmphasisFilter;
use crate::audio::infrastructure::protection_noise_injector::ProtectionNoiseInjector;
use crate::audio::infrastructure::sequential_frame_executor::SequentialFrameExecutor;
use crate::audio::infrastructure::threaded_frame_executor::ThreadedFrameExecutor;

use super::pipeline_config::{PipelineConfig, StageKind};

/// Instantiates the configured stage list, in order.
///
/// Only a normalize placed after protection noise honours the silence
/// floor; earlier ones are plain peak normalizers.
pub fn build_stages(config: &PipelineConfig) -> Vec<Box<dyn AudioStage>> {
    let mut noise_injected = false;
    config
        .stages
        .iter()
        .map(|kind| {
            let stage: Box<dyn AudioStage> = match kind {
                StageKind::Normalize if !noise_injected => Box::new(Normalizer::default()),
                _ => build_stage(*kind, config),
            };
            noise_injected |= *kind == StageKind::ProtectionNoise;
            stage
        })
        .collect()
}

pub fn build_stage(kind: StageKind, config: &PipelineConfig) -> Box<dyn AudioStage> {
    match kind {
        StageKind::NoiseReduction => Box::new(NoiseReducer::new(config.noise_reduction_strength)),
        StageKind::PreEmphasis => Box::new(PreEmphasisFilter::new(config.pre_emphasis)),
        StageKind::Normalize => Box::new(Normalizer::new(config.silence_floor)),
        StageKind::PitchTime => Box::new(PitchTimeModifier::new(
            config.pitch_range,
            config.time_stretch_range,
        )),
        StageKind::FormantWarp => Box::new(FormantWarper::new(
            config.formant_mode,
            config.formant_strength,
        )),
        StageKind::McAdams => Box::new(McAdamsAnonymizer::new(
            McAdamsSettings {
                coefficient: config.mcadams_coefficient,
                lpc_order: config.lpc_order,
                frame_length: config.frame_length,
                hop_length: config.hop_length,
            },
            frame_executor(config.workers),
        )),
        StageKind::ProtectionNoise => {
            Box::new(ProtectionNoiseInjector::new(config.protection_noise_level))
        }
    }
}

fn frame_executor(workers: usize) -> Box<dyn FrameExecutor> {
    if workers > 1 {
        log::debug!("McAdams frames on {workers} worker threads");
        Box::new(ThreadedFrameExecutor::new(workers))
    } else {
        Box::new(SequentialFrameExecutor)
    }
}
