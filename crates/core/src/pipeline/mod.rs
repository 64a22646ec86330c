pub mod anonymize_error;
pub mod anonymize_voice_use_case;
pub mod output_artifact;
pub mod pipeline_config;
pub mod pipeline_logger;
pub mod stage_factory;
