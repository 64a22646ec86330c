pub mod audio_buffer;
pub mod audio_stage;
pub mod frame_executor;
pub mod lpc;
pub mod randomness;
pub mod stage_error;
