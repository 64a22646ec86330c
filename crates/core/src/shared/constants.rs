/// Processing sample rate used unless a configuration overrides it.
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16000;

/// Encoded artifacts smaller than this are treated as truncated by the encoder.
pub const MIN_ARTIFACT_BYTES: usize = 1000;

/// Shortest recording the pipeline accepts (100ms).
pub const MIN_INPUT_DURATION_SECS: f64 = 0.1;

/// Largest upload the CLI boundary will hand to the pipeline (20 MB).
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

pub const INPUT_EXTENSIONS: &[&str] = &["wav"];

/// Peak level (-60 dBFS) at or below which a normalize that follows protection
/// noise leaves the buffer untouched, so noise added to a silent recording is
/// not scaled up to full level. Normalizes earlier in the chain use no floor.
pub const DEFAULT_SILENCE_FLOOR: f64 = 1e-3;
