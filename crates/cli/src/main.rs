use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use voxveil_core::audio::infrastructure::formant_warper::FormantMode;
use voxveil_core::codec::domain::audio_reader::AudioReader;
use voxveil_core::codec::infrastructure::wav_file_reader::WavFileReader;
use voxveil_core::pipeline::anonymize_voice_use_case::AnonymizeVoiceUseCase;
use voxveil_core::pipeline::pipeline_config::{PipelineConfig, Preset};
use voxveil_core::pipeline::pipeline_logger::{
    NullPipelineLogger, PipelineLogger, StdoutPipelineLogger,
};
use voxveil_core::shared::constants::{INPUT_EXTENSIONS, MAX_UPLOAD_BYTES};

/// Speaker voice anonymization for WAV recordings.
#[derive(Parser, Debug)]
#[command(name = "voxveil")]
struct Cli {
    /// Input WAV file.
    input: PathBuf,

    /// Output WAV file (default: <input>_anonymized.wav next to the input).
    output: Option<PathBuf>,

    /// Disguise tier: light, standard, strong.
    #[arg(long, default_value = "standard")]
    preset: Preset,

    /// JSON pipeline configuration, applied on top of the preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// McAdams coefficient (0-1]; lower values move formants further.
    #[arg(long)]
    mcadams: Option<f64>,

    /// Lower bound of the random pitch shift, in semitones.
    #[arg(long, allow_hyphen_values = true)]
    pitch_min: Option<f64>,

    /// Upper bound of the random pitch shift, in semitones.
    #[arg(long, allow_hyphen_values = true)]
    pitch_max: Option<f64>,

    /// Lower bound of the random time-stretch ratio (enables stretching).
    #[arg(long)]
    time_stretch_min: Option<f64>,

    /// Upper bound of the random time-stretch ratio (enables stretching).
    #[arg(long)]
    time_stretch_max: Option<f64>,

    /// Formant warp strategy: tilt or spectral.
    #[arg(long)]
    formant_mode: Option<FormantMode>,

    /// Formant warp strength (0-0.5).
    #[arg(long)]
    formant_strength: Option<f64>,

    /// Protection noise amplitude (fraction of full scale).
    #[arg(long)]
    noise_level: Option<f64>,

    /// Worker threads for McAdams frame processing.
    #[arg(long)]
    workers: Option<usize>,

    /// Processing sample rate in Hz.
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Print per-stage timings when done.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let audio = WavFileReader.read_audio(&cli.input, config.target_sample_rate)?;
    log::info!(
        "Loaded {} ({:.2}s at {} Hz)",
        cli.input.display(),
        audio.duration(),
        audio.sample_rate()
    );

    let seed = config.seed;
    let use_case = AnonymizeVoiceUseCase::new(config)?;
    let mut logger: Box<dyn PipelineLogger> = if cli.verbose {
        Box::new(StdoutPipelineLogger::new())
    } else {
        Box::new(NullPipelineLogger)
    };

    let sample_rate = audio.sample_rate();
    let artifact = use_case
        .run_with_logger(audio.into_samples(), sample_rate, seed, logger.as_mut())
        .map_err(|e| format!("{e} ({})", e.error_code()))?;
    artifact.write_to(&output)?;

    println!(
        "{} ({:.2}s, seed {})",
        output.display(),
        artifact.duration(),
        artifact.seed()
    );
    Ok(())
}

/// Preset, then JSON file, then individual flags.
fn build_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::from_preset(cli.preset);
    if let Some(path) = &cli.config {
        config = config.overlay_json_file(path)?;
        log::debug!("Applied {} over preset {:?}", path.display(), cli.preset);
    }

    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(c) = cli.mcadams {
        config.mcadams_coefficient = c;
    }
    if let Some(min) = cli.pitch_min {
        config.pitch_range.0 = min;
    }
    if let Some(max) = cli.pitch_max {
        config.pitch_range.1 = max;
    }
    if cli.time_stretch_min.is_some() || cli.time_stretch_max.is_some() {
        let (min, max) = config.time_stretch_range.unwrap_or((1.0, 1.0));
        config.time_stretch_range = Some((
            cli.time_stretch_min.unwrap_or(min),
            cli.time_stretch_max.unwrap_or(max),
        ));
    }
    if let Some(mode) = cli.formant_mode {
        config.formant_mode = mode;
    }
    if let Some(strength) = cli.formant_strength {
        config.formant_strength = strength;
    }
    if let Some(level) = cli.noise_level {
        config.protection_noise_level = level;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(rate) = cli.sample_rate {
        config.target_sample_rate = rate;
    }

    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !has_input_extension(&cli.input) {
        return Err(format!(
            "Input must be one of: {}, got {}",
            INPUT_EXTENSIONS.join(", "),
            cli.input.display()
        )
        .into());
    }
    let size = std::fs::metadata(&cli.input)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(format!(
            "Input is {size} bytes, larger than the {MAX_UPLOAD_BYTES} byte limit"
        )
        .into());
    }
    if let Some(ref output) = cli.output {
        if output == &cli.input {
            return Err("Output must not overwrite the input file".into());
        }
    }
    if cli.workers == Some(0) {
        return Err("Workers must be at least 1".into());
    }
    Ok(())
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| INPUT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_anonymized.wav"))
}
