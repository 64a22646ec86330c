use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples the anonymizer from specific output mechanisms (stdout, log
/// crate, tests) so each caller can observe pipeline behavior without
/// changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Report stage-level progress.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. peak level, input duration).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Metric name under which the orchestrator reports the input duration.
pub const AUDIO_SECONDS_METRIC: &str = "audio_seconds";

/// CLI-oriented logger that tracks per-stage timing and metrics and
/// provides a summary report when the run completes.
pub struct StdoutPipelineLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    total_stages: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            total_stages: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = Vec::new();

        lines.push(format!(
            "Pipeline summary ({} stages, {:.2}s total):",
            self.total_stages,
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:16}: {total_ms:8.1}ms x{}  ({pct:4.1}%)",
                durations.len()
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };
            lines.push(format!("  {name}: avg {avg:.3}"));
        }

        let audio_seconds: f64 = self
            .metrics
            .get(AUDIO_SECONDS_METRIC)
            .map(|v| v.iter().sum())
            .unwrap_or(0.0);
        if audio_seconds > 0.0 && elapsed_ms > 0.0 {
            let speed = audio_seconds / (elapsed_ms / 1000.0);
            lines.push(format!("  Speed: {speed:.1}x real time"));
        }

        Some(lines.join("\n"))
    }

    /// Returns the timing data for a given stage.
    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Returns the metric data for a given name.
    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_stages = total;
        if total > 0 {
            log::debug!("Stage {current}/{total} done");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 8);
        logger.timing("mcadams", 5.0);
        logger.metric("peak", 0.5);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StdoutPipelineLogger::new();
        logger.timing("normalize", 1.0);
        logger.timing("normalize", 2.0);
        logger.timing("mcadams", 40.0);

        let normalize = logger.timings_for("normalize").unwrap();
        assert_eq!(normalize.len(), 2);
        approx::assert_relative_eq!(normalize[1], 2.0);
        assert_eq!(logger.timings_for("mcadams").unwrap().len(), 1);
        assert!(logger.timings_for("formant_warp").is_none());
    }

    #[test]
    fn test_metric_records_values() {
        let mut logger = StdoutPipelineLogger::new();
        logger.metric("peak", 0.25);
        logger.metric("peak", 0.75);

        let values = logger.metrics_for("peak").unwrap();
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        approx::assert_relative_eq!(avg, 0.5);
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = StdoutPipelineLogger::new();
        logger.progress(2, 2);
        logger.timing("pitch_time", 20.0);
        logger.timing("mcadams", 30.0);
        logger.metric("peak", 0.5);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Pipeline summary (2 stages"));
        assert!(summary.contains("pitch_time"));
        assert!(summary.contains("mcadams"));
        assert!(summary.contains("peak: avg 0.500"));
    }

    #[test]
    fn test_summary_includes_speed_when_duration_known() {
        let mut logger = StdoutPipelineLogger::new();
        logger.metric(AUDIO_SECONDS_METRIC, 3.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("real time"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutPipelineLogger::default();
        logger.info("hello world");
        assert_eq!(logger.messages, vec!["hello world".to_string()]);
    }
}
