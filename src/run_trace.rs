use chrono::{ DateTime, Utc };
use log::{ info, debug };
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Ok,
    Error,
}

#[derive(Serialize, Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub session_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub latency_ms: u128,
    pub outcome: RunOutcome,
}

/// Per-turn run tracing, active only when an API key was configured.
/// The key gates the feature; it is never written out.
#[derive(Clone, Debug, Default)]
pub struct RunTracer {
    enabled: bool,
}

pub struct RunSpan {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl RunTracer {
    pub fn new(api_key: Option<&str>, tracing_v2: bool) -> Self {
        let has_key = api_key.map(|k| !k.trim().is_empty()).unwrap_or(false);
        Self { enabled: has_key && tracing_v2 }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn start(&self) -> Option<RunSpan> {
        if !self.enabled {
            return None;
        }
        Some(RunSpan {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            start: Instant::now(),
        })
    }

    pub fn finish(
        &self,
        span: Option<RunSpan>,
        session_id: &str,
        model: &str,
        outcome: RunOutcome
    ) -> Option<RunRecord> {
        let span = span?;
        let record = RunRecord {
            run_id: span.run_id,
            session_id: session_id.to_string(),
            model: model.to_string(),
            started_at: span.started_at,
            latency_ms: span.start.elapsed().as_millis(),
            outcome,
        };
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "run_trace", "{}", json),
            Err(e) => debug!("Failed to serialize run record: {}", e),
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_key_disables_tracing() {
        assert!(!RunTracer::new(None, true).is_enabled());
        assert!(!RunTracer::new(Some("  "), true).is_enabled());
        assert!(!RunTracer::new(Some("ls-key"), false).is_enabled());
        assert!(RunTracer::new(Some("ls-key"), true).is_enabled());
    }

    #[test]
    fn disabled_tracer_records_nothing() {
        let tracer = RunTracer::disabled();
        let span = tracer.start();
        assert!(span.is_none());
        assert!(tracer.finish(span, "s", "llama3", RunOutcome::Ok).is_none());
    }

    #[test]
    fn enabled_tracer_produces_record() {
        let tracer = RunTracer::new(Some("ls-key"), true);
        let span = tracer.start();
        let record = tracer.finish(span, "session-1", "llama3", RunOutcome::Error).unwrap();
        assert_eq!(record.session_id, "session-1");
        assert_eq!(record.model, "llama3");
        assert_eq!(record.outcome, RunOutcome::Error);
    }
}
