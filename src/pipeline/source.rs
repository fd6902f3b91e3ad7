//! Sample source abstraction.
//!
//! The processing loop reads zone samples from any [`SampleSource`]:
//! JSON lines on stdin for live feeds, or a pre-loaded vector for replays
//! and tests.

use crate::types::ZoneSample;
use anyhow::Result;
use async_trait::async_trait;

/// Events produced by a sample source.
#[derive(Debug)]
pub enum SampleEvent {
    Sample(ZoneSample),
    /// No more data
    Eof,
}

/// Where zone samples come from.
///
/// The processing loop calls [`next_sample`](SampleSource::next_sample) in a
/// `select!` with cancellation, so implementations must be cancel-safe.
#[async_trait]
pub trait SampleSource: Send + 'static {
    async fn next_sample(&mut self) -> Result<SampleEvent>;

    /// Name for logging
    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays pre-loaded samples with an optional delay between them.
pub struct ReplaySource {
    samples: std::vec::IntoIter<ZoneSample>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<ZoneSample>, delay_ms: u64) -> Self {
        Self {
            samples: samples.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.samples.next() {
            Some(s) => {
                self.yielded_first = true;
                Ok(SampleEvent::Sample(s))
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON lines)
// ============================================================================

/// Reads one JSON `ZoneSample` per line from stdin.
///
/// `simulation | thermal-zones` feeds the daemon this way.
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(512),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for StdinSource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            match parse_line(&self.line_buffer) {
                Some(Ok(sample)) => return Ok(SampleEvent::Sample(sample)),
                Some(Err(e)) => tracing::warn!(error = %e, "Skipping malformed sample line"),
                None => {}
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

/// Parse one input line. `None` for blank lines.
pub fn parse_line(line: &str) -> Option<serde_json::Result<ZoneSample>> {
    let line = line.trim();
    (!line.is_empty()).then(|| serde_json::from_str(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;
    use chrono::Utc;

    #[test]
    fn test_parse_line() {
        assert!(parse_line("   \n").is_none());
        assert!(parse_line("{not json").unwrap().is_err());

        let line = r#"{"zone":"office","timestamp":"2025-01-10T08:00:00Z","indoor_temp":20.5,"outdoor_temp":4.0,"heating_active":true,"power_w":1200.0}"#;
        let parsed = parse_line(line).unwrap().unwrap();
        assert_eq!(parsed.zone, "office");
        assert_eq!(parsed.sample.power_w, Some(1200.0));
        assert!(parsed.sample.energy_kwh.is_none());
    }

    #[tokio::test]
    async fn test_replay_source_ends_with_eof() {
        let sample = ZoneSample {
            zone: "a".into(),
            sample: Sample::new(Utc::now(), 20.0, 5.0, true),
        };
        let mut source = ReplaySource::new(vec![sample], 0);
        assert!(matches!(source.next_sample().await.unwrap(), SampleEvent::Sample(_)));
        assert!(matches!(source.next_sample().await.unwrap(), SampleEvent::Eof));
        assert!(matches!(source.next_sample().await.unwrap(), SampleEvent::Eof));
    }
}
