//! Scheduled poll cycles over a list of targets.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use crate::fetch::Fetcher;
use crate::labeled_url::LabeledUrl;
use crate::parser::PrometheusTextParser;
use crate::record::{MetricSample, Record, current_timestamp_millis};
use crate::sink::EventSink;

/// Shortest period accepted by [`Poller::run`].
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Poll cycle options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerConfig {
    /// Routing tag for emitted records.
    pub tag: String,
    /// Record field receiving the source URL.
    pub event_url_key: Option<String>,
    /// Record field receiving the source label.
    pub event_url_label_key: Option<String>,
}

/// Statistics from one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Targets attempted.
    pub targets: usize,
    /// Targets whose fetch failed.
    pub targets_failed: usize,
    /// Records accepted by the sink.
    pub records_emitted: usize,
    /// Records rejected by the sink.
    pub records_failed: usize,
}

impl CycleStats {
    /// Total number of records handed to the sink.
    pub fn total(&self) -> usize {
        self.records_emitted + self.records_failed
    }

    /// Emission success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.records_emitted as f64 / self.total() as f64) * 100.0
        }
    }
}

/// Scrapes every target in order and forwards the samples to a sink.
pub struct Poller<S> {
    targets: Vec<LabeledUrl>,
    fetcher: Fetcher,
    parser: PrometheusTextParser,
    sink: S,
    config: PollerConfig,
}

impl<S: EventSink> Poller<S> {
    /// Create a poller. The target list is fixed for the poller's lifetime.
    pub fn new(
        targets: Vec<LabeledUrl>,
        fetcher: Fetcher,
        parser: PrometheusTextParser,
        sink: S,
        config: PollerConfig,
    ) -> Self {
        Self {
            targets,
            fetcher,
            parser,
            sink,
            config,
        }
    }

    /// Targets in polling order.
    pub fn targets(&self) -> &[LabeledUrl] {
        &self.targets
    }

    /// The sink receiving emitted records.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run poll cycles forever, one every `period`.
    ///
    /// A cycle always completes before the next one starts; ticks missed
    /// while a slow cycle runs are delayed rather than bunched up. A zero
    /// period is raised to [`MIN_PERIOD`].
    pub async fn run(self, period: Duration) {
        if period < MIN_PERIOD {
            tracing::warn!(
                requested_ms = period.as_millis() as u64,
                "Poll period too short, using {:?}",
                MIN_PERIOD
            );
        }
        let period = period.max(MIN_PERIOD);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            tag = %self.config.tag,
            targets = self.targets.len(),
            interval_secs = period.as_secs_f64(),
            "Starting Prometheus poller"
        );

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Perform a single poll cycle over all targets.
    pub async fn poll_once(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        for target in &self.targets {
            stats.targets += 1;
            let cycle_time = current_timestamp_millis();

            let body = match self.fetcher.fetch(target.url()).await {
                Ok(body) => body,
                Err(e) => {
                    stats.targets_failed += 1;
                    tracing::error!(url = %target, error = %e, "Failed to fetch metrics");
                    continue;
                }
            };

            let mut records = Vec::new();
            let parsed = self.parser.parse(&body, |timestamp, sample| {
                records.push((timestamp.unwrap_or(cycle_time), self.enrich(target, sample)));
            });

            tracing::debug!(
                url = %target,
                samples = parsed.samples,
                skipped = parsed.skipped,
                "Decoded metrics"
            );

            for (time, record) in records {
                match self.sink.emit(&self.config.tag, time, record).await {
                    Ok(()) => {
                        stats.records_emitted += 1;
                        tracing::trace!(url = %target, time, "Emitted record");
                    }
                    Err(e) => {
                        stats.records_failed += 1;
                        tracing::warn!(url = %target, error = %e, "Failed to emit record");
                    }
                }
            }
        }

        tracing::debug!(
            targets = stats.targets,
            targets_failed = stats.targets_failed,
            records = stats.records_emitted,
            records_failed = stats.records_failed,
            "Poll cycle complete"
        );

        stats
    }

    /// Turn a sample into a record carrying the configured source fields.
    fn enrich(&self, target: &LabeledUrl, sample: MetricSample) -> Record {
        let mut record = sample.into_record();

        if let Some(key) = &self.config.event_url_key {
            record.insert(key.as_str(), target.url());
        }
        if let (Some(key), Some(label)) = (&self.config.event_url_label_key, target.label()) {
            record.insert(key.as_str(), label);
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::parser::ParserConfig;
    use crate::record::FieldValue;
    use crate::sink::MemorySink;

    fn poller(config: PollerConfig) -> Poller<MemorySink> {
        Poller::new(
            Vec::new(),
            Fetcher::new(&FetchConfig::default()).unwrap(),
            PrometheusTextParser::new(ParserConfig::default()).unwrap(),
            MemorySink::new(),
            config,
        )
    }

    #[test]
    fn test_enrich_injects_url_and_label() {
        let poller = poller(PollerConfig {
            tag: "test".into(),
            event_url_key: Some("tag_url".into()),
            event_url_label_key: Some("tag_label".into()),
        });
        let target = LabeledUrl::parse("@east@http://localhost:12345").unwrap();

        let record = poller.enrich(&target, MetricSample::new("up", 1.0));
        assert_eq!(
            record.get("tag_url").and_then(FieldValue::as_str),
            Some("http://localhost:12345")
        );
        assert_eq!(
            record.get("tag_label").and_then(FieldValue::as_str),
            Some("east")
        );
    }

    #[test]
    fn test_enrich_injects_empty_label() {
        let poller = poller(PollerConfig {
            tag: "test".into(),
            event_url_key: None,
            event_url_label_key: Some("tag_label".into()),
        });
        let target = LabeledUrl::parse("@@http://localhost:12345").unwrap();

        let record = poller.enrich(&target, MetricSample::new("up", 1.0));
        assert_eq!(record.get("tag_label").and_then(FieldValue::as_str), Some(""));
        assert!(!record.contains_key("tag_url"));
    }

    #[test]
    fn test_enrich_skips_absent_label() {
        let poller = poller(PollerConfig {
            tag: "test".into(),
            event_url_key: None,
            event_url_label_key: Some("tag_label".into()),
        });
        let target = LabeledUrl::parse("http://localhost:12345").unwrap();

        let record = poller.enrich(&target, MetricSample::new("up", 1.0));
        assert!(!record.contains_key("tag_label"));
    }

    #[test]
    fn test_enrich_without_keys_leaves_record_alone() {
        let poller = poller(PollerConfig::default());
        let target = LabeledUrl::parse("@east@http://localhost:12345").unwrap();

        let record = poller.enrich(&target, MetricSample::new("up", 1.0));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_cycle_stats() {
        let mut stats = CycleStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.records_emitted = 3;
        stats.records_failed = 1;
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.success_rate(), 75.0);
    }

    #[tokio::test]
    async fn test_run_with_zero_period() {
        let poller = poller(PollerConfig::default());
        let result =
            tokio::time::timeout(Duration::from_millis(50), poller.run(Duration::ZERO)).await;
        assert!(result.is_err(), "run returns only when cancelled");
    }

    #[tokio::test]
    async fn test_cycle_without_targets() {
        let poller = poller(PollerConfig::default());
        let stats = poller.poll_once().await;
        assert_eq!(stats, CycleStats::default());
        assert!(poller.sink().events().is_empty());
    }
}
