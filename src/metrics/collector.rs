// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Round metrics
    pub rounds_total: IntCounter,
    pub round_duration_seconds: HistogramVec,

    // Probe metrics
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub target_up: IntGaugeVec,

    // Notification metrics
    pub notifications_total: IntCounterVec,

    // Summary gauges
    pub targets_online: IntGauge,
    pub targets_total: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let rounds_total = IntCounter::new("watchdog_rounds_total", "Completed polling rounds")?;
        registry.register(Box::new(rounds_total.clone()))?;

        let round_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "watchdog_round_duration_seconds",
                "Time from dispatch to the end of evaluation",
            ),
            &["changed"],
        )?;
        registry.register(Box::new(round_duration_seconds.clone()))?;

        let probes_total = IntCounterVec::new(
            Opts::new("watchdog_probes_total", "TCP probes by outcome"),
            &["target", "result"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new("watchdog_probe_duration_seconds", "TCP probe duration"),
            &["target"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let target_up = IntGaugeVec::new(
            Opts::new("watchdog_target_up", "Target status (1=online, 0=offline)"),
            &["target"],
        )?;
        registry.register(Box::new(target_up.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new("watchdog_notifications_total", "Change notifications by outcome"),
            &["result"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let targets_online = IntGauge::new("watchdog_targets_online", "Targets currently online")?;
        registry.register(Box::new(targets_online.clone()))?;

        let targets_total = IntGauge::new("watchdog_targets_total", "Monitored targets")?;
        registry.register(Box::new(targets_total.clone()))?;

        Ok(Self {
            rounds_total,
            round_duration_seconds,
            probes_total,
            probe_duration_seconds,
            target_up,
            notifications_total,
            targets_online,
            targets_total,
        })
    }

    pub fn record_probe(&self, target: &str, reachable: bool, duration: Duration) {
        let result = if reachable { "up" } else { "down" };
        self.probes_total
            .with_label_values(&[target, result])
            .inc();

        self.probe_duration_seconds
            .with_label_values(&[target])
            .observe(duration.as_secs_f64());
    }

    pub fn update_target_status(&self, target: &str, online: bool) {
        let value = if online { 1 } else { 0 };
        self.target_up.with_label_values(&[target]).set(value);
    }

    pub fn record_round(&self, changed: bool, duration: Duration) {
        self.rounds_total.inc();
        let label = if changed { "true" } else { "false" };
        self.round_duration_seconds
            .with_label_values(&[label])
            .observe(duration.as_secs_f64());
    }

    pub fn record_notification(&self, delivered: bool) {
        let result = if delivered { "sent" } else { "failed" };
        self.notifications_total.with_label_values(&[result]).inc();
    }

    pub fn update_target_counts(&self, online: usize, total: usize) {
        self.targets_online.set(online as i64);
        self.targets_total.set(total as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_recorded_values() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_probe("web", true, Duration::from_millis(3));
        metrics.update_target_status("web", true);
        metrics.record_round(false, Duration::from_millis(5));
        metrics.record_notification(false);
        metrics.update_target_counts(1, 2);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("watchdog_rounds_total 1"));
        assert!(text.lines().any(|l| l.starts_with("watchdog_probes_total{")
            && l.contains("result=\"up\"")
            && l.contains("target=\"web\"")
            && l.ends_with(" 1")));
        assert!(text.contains("watchdog_target_up{target=\"web\"} 1"));
        assert!(text.contains("watchdog_notifications_total{result=\"failed\"} 1"));
        assert!(text.contains("watchdog_targets_online 1"));
        assert!(text.contains("watchdog_targets_total 2"));
    }
}
