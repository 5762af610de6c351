//! The sampling pipeline: readers in, registry out.
//!
//! A cycle runs every reader once, routes gauge samples straight to the
//! registry and counter samples through the [`RateConverter`]. A failing
//! reader affects only its own keys: previously published values stay in
//! the registry (stale, still served) and the source's `up` gauge drops
//! to 0. Down/up transitions are logged once, not every cycle.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::collector::{ReadError, Sample, SampleKind, SharedReader};
use crate::rates::RateConverter;
use crate::registry::{MetricKey, MetricKind, MetricRegistry, MetricValue};

const SOURCE_UP: &str = "hostglow_source_up";
const SOURCE_UP_HELP: &str = "Whether the last read of this source succeeded (1) or failed (0)";

/// Per-cycle routing of samples into the shared registry.
///
/// Owned by the sampling loop; only the registry is shared with readers
/// of the exposition endpoint.
pub struct Pipeline {
    converter: RateConverter,
    registry: Arc<MetricRegistry>,
    /// Last known health per source, for transition logging.
    source_ok: HashMap<&'static str, bool>,
    /// Values accumulated this cycle, committed as one batch.
    pending: Vec<MetricValue>,
    now: f64,
}

impl Pipeline {
    pub fn new(converter: RateConverter, registry: Arc<MetricRegistry>) -> Self {
        Self {
            converter,
            registry,
            source_ok: HashMap::new(),
            pending: Vec::new(),
            now: 0.0,
        }
    }

    /// Starts a cycle stamped with the given wall-clock seconds.
    pub fn begin_cycle(&mut self, now: f64) {
        self.converter.begin_cycle();
        self.pending.clear();
        self.now = now;
    }

    /// Routes one reader's outcome into the pending batch.
    pub fn publish(&mut self, source_id: &'static str, outcome: Result<Vec<Sample>, ReadError>) {
        let up = match outcome {
            Ok(samples) => {
                if self.source_ok.get(source_id) == Some(&false) {
                    info!(source = source_id, "source recovered");
                }
                for sample in samples {
                    self.route(sample);
                }
                true
            }
            Err(e) => {
                if self.source_ok.get(source_id) != Some(&false) {
                    warn!(source = source_id, error = %e, "source read failed, keeping last values");
                }
                false
            }
        };
        self.source_ok.insert(source_id, up);

        self.pending.push(MetricValue {
            key: MetricKey::new(
                SOURCE_UP,
                vec![("source".to_string(), source_id.to_string())],
            ),
            kind: MetricKind::Gauge,
            value: if up { 1.0 } else { 0.0 },
            help: SOURCE_UP_HELP,
            last_updated: self.now,
        });
    }

    fn route(&mut self, sample: Sample) {
        let key = MetricKey::new(
            sample.name,
            sample
                .labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        );

        let (kind, value) = match sample.kind {
            SampleKind::Gauge => (MetricKind::Gauge, sample.value),
            SampleKind::Counter => {
                // No rate yet (first sight, reset, bad dt): publish nothing
                // and let any previous rate stand.
                match self.converter.convert(&key, sample.value, self.now) {
                    Some(rate) => (MetricKind::Rate, rate),
                    None => return,
                }
            }
        };

        self.pending.push(MetricValue {
            key,
            kind,
            value,
            help: sample.help,
            last_updated: self.now,
        });
    }

    /// Commits the cycle's batch in one registry write and evicts stale
    /// converter state.
    pub fn end_cycle(&mut self) {
        self.registry.upsert_batch(std::mem::take(&mut self.pending));
        self.converter.end_cycle();
    }
}

/// Synchronous cycle driver over a fixed reader set.
pub struct Sampler {
    readers: Vec<SharedReader>,
    pipeline: Pipeline,
}

impl Sampler {
    pub fn new(readers: Vec<SharedReader>, pipeline: Pipeline) -> Self {
        Self { readers, pipeline }
    }

    /// Runs one full cycle at the given wall-clock seconds.
    pub fn run_cycle(&mut self, now: f64) {
        self.pipeline.begin_cycle(now);
        for reader in &self.readers {
            let (source_id, outcome) = {
                let mut guard = reader.lock().unwrap_or_else(|e| e.into_inner());
                (guard.source_id(), guard.read())
            };
            self.pipeline.publish(source_id, outcome);
        }
        self.pipeline.end_cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockCommand, MockFs};
    use crate::collector::{ReadError, build_readers};
    use crate::config::{AgentConfig, GpuType};
    use crate::render::render;
    use std::time::Duration;

    fn sampler_for(fs: MockFs, cfg: &AgentConfig) -> (Sampler, Arc<MetricRegistry>) {
        let registry = Arc::new(MetricRegistry::new());
        let readers = build_readers(fs, MockCommand::new(), cfg).unwrap();
        let converter = RateConverter::new(cfg.stale_cycles, cfg.max_rate_dt_secs());
        let pipeline = Pipeline::new(converter, Arc::clone(&registry));
        (Sampler::new(readers, pipeline), registry)
    }

    fn netdev_with_rx(rx_bytes: u64) -> String {
        format!(
            "Inter-| Receive | Transmit\n \
             face |bytes packets errs drop fifo frame compressed multicast|bytes packets errs drop fifo colls carrier compressed\n\
             enp3s0: {} 10 0 0 0 0 0 0 2000 20 0 0 0 0 0 0\n",
            rx_bytes
        )
    }

    #[test]
    fn network_rate_appears_on_second_cycle() {
        let fs = MockFs::typical_system();
        fs.set_file("/proc/net/dev", netdev_with_rx(1000));
        let cfg = AgentConfig {
            net_interface_filter: Some("enp".to_string()),
            ..AgentConfig::default()
        };
        let (mut sampler, registry) = sampler_for(fs.clone(), &cfg);

        sampler.run_cycle(100.0);
        let first = render(&registry.snapshot());
        assert!(!first.contains("hostglow_network_receive_bytes_per_second{"));

        // 500 bytes over 10 seconds.
        fs.set_file("/proc/net/dev", netdev_with_rx(1500));
        sampler.run_cycle(110.0);
        let second = render(&registry.snapshot());
        assert!(second.contains(
            "hostglow_network_receive_bytes_per_second{interface=\"enp3s0\"} 50\n"
        ));
    }

    #[test]
    fn failed_source_keeps_last_value_and_drops_up() {
        let fs = MockFs::typical_system();
        let cfg = AgentConfig::default();
        let (mut sampler, registry) = sampler_for(fs.clone(), &cfg);

        sampler.run_cycle(100.0);
        let healthy = render(&registry.snapshot());
        assert!(healthy.contains("hostglow_load_average_1m 0.52\n"));
        assert!(healthy.contains("hostglow_source_up{source=\"loadavg\"} 1\n"));

        fs.remove_file("/proc/loadavg");
        sampler.run_cycle(110.0);
        sampler.run_cycle(120.0);

        let degraded = render(&registry.snapshot());
        // The last good reading is still served, only the up gauge moved.
        assert!(degraded.contains("hostglow_load_average_1m 0.52\n"));
        assert!(degraded.contains("hostglow_source_up{source=\"loadavg\"} 0\n"));
        assert!(degraded.contains("hostglow_source_up{source=\"meminfo\"} 1\n"));
    }

    #[test]
    fn source_recovers_after_failure() {
        let fs = MockFs::typical_system();
        let cfg = AgentConfig::default();
        let (mut sampler, registry) = sampler_for(fs.clone(), &cfg);

        sampler.run_cycle(100.0);
        fs.remove_file("/proc/uptime");
        sampler.run_cycle(110.0);
        fs.set_file("/proc/uptime", "99999.00 100000.00\n");
        sampler.run_cycle(120.0);

        let out = render(&registry.snapshot());
        assert!(out.contains("hostglow_uptime_seconds 99999\n"));
        assert!(out.contains("hostglow_source_up{source=\"uptime\"} 1\n"));
    }

    #[test]
    fn gpu_none_publishes_no_gpu_keys() {
        let fs = MockFs::typical_system();
        let cfg = AgentConfig::default();
        assert_eq!(cfg.gpu_type, GpuType::None);
        let (mut sampler, registry) = sampler_for(fs, &cfg);

        sampler.run_cycle(100.0);
        sampler.run_cycle(110.0);
        assert!(
            registry
                .snapshot()
                .iter()
                .all(|v| !v.key.name.contains("gpu"))
        );
    }

    #[test]
    fn thermal_millidegrees_render_as_degrees() {
        let fs = MockFs::typical_system();
        let (mut sampler, registry) = sampler_for(fs, &AgentConfig::default());
        sampler.run_cycle(100.0);
        assert!(render(&registry.snapshot()).contains("hostglow_cpu_temperature_celsius 45\n"));
    }

    #[test]
    fn disk_rates_use_bytes() {
        let fs = MockFs::typical_system();
        let (mut sampler, registry) = sampler_for(fs.clone(), &AgentConfig::default());

        sampler.run_cycle(100.0);
        // 100 more sectors read over 10s: 100 * 512 / 10 = 5120 B/s.
        fs.set_file(
            "/proc/diskstats",
            "   8       0 sda 1334 0 56889 100 5678 0 98765 200 0 150 300 0 0 0 0\n",
        );
        sampler.run_cycle(110.0);

        assert!(render(&registry.snapshot())
            .contains("hostglow_disk_read_bytes_per_second{device=\"sda\"} 5120\n"));
    }

    #[test]
    fn timeout_counts_as_source_failure() {
        let registry = Arc::new(MetricRegistry::new());
        let converter = RateConverter::new(5, 100.0);
        let mut pipeline = Pipeline::new(converter, Arc::clone(&registry));

        pipeline.begin_cycle(100.0);
        pipeline.publish(
            "thermal",
            Err(ReadError::Timeout {
                after: Duration::from_secs(5),
            }),
        );
        pipeline.end_cycle();

        assert!(render(&registry.snapshot())
            .contains("hostglow_source_up{source=\"thermal\"} 0\n"));
    }
}
