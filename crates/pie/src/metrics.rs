//! Metrics descriptions and a terminal recorder built on metrics-rs.
//!
//! The dispatcher records interrupt traffic under the `pie_*` names
//! described in [`init`]; [`CliRecorder`] keeps the values in memory so the
//! CLI can print them when it exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    describe_counter, describe_gauge, gauge,
};
use parking_lot::RwLock;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "pie_interrupts_total",
        Unit::Count,
        "Guest interrupts dispatched, by category"
    );
    describe_counter!(
        "pie_synchronized_calls_total",
        Unit::Count,
        "Interrupts deferred to the designated host context"
    );
    describe_counter!(
        "pie_fatal_stops_total",
        Unit::Count,
        "Guests stopped by a fatal interrupt"
    );
    describe_counter!(
        "pie_host_errors_total",
        Unit::Count,
        "Host calls that failed and were reported to the guest"
    );

    describe_gauge!("pie_open_files", Unit::Count, "Open guest file descriptors");
    describe_gauge!(
        "pie_firmware_size_bytes",
        Unit::Bytes,
        "Size of the loaded firmware image"
    );
    describe_gauge!(
        "pie_firmware_symbols",
        Unit::Count,
        "Entries in the loaded symbol map"
    );
}

/// Record the firmware a virtual machine booted from.
#[allow(clippy::cast_precision_loss)]
pub fn record_firmware(name: &str, size: usize, symbols: usize) {
    let labels = [("firmware", name.to_string())];
    gauge!("pie_firmware_size_bytes", &labels).set(size as f64);
    gauge!("pie_firmware_symbols", &labels).set(symbols as f64);
}

#[derive(Debug, Default)]
struct Snapshot {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
}

type Shared = Arc<RwLock<Snapshot>>;

struct CliCounter {
    key: String,
    snapshot: Shared,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self
            .snapshot
            .write()
            .counters
            .entry(self.key.clone())
            .or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.snapshot
            .write()
            .counters
            .insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    snapshot: Shared,
}

impl CliGauge {
    fn update(&self, f: impl FnOnce(&mut f64)) {
        let mut snapshot = self.snapshot.write();
        f(snapshot.gauges.entry(self.key.clone()).or_insert(0.0));
    }
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        self.update(|v| *v += value);
    }

    fn decrement(&self, value: f64) {
        self.update(|v| *v -= value);
    }

    fn set(&self, value: f64) {
        self.update(|v| *v = value);
    }
}

/// Recorder that keeps counters and gauges in memory for terminal output.
///
/// Histograms are not recorded.
#[derive(Default)]
pub struct CliRecorder {
    snapshot: Shared,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder.
    ///
    /// Returns `None` if another recorder was installed first.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let snapshot = Arc::clone(&self.snapshot);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { snapshot })
    }

    /// Handle onto this recorder's values without installing it.
    #[must_use]
    pub fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|label| format!("{}={}", label.key(), label.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            snapshot: Arc::clone(&self.snapshot),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            snapshot: Arc::clone(&self.snapshot),
        }))
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

/// Read access to the values collected by a [`CliRecorder`].
#[derive(Clone)]
pub struct CliRecorderHandle {
    snapshot: Shared,
}

impl CliRecorderHandle {
    /// Counter value by rendered key, e.g. `pie_interrupts_total{category=vfs}`.
    #[must_use]
    pub fn counter(&self, key: &str) -> Option<u64> {
        self.snapshot.read().counters.get(key).copied()
    }

    #[must_use]
    pub fn gauge(&self, key: &str) -> Option<f64> {
        self.snapshot.read().gauges.get(key).copied()
    }

    /// Print every collected value, sorted by key.
    pub fn print_summary(&self) {
        let snapshot = self.snapshot.read();
        if snapshot.counters.is_empty() && snapshot.gauges.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        if !snapshot.counters.is_empty() {
            println!();
            println!("### Counters");
            for (key, value) in &snapshot.counters {
                println!("  {key}: {value}");
            }
        }
        if !snapshot.gauges.is_empty() {
            println!();
            println!("### Gauges");
            for (key, value) in &snapshot.gauges {
                println!("  {key}: {value}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use metrics::{CounterFn, GaugeFn, Label};

    use super::*;

    #[test]
    fn test_key_to_string() {
        assert_eq!(key_to_string(&Key::from_name("pie_open_files")), "pie_open_files");

        let key = Key::from_parts(
            "pie_interrupts_total",
            vec![Label::new("category", "vfs")],
        );
        assert_eq!(key_to_string(&key), "pie_interrupts_total{category=vfs}");
    }

    #[test]
    fn test_recorder_storage() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();

        let counter = CliCounter {
            key: "pie_fatal_stops_total".to_string(),
            snapshot: Arc::clone(&recorder.snapshot),
        };
        counter.increment(2);
        counter.increment(3);
        assert_eq!(handle.counter("pie_fatal_stops_total"), Some(5));
        counter.absolute(1);
        assert_eq!(handle.counter("pie_fatal_stops_total"), Some(1));

        let gauge = CliGauge {
            key: "pie_open_files".to_string(),
            snapshot: Arc::clone(&recorder.snapshot),
        };
        gauge.set(3.0);
        gauge.decrement(1.0);
        assert_eq!(handle.gauge("pie_open_files"), Some(2.0));
        assert_eq!(handle.gauge("missing"), None);
    }

    #[test]
    fn test_record_firmware() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_firmware("v1.0.0", 1024, 12);
        });
        assert_eq!(
            handle.gauge("pie_firmware_size_bytes{firmware=v1.0.0}"),
            Some(1024.0)
        );
        assert_eq!(handle.gauge("pie_firmware_symbols{firmware=v1.0.0}"), Some(12.0));
    }
}
