use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use super::config::{ConfigDelta, Field, SimulationConfig};

/// Sole owner of the live [`SimulationConfig`].
///
/// Readers take a shared lock just long enough to copy the record out;
/// writers hold the exclusive lock across the whole multi-field write.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<SimulationConfig>>,
}

impl ConfigStore {
    pub fn new(initial: SimulationConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn snapshot(&self) -> SimulationConfig {
        *self.inner.read()
    }

    /// Writes the present fields of `delta` and returns the config as left
    /// by this write. Logging happens after the write lock is released.
    pub fn apply(&self, delta: &ConfigDelta) -> SimulationConfig {
        let applied = {
            let mut guard = self.inner.write();
            *guard = guard.merged(delta);
            *guard
        };

        for field in Field::ALL {
            if let Some(value) = delta.get(field) {
                info!("setting {} to {}", describe(field), value);
            }
        }

        applied
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

fn describe(field: Field) -> &'static str {
    match field {
        Field::MaxDuration => "max duration",
        Field::ErrorRate => "error rate",
        Field::RequestRate => "request rate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::config::LimitsForm;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Log writer recording whether the store was readable at write time.
    struct LockCheckWriter {
        store: ConfigStore,
        writes: Arc<AtomicUsize>,
        blocked: Arc<AtomicUsize>,
    }

    impl io::Write for LockCheckWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.store.inner.try_read().is_none() {
                self.blocked.fetch_add(1, Ordering::SeqCst);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn delta(max: Option<f64>, err: Option<f64>, rate: Option<f64>) -> ConfigDelta {
        ConfigDelta::new(max, err, rate).unwrap()
    }

    #[test]
    fn test_apply_error_rate_only() {
        let store = ConfigStore::default();
        let after = store.apply(&delta(None, Some(0.5), None));

        let expected = SimulationConfig::new(10.0, 0.5, 1.0).unwrap();
        assert_eq!(after, expected);
        assert_eq!(store.snapshot(), expected);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = ConfigStore::default();
        let d = delta(Some(3.0), None, Some(25.0));

        let once = store.apply(&d);
        let twice = store.apply(&d);
        assert_eq!(once, twice);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn test_rejected_update_leaves_store_unchanged() {
        let store = ConfigStore::default();
        store.apply(&delta(Some(4.0), Some(0.3), Some(2.0)));
        let before = store.snapshot();

        let rejected = [
            LimitsForm {
                max_duration: Some("-1".to_string()),
                ..Default::default()
            },
            LimitsForm {
                request_rate: Some("abc".to_string()),
                ..Default::default()
            },
            LimitsForm {
                max_duration: Some("7".to_string()),
                error_rate: Some("1.5".to_string()),
                ..Default::default()
            },
        ];

        for form in rejected {
            if let Ok(d) = form.into_delta() {
                store.apply(&d);
            }
            assert_eq!(store.snapshot(), before);
        }
    }

    #[test]
    fn test_clones_share_state() {
        let store = ConfigStore::default();
        let other = store.clone();
        other.apply(&delta(None, None, Some(50.0)));
        assert_eq!(store.snapshot().request_rate, 50.0);
    }

    #[test]
    fn test_concurrent_snapshots_never_see_partial_writes() {
        let a = SimulationConfig::new(1.0, 0.0, 1.0).unwrap();
        let b = SimulationConfig::new(9.0, 1.0, 100.0).unwrap();
        let store = ConfigStore::new(a);

        let writers: Vec<_> = (0..2)
            .map(|i| {
                let store = store.clone();
                let target = if i == 0 { a } else { b };
                thread::spawn(move || {
                    let d = delta(
                        Some(target.max_duration),
                        Some(target.error_rate),
                        Some(target.request_rate),
                    );
                    for _ in 0..5_000 {
                        store.apply(&d);
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let snap = store.snapshot();
                        assert!(snap == a || snap == b, "torn snapshot: {:?}", snap);
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_apply_logs_outside_write_lock() {
        let store = ConfigStore::default();
        let writes = Arc::new(AtomicUsize::new(0));
        let blocked = Arc::new(AtomicUsize::new(0));

        let subscriber = {
            let (store, writes, blocked) = (store.clone(), writes.clone(), blocked.clone());
            tracing_subscriber::fmt()
                .with_writer(move || LockCheckWriter {
                    store: store.clone(),
                    writes: writes.clone(),
                    blocked: blocked.clone(),
                })
                .finish()
        };

        tracing::subscriber::with_default(subscriber, || {
            store.apply(&delta(Some(2.0), Some(0.2), Some(3.0)));
        });

        assert!(writes.load(Ordering::SeqCst) >= 3);
        assert_eq!(blocked.load(Ordering::SeqCst), 0);
    }
}
