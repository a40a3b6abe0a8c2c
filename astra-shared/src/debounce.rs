/// Trailing debounce
///
/// Rapid updates to the same key collapse into one write of the last value,
/// issued once no newer update has arrived for the configured delay. Keys
/// are independent of each other.
///
/// Each [`Debouncer::push`] stamps the key with a fresh generation and spawns
/// a timer. When a timer fires it flushes only if its generation is still
/// the latest for that key; superseded timers do nothing. [`Debouncer::flush`]
/// and [`Debouncer::cancel`] empty the slot early, which turns the pending
/// timer into a no-op as well.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Quiet period before an autosaved draft is written
pub const DRAFT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Destination of debounced values
#[async_trait]
pub trait DebounceSink<K, V>: Send + Sync + 'static {
    async fn flush(&self, key: K, value: V) -> anyhow::Result<()>;
}

struct Slot<V> {
    generation: u64,
    value: V,
}

pub struct Debouncer<K, V> {
    delay: Duration,
    sink: Arc<dyn DebounceSink<K, V>>,
    slots: Arc<Mutex<HashMap<K, Slot<V>>>>,
    generation: Arc<AtomicU64>,
}

impl<K, V> Clone for Debouncer<K, V> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            sink: self.sink.clone(),
            slots: self.slots.clone(),
            generation: self.generation.clone(),
        }
    }
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    pub fn new(delay: Duration, sink: Arc<dyn DebounceSink<K, V>>) -> Self {
        Self {
            delay,
            sink,
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records `value` as the latest for `key` and restarts its timer
    pub fn push(&self, key: K, value: V) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.insert(key.clone(), Slot { generation, value });
        }

        let this = self.clone();
        tokio::spawn(async move {
            sleep(this.delay).await;
            this.fire(key, generation).await;
        });
    }

    /// Number of keys waiting to be flushed
    pub fn pending(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Writes the pending value for `key` now instead of waiting
    ///
    /// Returns `false` when nothing was pending.
    pub async fn flush(&self, key: &K) -> anyhow::Result<bool> {
        let Some(value) = self.take(key) else {
            return Ok(false);
        };

        self.sink.flush(key.clone(), value).await?;
        Ok(true)
    }

    /// Drops the pending value for `key` without writing it
    pub fn cancel(&self, key: &K) -> bool {
        self.take(key).is_some()
    }

    fn take(&self, key: &K) -> Option<V> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
            .map(|slot| slot.value)
    }

    async fn fire(&self, key: K, generation: u64) {
        let value = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match slots.get(&key) {
                Some(slot) if slot.generation == generation => slots.remove(&key).map(|s| s.value),
                _ => None,
            }
        };

        let Some(value) = value else {
            return;
        };

        if let Err(e) = self.sink.flush(key.clone(), value).await {
            tracing::warn!(key = ?key, error = %e, "Debounced write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<(u32, String)>>,
    }

    #[async_trait]
    impl DebounceSink<u32, String> for Recorder {
        async fn flush(&self, key: u32, value: String) -> anyhow::Result<()> {
            self.writes.lock().unwrap().push((key, value));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_updates_write_last_value_once() {
        let recorder = Arc::new(Recorder::default());
        let debouncer: Debouncer<u32, String> = Debouncer::new(DRAFT_DEBOUNCE, recorder.clone());

        for text in ["H", "He", "Hel", "Hello"] {
            debouncer.push(7, text.to_string());
            sleep(Duration::from_millis(500)).await;
        }

        assert!(recorder.writes.lock().unwrap().is_empty());
        assert_eq!(debouncer.pending(), 1);

        sleep(Duration::from_secs(3)).await;

        assert_eq!(*recorder.writes.lock().unwrap(), vec![(7, "Hello".to_string())]);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let recorder = Arc::new(Recorder::default());
        let debouncer: Debouncer<u32, String> = Debouncer::new(Duration::from_secs(2), recorder.clone());

        debouncer.push(1, "a".to_string());
        debouncer.push(2, "b".to_string());
        sleep(Duration::from_secs(3)).await;

        let mut writes = recorder.writes.lock().unwrap().clone();
        writes.sort();
        assert_eq!(writes, vec![(1, "a".to_string()), (2, "b".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_after_quiet_period_writes_again() {
        let recorder = Arc::new(Recorder::default());
        let debouncer: Debouncer<u32, String> = Debouncer::new(Duration::from_secs(2), recorder.clone());

        debouncer.push(1, "first".to_string());
        sleep(Duration::from_secs(3)).await;
        debouncer.push(1, "second".to_string());
        sleep(Duration::from_secs(3)).await;

        assert_eq!(recorder.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_value_immediately() {
        let recorder = Arc::new(Recorder::default());
        let debouncer: Debouncer<u32, String> = Debouncer::new(DRAFT_DEBOUNCE, recorder.clone());

        debouncer.push(1, "v1".to_string());
        debouncer.push(1, "v2".to_string());
        sleep(Duration::from_millis(500)).await;

        assert!(debouncer.flush(&1).await.unwrap());
        assert_eq!(*recorder.writes.lock().unwrap(), vec![(1, "v2".to_string())]);
        assert_eq!(debouncer.pending(), 0);

        // The timer that was waiting finds nothing left to write
        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.writes.lock().unwrap().len(), 1);
        assert!(!debouncer.flush(&1).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_value() {
        let recorder = Arc::new(Recorder::default());
        let debouncer: Debouncer<u32, String> = Debouncer::new(DRAFT_DEBOUNCE, recorder.clone());

        debouncer.push(1, "stale".to_string());
        debouncer.push(2, "kept".to_string());
        assert!(debouncer.cancel(&1));
        assert!(!debouncer.cancel(&1));

        sleep(Duration::from_secs(3)).await;
        assert_eq!(*recorder.writes.lock().unwrap(), vec![(2, "kept".to_string())]);
    }
}
