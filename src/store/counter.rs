use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CounterStore, WindowCount};
use crate::error::StoreError;

/// Expired windows are swept once the map grows past this many keys
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

impl Window {
    fn snapshot(&self, now: Instant) -> WindowCount {
        WindowCount {
            count: self.count,
            resets_in: self.expires_at.saturating_duration_since(now),
        }
    }
}

/// In-process counter store with lazy expiry
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<WindowCount>, StoreError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        match windows.get(key) {
            Some(window) if window.expires_at > now => Ok(Some(window.snapshot(now))),
            Some(_) => {
                windows.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| w.expires_at > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            *entry = Window {
                count: 0,
                expires_at: now + window,
            };
        }
        entry.count += 1;

        Ok(entry.snapshot(now))
    }
}
