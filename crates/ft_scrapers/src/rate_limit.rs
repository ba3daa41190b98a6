use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use url::Url;

/// Enforces a minimum delay between outbound requests to the same origin,
/// so repeated polling does not get a source throttled or blocked.
///
/// Each caller reserves the next free slot for its origin under the lock,
/// then sleeps outside it, so waiters queue up without holding the map.
pub struct RateLimiter {
    min_delay: Duration,
    slots: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `url`'s origin is allowed.
    pub async fn wait(&self, url: &str) {
        let origin = Self::origin(url);
        let slot = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let slot = match slots.get(&origin) {
                Some(prev) => (*prev + self.min_delay).max(now),
                None => now,
            };
            slots.insert(origin, slot);
            slot
        };
        sleep_until(slot).await;
    }

    fn origin(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_else(|| url.to_string())
    }
}
