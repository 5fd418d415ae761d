use std::time::{Duration, Instant};

use moka::future::Cache;

/// Keys that must wait before requesting again. Entries expire on their own once the
/// window has passed; the stored value is the instant the wait ends.
pub struct WaitList {
    entries: Cache<String, Instant>,
    window: Duration,
}

impl WaitList {
    /// `None` when the configured waiting time disables the limit.
    pub fn from_seconds(waiting_time_seconds: i64, max_capacity: u64) -> Option<Self> {
        if waiting_time_seconds <= 0 {
            return None;
        }
        let window = Duration::from_secs(waiting_time_seconds as u64);
        Some(Self::new(window, max_capacity))
    }

    pub fn new(window: Duration, max_capacity: u64) -> Self {
        assert!(!window.is_zero(), "Wait window must be positive");
        assert!(max_capacity > 0, "Wait list capacity must be positive");
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(window)
            .build();
        Self { entries, window }
    }

    /// Starts a fresh window for `key`.
    pub async fn block(&self, key: &str) {
        self.entries
            .insert(key.to_string(), Instant::now() + self.window)
            .await;
    }

    /// Claims `key` for a whole window unless it is already waiting, in which case the
    /// time left is returned. Only one of several concurrent callers wins the claim.
    pub async fn reserve(&self, key: &str) -> Result<(), Duration> {
        let until = Instant::now() + self.window;
        let entry = self.entries.entry(key.to_string()).or_insert(until).await;
        if entry.is_fresh() {
            return Ok(());
        }
        let left = entry.into_value().saturating_duration_since(Instant::now());
        if left.is_zero() {
            // Elapsed but not evicted yet.
            self.block(key).await;
            return Ok(());
        }
        Err(left)
    }

    /// Drops a claim that did not lead to a send.
    pub async fn release(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Time left before `key` may request again, if it is currently blocked.
    #[cfg(test)]
    pub async fn remaining(&self, key: &str) -> Option<Duration> {
        let until = self.entries.get(key).await?;
        let left = until.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn non_positive_waiting_time_disables() {
        assert!(WaitList::from_seconds(0, 100).is_none());
        assert!(WaitList::from_seconds(-5, 100).is_none());
        let list = WaitList::from_seconds(60, 100).expect("enabled");
        assert_eq!(list.window, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn blocked_keys_report_remaining_time() {
        let list = WaitList::new(Duration::from_secs(3_600), 100);
        assert!(list.remaining("203.0.113.7").await.is_none());

        list.block("203.0.113.7").await;
        let left = list.remaining("203.0.113.7").await.expect("blocked");
        assert!(left <= Duration::from_secs(3_600));
        assert!(left > Duration::from_secs(3_590));
        assert!(list.remaining("203.0.113.8").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let list = WaitList::new(Duration::from_millis(50), 100);
        list.block("key").await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(list.remaining("key").await.is_none());
    }

    #[tokio::test]
    async fn reserve_then_release() {
        let list = WaitList::new(Duration::from_secs(600), 100);
        assert_eq!(list.reserve("key").await, Ok(()));
        let left = list.reserve("key").await.expect_err("already claimed");
        assert!(left > Duration::from_secs(590));

        list.release("key").await;
        assert!(list.remaining("key").await.is_none());
        assert_eq!(list.reserve("key").await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_concurrent_claim_wins() {
        let list = Arc::new(WaitList::new(Duration::from_secs(600), 100));
        let claims: Vec<_> = (0..16)
            .map(|_| {
                let list = Arc::clone(&list);
                tokio::spawn(async move { list.reserve("198.51.100.1").await.is_ok() })
            })
            .collect();
        let mut won = 0;
        for claim in claims {
            if claim.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 1);
    }
}
