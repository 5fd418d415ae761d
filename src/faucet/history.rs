use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::models::faucet::SendRecord;

/// Number of recent sends reported by `GET /queue`.
pub const MAX_RECENT_SENDS: usize = 5;

#[derive(Default)]
pub struct SendHistory {
    entries: Mutex<VecDeque<SendRecord>>,
}

impl SendHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, record: SendRecord) {
        let mut entries = self.entries.lock().await;
        entries.push_back(record);
        while entries.len() > MAX_RECENT_SENDS {
            entries.pop_front();
        }
        assert!(entries.len() <= MAX_RECENT_SENDS, "Send history bound broken");
    }

    /// Oldest first.
    pub async fn snapshot(&self) -> Vec<SendRecord> {
        self.entries.lock().await.iter().cloned().collect()
    }
}
