use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::key::NotificationKey;

/// True if a send at `last` still suppresses a send at `now`.
pub fn within_window(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match last {
        Some(last) => now - last < window,
        None => false,
    }
}

/// Recently used notification keys.
///
/// A key is reserved before its send and released again if the send fails,
/// so a failed delivery never blocks the next attempt.
pub struct DedupWindow {
    window: Duration,
    sent: Mutex<HashMap<NotificationKey, DateTime<Utc>>>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            sent: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve `key` at `now`. Returns false if it was used within the window.
    pub fn try_reserve(&self, key: &NotificationKey, now: DateTime<Utc>) -> bool {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        let window = self.window;
        sent.retain(|_, at| within_window(Some(*at), now, window));
        if within_window(sent.get(key).copied(), now, window) {
            return false;
        }
        sent.insert(key.clone(), now);
        true
    }

    pub fn release(&self, key: &NotificationKey) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RequestId;
    use crate::domains::notifications::key::NotificationKind;

    fn key() -> NotificationKey {
        NotificationKey::derive(NotificationKind::NewRequest, RequestId::new(), None)
    }

    #[test]
    fn test_second_reserve_inside_window_is_refused() {
        let dedup = DedupWindow::new(Duration::seconds(60));
        let now = Utc::now();
        let k = key();

        assert!(dedup.try_reserve(&k, now));
        assert!(!dedup.try_reserve(&k, now + Duration::seconds(59)));
    }

    #[test]
    fn test_reserve_after_window_is_allowed() {
        let dedup = DedupWindow::new(Duration::seconds(60));
        let now = Utc::now();
        let k = key();

        assert!(dedup.try_reserve(&k, now));
        assert!(dedup.try_reserve(&k, now + Duration::seconds(60)));
    }

    #[test]
    fn test_release_frees_key() {
        let dedup = DedupWindow::new(Duration::seconds(60));
        let now = Utc::now();
        let k = key();

        assert!(dedup.try_reserve(&k, now));
        dedup.release(&k);
        assert!(dedup.try_reserve(&k, now));
    }

    #[test]
    fn test_expired_keys_are_pruned() {
        let dedup = DedupWindow::new(Duration::seconds(10));
        let now = Utc::now();

        assert!(dedup.try_reserve(&key(), now));
        assert!(dedup.try_reserve(&key(), now + Duration::seconds(30)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_zero_window_never_suppresses() {
        let now = Utc::now();
        assert!(!within_window(Some(now), now, Duration::zero()));
    }
}
