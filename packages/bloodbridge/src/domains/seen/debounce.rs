use chrono::{DateTime, Duration, Utc};

/// True when a call at `now` is allowed given the last completed call.
pub fn is_open(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last {
        Some(last) => now - last >= interval,
        None => true,
    }
}

/// Minimum-interval gate. Only completed calls move the window.
#[derive(Debug, Clone)]
pub struct MinIntervalGate {
    interval: Duration,
    last_completed: Option<DateTime<Utc>>,
}

impl MinIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: None,
        }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        is_open(self.last_completed, now, self.interval)
    }

    pub fn record(&mut self, completed_at: DateTime<Utc>) {
        self.last_completed = Some(completed_at);
    }

    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        self.last_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_first_call_is_open() {
        assert!(is_open(None, t0(), Duration::seconds(3)));
    }

    #[test]
    fn test_closed_inside_interval_open_at_boundary() {
        let interval = Duration::seconds(3);
        assert!(!is_open(Some(t0()), t0() + Duration::milliseconds(2999), interval));
        assert!(is_open(Some(t0()), t0() + Duration::seconds(3), interval));
    }

    #[test]
    fn test_zero_interval_is_always_open() {
        assert!(is_open(Some(t0()), t0(), Duration::zero()));
    }

    #[test]
    fn test_gate_moves_only_on_record() {
        let mut gate = MinIntervalGate::new(Duration::seconds(3));
        assert!(gate.is_open(t0()));
        gate.record(t0());
        assert!(!gate.is_open(t0() + Duration::seconds(1)));
        assert_eq!(gate.last_completed(), Some(t0()));
    }
}
