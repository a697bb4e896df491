//! Short-lived collision filter keyed on source UDP port (§4.4, P6, §9).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The single policy constant governing the window: an entry older than this
/// is pruned and no longer suppresses a duplicate.
pub const WINDOW: Duration = Duration::from_millis(100);

/// Thread-safe `port -> last-seen` map. A mutex-guarded `HashMap` is enough:
/// the design explicitly tolerates lost updates under races (worst case one
/// extra forwarded duplicate), so there's no need for anything fancier.
#[derive(Default)]
pub struct DedupWindow {
    seen: Mutex<HashMap<u16, Instant>>,
}

impl DedupWindow {
    pub fn new() -> Self {
        DedupWindow {
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Prune stale entries, then check-and-record `port`.
    ///
    /// Returns `true` if the caller should proceed (the port was not seen
    /// within the window), `false` if it should suppress this forward.
    pub fn check_and_record(&self, port: u16) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap();
        seen.retain(|_, t| now.duration_since(*t) <= WINDOW);

        if seen.contains_key(&port) {
            false
        } else {
            seen.insert(port, now);
            true
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn second_hit_within_window_is_suppressed() {
        let dedup = DedupWindow::new();
        assert!(dedup.check_and_record(54321));
        assert!(!dedup.check_and_record(54321));
    }

    #[test]
    fn distinct_ports_do_not_collide() {
        let dedup = DedupWindow::new();
        assert!(dedup.check_and_record(1));
        assert!(dedup.check_and_record(2));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn entry_expires_after_window() {
        let dedup = DedupWindow::new();
        assert!(dedup.check_and_record(42));
        sleep(WINDOW + Duration::from_millis(50));
        // The stale entry is pruned on this very call, then re-recorded.
        assert!(dedup.check_and_record(42));
    }

    #[test]
    fn pruning_does_not_affect_fresh_entries() {
        let dedup = DedupWindow::new();
        assert!(dedup.check_and_record(1));
        sleep(WINDOW + Duration::from_millis(50));
        assert!(dedup.check_and_record(2)); // prunes port 1, records port 2
        assert_eq!(dedup.len(), 1);
    }
}
