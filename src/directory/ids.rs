use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id source. Ids are decimal strings of the wall clock in
/// milliseconds, bumped past the last issued (or observed) id so two calls in
/// the same millisecond still get distinct values.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self { Self { last: AtomicU64::new(0) } }

    /// Record an id that already exists so later ids never collide with it.
    pub fn observe(&self, id: &str) {
        if let Ok(n) = id.parse::<u64>() {
            self.last.fetch_max(n, Ordering::SeqCst);
        }
    }

    pub fn next_id(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|p| p);
        now.max(prev + 1).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_strictly_increasing() {
        let g = IdGenerator::new();
        let mut seen = HashSet::new();
        let mut last = 0u64;
        for _ in 0..1000 {
            let id = g.next_id();
            let n: u64 = id.parse().unwrap();
            assert!(n > last);
            last = n;
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn observed_ids_are_skipped() {
        let g = IdGenerator::new();
        let far_future = (chrono::Utc::now().timestamp_millis() as u64 + 1_000_000).to_string();
        g.observe(&far_future);
        g.observe("not-a-number");
        let next: u64 = g.next_id().parse().unwrap();
        assert!(next > far_future.parse::<u64>().unwrap());
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let g = std::sync::Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = g.clone();
                std::thread::spawn(move || (0..250).map(|_| g.next_id()).collect::<Vec<_>>())
            })
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 1000);
    }
}
