use std::sync::atomic::{AtomicI64, Ordering};

/// Server-side insert timestamps in Unix seconds, never decreasing within the
/// process even if the wall clock steps backwards.
#[derive(Debug, Default)]
pub struct InsertClock {
    last: AtomicI64,
}

impl InsertClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> i64 {
        self.observe(chrono::Utc::now().timestamp())
    }

    fn observe(&self, wall: i64) -> i64 {
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}
