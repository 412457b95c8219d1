use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Server counters.
#[derive(Debug, Default)]
pub struct ServerStats {
    connections_accepted: AtomicU64,
    connections_active: AtomicUsize,
    binds_ok: AtomicU64,
    binds_failed: AtomicU64,
    submits_ok: AtomicU64,
    submits_failed: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub connections_active: usize,
    pub binds_ok: u64,
    pub binds_failed: u64,
    pub submits_ok: u64,
    pub submits_failed: u64,
}

impl ServerStats {
    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn bind(&self, ok: bool) {
        let counter = if ok { &self.binds_ok } else { &self.binds_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submit outcome. Handler errors and non-OK statuses count as failed.
    pub fn submit(&self, ok: bool) {
        let counter = if ok { &self.submits_ok } else { &self.submits_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.connections_active.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            binds_ok: self.binds_ok.load(Ordering::Relaxed),
            binds_failed: self.binds_failed.load(Ordering::Relaxed),
            submits_ok: self.submits_ok.load(Ordering::Relaxed),
            submits_failed: self.submits_failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ServerStats::default();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.bind(true);
        stats.bind(false);
        stats.submit(true);

        let snap = stats.snapshot();
        assert_eq!(snap.connections_accepted, 2);
        assert_eq!(snap.connections_active, 1);
        assert_eq!(snap.binds_ok, 1);
        assert_eq!(snap.binds_failed, 1);
        assert_eq!(snap.submits_ok, 1);
        assert_eq!(snap.submits_failed, 0);
    }
}
