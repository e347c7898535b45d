/// Running tallies for one sweep. Both counters only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub deleted: u64,
    pub skipped: u64,
}

impl SweepStats {
    pub fn record_deleted(&mut self) {
        self.deleted += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Distinct tweets handled so far
    pub fn observed(&self) -> u64 {
        self.deleted + self.skipped
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} tweets are deleted and {} tweets are protected.",
            self.deleted, self.skipped
        )
    }
}
