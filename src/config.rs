//! Tuning knobs for a [`LockFreeSet`](crate::LockFreeSet) and its reclaimer.

/// Reclamation and allocation thresholds.
///
/// ```
/// use lfset::SetConfig;
///
/// let config = SetConfig::default()
///     .with_pool_capacity(128)
///     .with_max_participants(Some(16));
/// assert_eq!(config.pool_capacity, 128);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetConfig {
    /// Hazard strategy scans once the retirement list holds more than
    /// `scan_factor` × registered participants.
    pub scan_factor: usize,
    /// Lower bound on the hazard scan threshold.
    pub min_scan_threshold: usize,
    /// Epoch strategy attempts advance + collect every this many retirements.
    pub collect_threshold: usize,
    /// Reclaimed nodes each thread keeps for reuse.
    pub pool_capacity: usize,
    /// Upper bound on concurrently registered handles, `None` for unbounded.
    pub max_participants: Option<usize>,
}

impl Default for SetConfig {
    fn default() -> Self {
        SetConfig {
            scan_factor: 2,
            min_scan_threshold: 16,
            collect_threshold: 64,
            pool_capacity: 64,
            max_participants: None,
        }
    }
}

impl SetConfig {
    pub fn with_scan_factor(mut self, scan_factor: usize) -> Self {
        self.scan_factor = scan_factor.max(1);
        self
    }

    pub fn with_min_scan_threshold(mut self, threshold: usize) -> Self {
        self.min_scan_threshold = threshold;
        self
    }

    pub fn with_collect_threshold(mut self, threshold: usize) -> Self {
        self.collect_threshold = threshold.max(1);
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_max_participants(mut self, limit: Option<usize>) -> Self {
        self.max_participants = limit;
        self
    }

    /// Retired-list length above which a hazard scan runs.
    pub(crate) fn scan_threshold(&self, participants: usize) -> usize {
        (self.scan_factor * participants).max(self.min_scan_threshold)
    }
}
