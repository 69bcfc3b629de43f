/// How finalized states are laid down in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStrategy {
    /// Write a full state snapshot every `archive_state_epoch_frequency`
    /// epochs.
    Frequency,
    /// Reserved: delta-encoded snapshots between anchors.
    Differential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub archive_strategy: ArchiveStrategy,
    /// Epoch interval between archived full states.
    pub archive_state_epoch_frequency: u64,
    /// Bounded retries for transient persistence failures during import.
    pub import_max_retries: u32,
    /// Base backoff between retries; doubled on each attempt.
    pub import_retry_backoff_millis: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            archive_strategy: ArchiveStrategy::Frequency,
            archive_state_epoch_frequency: 1024,
            import_max_retries: 3,
            import_retry_backoff_millis: 100,
        }
    }
}
