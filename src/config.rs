use crate::error::PoolError;
use std::time::Duration;

/// Deadlines applied by the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on each persistence phase of a transfer.
    pub transfer_timeout: Duration,
    /// Bound on a single audit append.
    pub audit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transfer_timeout: Duration::from_secs(5),
            audit_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            workers: 10,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        if self.workers == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pool = PoolConfig::default();
        assert_eq!(pool.queue_capacity, 100);
        assert_eq!(pool.workers, 10);
        assert!(pool.validate().is_ok());
        assert_eq!(EngineConfig::default().transfer_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let empty_queue = PoolConfig {
            queue_capacity: 0,
            workers: 1,
        };
        assert_eq!(empty_queue.validate(), Err(PoolError::InvalidCapacity));

        let no_workers = PoolConfig {
            queue_capacity: 1,
            workers: 0,
        };
        assert_eq!(no_workers.validate(), Err(PoolError::InvalidWorkerCount));
    }
}
