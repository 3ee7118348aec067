//! Activity-level checkpoints
//!
//! The engine calls [`Checkpoint::reached`] before the first BOM item and
//! after each one. An implementation reports progress and may stop the
//! calculation by returning an error (cancellation, deadline).

use crate::error::CalculationError;

/// Progress sink and cooperative stop signal
pub trait Checkpoint: Send + Sync {
    /// `completed` of `total` BOM items have been accumulated
    fn reached(&self, completed: usize, total: usize) -> Result<(), CalculationError>;
}

/// Checkpoint that never stops the calculation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    #[inline]
    fn reached(&self, _completed: usize, _total: usize) -> Result<(), CalculationError> {
        Ok(())
    }
}

impl<F> Checkpoint for F
where
    F: Fn(usize, usize) -> Result<(), CalculationError> + Send + Sync,
{
    #[inline]
    fn reached(&self, completed: usize, total: usize) -> Result<(), CalculationError> {
        self(completed, total)
    }
}

/// Map item progress onto a 0..=`ceiling` percentage
#[inline]
#[must_use]
pub fn percent(completed: usize, total: usize, ceiling: u8) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let pct = completed * u64::from(ceiling) / total as u64;
    u8::try_from(pct).unwrap_or(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_bounded() {
        assert_eq!(percent(0, 4, 99), 0);
        assert_eq!(percent(2, 4, 99), 49);
        assert_eq!(percent(4, 4, 99), 99);
        assert_eq!(percent(9, 4, 99), 99);
        assert_eq!(percent(1, 0, 99), 0);
    }

    #[test]
    fn closures_are_checkpoints() {
        let stop_after_one = |done: usize, _total: usize| {
            if done > 1 {
                Err(CalculationError::Cancelled)
            } else {
                Ok(())
            }
        };
        assert!(stop_after_one.reached(1, 3).is_ok());
        assert_eq!(stop_after_one.reached(2, 3), Err(CalculationError::Cancelled));
    }
}
