//! Per-extraction budget tracking.

use crate::ExtractionError;
use crate::ExtractionLimits;
use crate::QuotaResource;
use crate::Result;

/// Counters checked against [`ExtractionLimits`] while one archive is
/// extracted.
///
/// Created at extraction start and dropped at extraction end; never shared
/// between extractions.
#[derive(Debug)]
pub struct ExtractionBudget {
    limits: ExtractionLimits,
    declared_total: u64,
}

impl ExtractionBudget {
    /// Creates an empty budget.
    #[must_use]
    pub const fn new(limits: ExtractionLimits) -> Self {
        Self {
            limits,
            declared_total: 0,
        }
    }

    /// Checks the number of entries the archive declares.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::QuotaExceeded`] if `count` is above the
    /// entry ceiling.
    pub fn check_entry_count(&self, count: usize) -> Result<()> {
        if count > self.limits.max_entries {
            return Err(ExtractionError::QuotaExceeded {
                resource: QuotaResource::EntryCount {
                    current: count,
                    max: self.limits.max_entries,
                },
            });
        }
        Ok(())
    }

    /// Adds an entry's declared uncompressed size to the running total.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::QuotaExceeded`] if the total overflows or
    /// goes above the size ceiling.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposweep_core::ExtractionLimits;
    /// use reposweep_core::security::ExtractionBudget;
    ///
    /// let limits = ExtractionLimits {
    ///     max_total_size: 100,
    ///     ..Default::default()
    /// };
    /// let mut budget = ExtractionBudget::new(limits);
    /// assert!(budget.record_declared(60).is_ok());
    /// assert!(budget.record_declared(60).is_err());
    /// ```
    pub fn record_declared(&mut self, size: u64) -> Result<()> {
        let total = self
            .declared_total
            .checked_add(size)
            .ok_or(ExtractionError::QuotaExceeded {
                resource: QuotaResource::IntegerOverflow,
            })?;

        if total > self.limits.max_total_size {
            return Err(ExtractionError::QuotaExceeded {
                resource: QuotaResource::TotalSize {
                    current: total,
                    max: self.limits.max_total_size,
                },
            });
        }

        self.declared_total = total;
        Ok(())
    }

    /// Returns the declared bytes accepted so far.
    #[must_use]
    pub const fn declared_total(&self) -> u64 {
        self.declared_total
    }
}
