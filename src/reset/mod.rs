//! Soft reset controller
//!
//! Rebuilds a stream's final table without touching production until the
//! replacement is complete:
//!
//! ```text
//! NotStarted --stage--> Staged --swap--> Swapped
//!      ^                  |
//!      +----- stage ------+   (re-staging is always safe)
//! ```
//!
//! Staging (re)creates `<final>_ab_soft_reset` with the desired schema and,
//! for a full-history reset, types every raw row into it. Swapping replaces
//! the production table in a single transaction. A failed swap leaves the
//! controller `Staged`, so the swap can simply be retried.

use crate::catalog::StreamConfig;
use crate::destination::DestinationDriver;
use crate::error::{Error, Result};
use crate::planner::ResetScope;
use crate::sql::{SqlGenerator, SOFT_RESET_SUFFIX};
use crate::typing::TypingSource;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Progress of a soft reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftResetStatus {
    NotStarted,
    Staged,
    Swapped,
}

impl fmt::Display for SoftResetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftResetStatus::NotStarted => write!(f, "NOT_STARTED"),
            SoftResetStatus::Staged => write!(f, "STAGED"),
            SoftResetStatus::Swapped => write!(f, "SWAPPED"),
        }
    }
}

/// One stream's soft reset
#[derive(Debug, Clone)]
pub struct SoftReset {
    config: Arc<StreamConfig>,
    scope: ResetScope,
    status: SoftResetStatus,
}

impl SoftReset {
    pub fn new(config: Arc<StreamConfig>, scope: ResetScope) -> Self {
        Self {
            config,
            scope,
            status: SoftResetStatus::NotStarted,
        }
    }

    pub fn status(&self) -> SoftResetStatus {
        self.status
    }

    pub fn scope(&self) -> ResetScope {
        self.scope
    }

    fn transition_error(&self, to: SoftResetStatus) -> Error {
        Error::InvalidResetTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Build the side table; allowed from `NotStarted` or `Staged`
    pub async fn stage<D>(&mut self, driver: &D, generator: &SqlGenerator) -> Result<()>
    where
        D: DestinationDriver + ?Sized,
    {
        if self.status == SoftResetStatus::Swapped {
            return Err(self.transition_error(SoftResetStatus::Staged));
        }
        self.status = SoftResetStatus::NotStarted;

        let id = self.config.id();
        info!(
            "Staging soft reset of {} into {}",
            id,
            id.final_table(SOFT_RESET_SUFFIX)
        );

        let mut sql = generator.create_table(&self.config, SOFT_RESET_SUFFIX, true);
        if self.scope == ResetScope::FullHistory {
            sql = sql.concat(generator.typing_operation(
                &self.config,
                TypingSource::FullHistory,
                SOFT_RESET_SUFFIX,
            ));
        }
        driver.execute(&sql).await?;

        self.status = SoftResetStatus::Staged;
        Ok(())
    }

    /// Type more raw rows into the staged side table
    pub async fn retype<D>(
        &mut self,
        driver: &D,
        generator: &SqlGenerator,
        source: TypingSource,
    ) -> Result<()>
    where
        D: DestinationDriver + ?Sized,
    {
        if self.status != SoftResetStatus::Staged {
            return Err(self.transition_error(SoftResetStatus::Staged));
        }
        let sql = generator.typing_operation(&self.config, source, SOFT_RESET_SUFFIX);
        driver.execute(&sql).await
    }

    /// Replace production with the side table
    pub async fn swap<D>(&mut self, driver: &D) -> Result<()>
    where
        D: DestinationDriver + ?Sized,
    {
        if self.status != SoftResetStatus::Staged {
            return Err(self.transition_error(SoftResetStatus::Swapped));
        }

        if let Err(e) = driver.swap(&self.config, SOFT_RESET_SUFFIX).await {
            warn!("Soft reset swap of {} failed: {}", self.config.id(), e);
            return Err(e);
        }

        info!("Swapped soft reset into {}", self.config.id().final_table(""));
        self.status = SoftResetStatus::Swapped;
        Ok(())
    }

    /// Stage, then swap
    pub async fn run<D>(&mut self, driver: &D, generator: &SqlGenerator) -> Result<()>
    where
        D: DestinationDriver + ?Sized,
    {
        self.stage(driver, generator).await?;
        self.swap(driver).await
    }
}
