//! Typer-deduper engine
//!
//! Orchestrates one sync's worth of typing and deduplication.
//!
//! # Overview
//!
//! A run has three phases:
//!
//! 1. [`TyperDeduper::prepare`] brings every final table up to date with its
//!    stream config: create, `ALTER TABLE ... ADD COLUMN`, or soft reset
//!    (for `overwrite`, a fresh side table that stays staged until commit).
//! 2. [`TyperDeduper::type_and_dedupe`] types the stream's unprocessed raw
//!    rows. It may be called any number of times while records land.
//! 3. [`TyperDeduper::commit_final_tables`] swaps staged side tables in and
//!    persists destination state.
//!
//! Streams run concurrently up to `max_concurrency`; operations on the same
//! stream are serialized by a per-stream lock.

mod types;

pub use types::{StreamPlan, TypingStats, TyperDeduperOptions};

use crate::catalog::{ParsedCatalog, StreamConfig};
use crate::destination::DestinationDriver;
use crate::differ::{self, ExistingTable, RecordedKeys, SchemaDiff};
use crate::error::{Error, Result};
use crate::planner::{self, DdlPlan, ResetScope};
use crate::reset::SoftReset;
use crate::sql::SqlGenerator;
use crate::state::DestinationStateManager;
use crate::typing::TypingSource;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info};

/// Per-stream progress within a run
#[derive(Debug, Default)]
struct StreamRuntime {
    plan: Option<DdlPlan>,
    /// Overwrite side table waiting for commit
    pending_reset: Option<SoftReset>,
}

#[derive(Debug)]
struct StreamEntry {
    config: Arc<StreamConfig>,
    runtime: tokio::sync::Mutex<StreamRuntime>,
}

/// Types and deduplicates raw tables into final tables
pub struct TyperDeduper<D: DestinationDriver + ?Sized> {
    driver: Arc<D>,
    generator: SqlGenerator,
    streams: Vec<StreamEntry>,
    states: DestinationStateManager,
    options: TyperDeduperOptions,
    stats: Mutex<TypingStats>,
}

impl<D: DestinationDriver + ?Sized> TyperDeduper<D> {
    /// Create an engine for a parsed catalog
    pub fn new(driver: Arc<D>, catalog: ParsedCatalog) -> Self {
        let generator = SqlGenerator::new(driver.dialect());
        let streams = catalog
            .streams
            .into_iter()
            .map(|config| StreamEntry {
                config: Arc::new(config),
                runtime: tokio::sync::Mutex::new(StreamRuntime::default()),
            })
            .collect();

        Self {
            driver,
            generator,
            streams,
            states: DestinationStateManager::new(),
            options: TyperDeduperOptions::default(),
            stats: Mutex::new(TypingStats::new()),
        }
    }

    /// Set engine options
    #[must_use]
    pub fn with_options(mut self, options: TyperDeduperOptions) -> Self {
        self.options = options;
        self
    }

    /// Configured streams, in catalog order
    pub fn streams(&self) -> impl Iterator<Item = &StreamConfig> {
        self.streams.iter().map(|s| s.config.as_ref())
    }

    /// Cached destination state
    pub fn states(&self) -> &DestinationStateManager {
        &self.states
    }

    /// Statistics so far
    pub fn stats(&self) -> TypingStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, f: impl FnOnce(&mut TypingStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    fn entry(&self, namespace: Option<&str>, name: &str) -> Result<&StreamEntry> {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        self.streams
            .iter()
            .find(|s| {
                let id = s.config.id();
                id.original_name == name && id.original_namespace.as_deref() == namespace
            })
            .ok_or_else(|| Error::StreamNotFound {
                stream: match namespace {
                    Some(ns) => format!("{ns}.{name}"),
                    None => name.to_string(),
                },
            })
    }

    // ========================================================================
    // Planning
    // ========================================================================

    async fn plan_stream(&self, config: &StreamConfig) -> Result<StreamPlan> {
        let id = config.id();
        let state = self.states.get(&id.state_key()).await;

        let existing = self
            .driver
            .introspect_final_table(id, "")
            .await?
            .map(|definition| ExistingTable {
                definition,
                recorded: RecordedKeys::from_state(&state),
            });

        let diff = differ::diff(self.generator.dialect(), config, existing.as_ref());
        if let SchemaDiff::Incompatible(reason) = &diff {
            info!("Stream {} needs a soft reset: {}", id, reason);
        }
        let plan = planner::plan_resuming(config, &diff, state.needs_soft_reset);

        Ok(StreamPlan {
            stream: id.to_string(),
            table: id.final_table("").to_string(),
            diff,
            plan,
        })
    }

    /// Compute every stream's plan without changing the destination
    pub async fn plan_all(&self) -> Result<Vec<StreamPlan>> {
        self.states
            .replace(self.driver.load_destination_states().await?)
            .await;

        let mut plans = Vec::with_capacity(self.streams.len());
        for entry in &self.streams {
            plans.push(self.plan_stream(&entry.config).await?);
        }
        Ok(plans)
    }

    // ========================================================================
    // Prepare
    // ========================================================================

    /// Create namespaces and raw tables, then bring every final table up to date
    pub async fn prepare(&self) -> Result<()> {
        self.driver.prepare_state_table().await?;
        self.states
            .replace(self.driver.load_destination_states().await?)
            .await;

        let namespaces: BTreeSet<&str> = self
            .streams
            .iter()
            .flat_map(|s| {
                let id = s.config.id();
                [id.raw_namespace.as_str(), id.final_namespace.as_str()]
            })
            .collect();
        for namespace in namespaces {
            self.driver.create_namespace_if_absent(namespace).await?;
        }

        let results: Vec<Result<()>> = stream::iter(&self.streams)
            .map(|entry| self.prepare_stream(entry))
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;
        first_error(results)
    }

    async fn prepare_stream(&self, entry: &StreamEntry) -> Result<()> {
        let mut runtime = entry.runtime.lock().await;
        let config = &entry.config;
        let id = config.id();
        let key = id.state_key();

        self.driver
            .execute(&self.generator.create_raw_table(id))
            .await?;

        let planned = self.plan_stream(config).await?;
        info!("Preparing {}: {}", planned.table, planned.plan);

        match &planned.plan {
            DdlPlan::NoOp => {}
            DdlPlan::AlterAdd(columns) => {
                self.driver
                    .execute(&planned.plan.operations(config, &self.generator)?)
                    .await?;
                self.record(|s| s.add_columns(columns.len()));
            }
            DdlPlan::SoftReset(ResetScope::FullHistory) => {
                let state = self.states.set_needs_soft_reset(&key, true).await;
                self.driver
                    .commit_destination_states(&HashMap::from([(key.clone(), state)]))
                    .await?;

                let mut reset = SoftReset::new(config.clone(), ResetScope::FullHistory);
                self.record(TypingStats::add_soft_reset);
                reset.run(self.driver.as_ref(), &self.generator).await?;
                self.record(TypingStats::add_swap);

                let state = self
                    .states
                    .update(&key, |s| {
                        s.needs_soft_reset = false;
                        s.record_config(config);
                    })
                    .await;
                self.driver
                    .commit_destination_states(&HashMap::from([(key.clone(), state)]))
                    .await?;
            }
            DdlPlan::SoftReset(ResetScope::CurrentAttempt) => {
                let mut reset = SoftReset::new(config.clone(), ResetScope::CurrentAttempt);
                self.record(TypingStats::add_soft_reset);
                reset.stage(self.driver.as_ref(), &self.generator).await?;
                runtime.pending_reset = Some(reset);
            }
        }

        runtime.plan = Some(planned.plan);
        self.record(TypingStats::add_prepared);
        Ok(())
    }

    // ========================================================================
    // Typing
    // ========================================================================

    /// Type and deduplicate one stream's unprocessed raw rows
    pub async fn type_and_dedupe(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        let entry = self.entry(namespace, name)?;
        self.type_and_dedupe_entry(entry).await
    }

    async fn type_and_dedupe_entry(&self, entry: &StreamEntry) -> Result<()> {
        let mut runtime = entry.runtime.lock().await;
        let config = &entry.config;
        let id = config.id();

        if runtime.plan.is_none() {
            return Err(Error::state(format!(
                "Stream {id} must be prepared before typing"
            )));
        }

        let status = self.driver.raw_table_status(id).await?;
        if !status.has_unprocessed_records {
            debug!("No unprocessed records for {}, skipping typing", id);
            self.record(TypingStats::add_typing_skipped);
            return Ok(());
        }

        let source = TypingSource::Unprocessed {
            since: status.max_processed_timestamp,
        };
        match runtime.pending_reset.as_mut() {
            Some(reset) => {
                reset
                    .retype(self.driver.as_ref(), &self.generator, source)
                    .await?;
            }
            None => {
                let sql = self.generator.typing_operation(config, source, "");
                self.driver.execute(&sql).await?;
            }
        }

        debug!("Typed and deduped {}", id);
        self.record(TypingStats::add_typing_run);
        Ok(())
    }

    /// Type every stream, concurrently
    pub async fn type_and_dedupe_all(&self) -> Result<()> {
        let results: Vec<Result<()>> = stream::iter(&self.streams)
            .map(|entry| async move {
                let result = self.type_and_dedupe_entry(entry).await;
                if let Err(e) = &result {
                    error!("Typing failed for {}: {}", entry.config.id(), e);
                }
                result
            })
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;
        first_error(results)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Swap staged side tables into production and persist destination state
    pub async fn commit_final_tables(&self) -> Result<()> {
        for entry in &self.streams {
            let mut runtime = entry.runtime.lock().await;
            let config = &entry.config;

            if runtime.plan.is_none() {
                debug!("Stream {} was never prepared, keeping its state", config.id());
                continue;
            }

            if let Some(reset) = runtime.pending_reset.as_mut() {
                reset.swap(self.driver.as_ref()).await?;
                self.record(TypingStats::add_swap);
                runtime.pending_reset = None;
            }

            self.states
                .update(&config.id().state_key(), |s| {
                    s.needs_soft_reset = false;
                    s.record_config(config);
                })
                .await;
        }

        let states = self.states.snapshot().await;
        debug!("Committing destination state for {} streams", states.len());
        self.driver.commit_destination_states(&states).await
    }

    /// Prepare, type every stream once, then commit
    pub async fn run(&self) -> Result<TypingStats> {
        let start = Instant::now();

        self.prepare().await?;
        self.type_and_dedupe_all().await?;
        self.commit_final_tables().await?;

        let elapsed = start.elapsed().as_millis() as u64;
        self.record(|s| s.set_duration(elapsed));
        let stats = self.stats();
        info!(
            "Typed {} streams: {} typing runs, {} soft resets, {} columns added in {}ms",
            stats.streams_prepared,
            stats.typing_runs,
            stats.soft_resets,
            stats.columns_added,
            stats.duration_ms
        );
        Ok(stats)
    }
}

impl<D: DestinationDriver + ?Sized> std::fmt::Debug for TyperDeduper<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TyperDeduper")
            .field("streams", &self.streams.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn first_error(results: Vec<Result<()>>) -> Result<()> {
    results.into_iter().collect()
}
