// EnrichmentOrchestrator: sequences candidate selection, adapter calls,
// merges and verification.
//
// Strictly sequential. One record is fetched, parsed, merged and verified
// before the next begins, with a fixed cooldown between external calls. Each
// merge is flushed to disk, so an interrupted run resumes from whatever the
// verifier still finds incomplete.
//
// Census runs an initial pass plus at most `max_retry_passes` more over the
// records still incomplete. Tasks are rebuilt from store state every pass.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use anyhow::anyhow;
use landscout_common::{IdentityKey, Market, Record};
use landscout_store::{IngestReport, RawBatch, RecordStore, StoreError};
use tracing::{debug, info, warn};

use crate::census::CensusSource;
use crate::cooldown::Cooldown;
use crate::distance::DistanceAdapter;
use crate::error::{EnrichError, Result};
use crate::report::{CensusRunReport, DistanceRunReport};
use crate::verifier::{audit, classify, missing_fields, needs_distance, AuditReport, Completeness};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Fetching,
    Parsed,
    Merged,
    Verified(Completeness),
}

/// One incomplete record for the duration of one pass.
#[derive(Debug, Clone)]
pub struct EnrichmentTask {
    pub key: IdentityKey,
    pub label: String,
    pub missing: BTreeSet<String>,
    /// Fetch attempts for this record so far in the run, this one included
    /// once it starts.
    pub attempts: u32,
    state: TaskState,
}

impl EnrichmentTask {
    /// A pending task for `record`, if it has coordinates and lacks any
    /// required field.
    pub fn pending(record: &Record) -> Option<Self> {
        let key = record.identity_key()?;
        let missing = missing_fields(record);
        if missing.is_empty() {
            return None;
        }
        Some(Self {
            key,
            label: record.label(),
            missing,
            attempts: 0,
            state: TaskState::Pending,
        })
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn advance(&mut self, next: TaskState) {
        debug!(record = %self.label, from = ?self.state, to = ?next, "task transition");
        self.state = next;
    }
}

pub struct EnrichmentOrchestrator {
    store: RecordStore,
    census: Option<Box<dyn CensusSource>>,
    census_cooldown: Cooldown,
    distance: Option<DistanceAdapter>,
    distance_cooldown: Cooldown,
}

impl EnrichmentOrchestrator {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            census: None,
            census_cooldown: Cooldown::new(Duration::ZERO),
            distance: None,
            distance_cooldown: Cooldown::new(Duration::ZERO),
        }
    }

    pub fn with_census(mut self, source: Box<dyn CensusSource>, cooldown: Duration) -> Self {
        self.census = Some(source);
        self.census_cooldown = Cooldown::new(cooldown);
        self
    }

    pub fn with_distance(mut self, adapter: DistanceAdapter, cooldown: Duration) -> Self {
        self.distance = Some(adapter);
        self.distance_cooldown = Cooldown::new(cooldown);
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn ingest(&mut self, batch: &RawBatch, market: &Market) -> Result<IngestReport> {
        Ok(self.store.ingest(batch, market)?)
    }

    /// Completeness of the store as it is on disk now.
    pub fn audit(&mut self) -> Result<AuditReport> {
        self.store.reload()?;
        Ok(audit(self.store.records()))
    }

    /// Census enrichment: an initial pass plus up to `max_retry_passes`
    /// retry passes. Per-record failures are logged and counted; only store
    /// integrity or persistence failures end the run early.
    pub async fn run_census_enrichment(&mut self, max_retry_passes: u32) -> Result<CensusRunReport> {
        let census = self
            .census
            .as_deref()
            .ok_or_else(|| EnrichError::Other(anyhow!("no census source configured")))?;

        self.store.reload()?;
        let before = audit(self.store.records());
        let mut report = CensusRunReport {
            incomplete_before: before.missing_rows,
            missing_before: before.per_field_counts,
            ..Default::default()
        };
        info!(
            incomplete = report.incomplete_before,
            max_retry_passes, "census enrichment starting"
        );

        let mut attempts: HashMap<IdentityKey, u32> = HashMap::new();
        for pass in 0..=max_retry_passes {
            let mut tasks: Vec<EnrichmentTask> = self
                .store
                .records()
                .iter()
                .filter_map(EnrichmentTask::pending)
                .collect();
            if tasks.is_empty() {
                info!(pass = pass + 1, "no incomplete records left");
                break;
            }

            report.passes += 1;
            info!(pass = pass + 1, candidates = tasks.len(), "census pass starting");

            for task in &mut tasks {
                let count = attempts.entry(task.key.clone()).or_default();
                *count += 1;
                task.attempts = *count;

                self.census_cooldown.wait().await;
                census_task(&mut self.store, census, task, &mut report).await?;
            }
        }

        let after = audit(self.store.records());
        report.processed = attempts.len();
        report.incomplete_after = after.missing_rows;
        report.missing_by_field = after.per_field_counts;

        info!(
            passes = report.passes,
            processed = report.processed,
            merged = report.merged,
            failed = report.failed,
            incomplete = report.incomplete_after,
            "census enrichment finished"
        );
        Ok(report)
    }

    /// One pass of nearest-landmark enrichment over every coordinate-bearing
    /// record missing the landmark address or travel time.
    pub async fn run_distance_enrichment(&mut self) -> Result<DistanceRunReport> {
        let adapter = self
            .distance
            .as_ref()
            .ok_or_else(|| EnrichError::Other(anyhow!("no distance adapter configured")))?;

        self.store.reload()?;
        let candidates: Vec<(IdentityKey, String)> = self
            .store
            .records()
            .iter()
            .filter(|r| needs_distance(r))
            .filter_map(|r| Some((r.identity_key()?, r.label())))
            .collect();

        let mut report = DistanceRunReport {
            candidates: candidates.len(),
            ..Default::default()
        };
        info!(candidates = report.candidates, "distance enrichment starting");

        let mut seen = HashSet::new();
        for (key, label) in candidates {
            if !seen.insert(key.clone()) {
                continue;
            }
            self.distance_cooldown.wait().await;
            report.processed += 1;

            let Some(landmark) = adapter.nearest(&key).await else {
                warn!(record = %label, "no landmark result; record left without distance");
                report.no_result += 1;
                continue;
            };

            match self.store.merge(&key, &landmark.into_fields()) {
                Ok(()) => report.enriched += 1,
                Err(StoreError::RecordNotFound(_)) => {
                    warn!(record = %label, "record vanished before merge");
                    report.no_result += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            processed = report.processed,
            enriched = report.enriched,
            no_result = report.no_result,
            "distance enrichment finished"
        );
        Ok(report)
    }
}

async fn census_task(
    store: &mut RecordStore,
    census: &dyn CensusSource,
    task: &mut EnrichmentTask,
    report: &mut CensusRunReport,
) -> Result<()> {
    task.advance(TaskState::Fetching);
    report.attempts += 1;

    let extract = match census.fetch(&task.key).await {
        Ok(extract) if !extract.is_empty() => extract,
        Ok(_) => {
            warn!(record = %task.label, attempt = task.attempts, "census returned no values");
            report.failed += 1;
            return Ok(());
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(
                record = %task.label,
                attempt = task.attempts,
                error = %e,
                "census fetch failed; record left incomplete"
            );
            report.failed += 1;
            return Ok(());
        }
    };
    task.advance(TaskState::Parsed);

    match store.merge(&task.key, &extract.fields) {
        Ok(()) => {}
        Err(StoreError::RecordNotFound(_)) => {
            warn!(record = %task.label, "record vanished before merge");
            report.failed += 1;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }
    report.merged += 1;
    task.advance(TaskState::Merged);

    let completeness = store
        .find(&task.key)
        .map(classify)
        .unwrap_or(Completeness::Incomplete);
    task.advance(TaskState::Verified(completeness));

    if completeness == Completeness::Incomplete {
        let remaining = store.find(&task.key).map(|r| missing_fields(r).len());
        debug!(
            record = %task.label,
            before = task.missing.len(),
            remaining = ?remaining,
            "record still incomplete after merge"
        );
    }
    Ok(())
}
