use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::dedup::{filter_new, KnownKeys};
use crate::errors::{IngestError, NormalizationError, PersistenceError, SourceFetchError};
use crate::models::{NormalizedJob, SourceTag};
use crate::normalize::normalize_at;
use crate::sources::{FetchParams, RawPosting, SourceAdapter};
use crate::tracker::Tracker;

/// What a run decided before anything was written.
#[derive(Debug)]
pub struct Plan {
    pub fetched: usize,
    pub to_add: Vec<NormalizedJob>,
    pub skipped_duplicates: usize,
    pub per_source_errors: BTreeMap<SourceTag, SourceFetchError>,
    pub normalization_errors: Vec<NormalizationError>,
    /// The keys passed in plus those of `to_add`.
    pub known_keys: KnownKeys,
}

/// Outcome of one ingestion run.
#[derive(Debug)]
pub struct IngestionReport {
    pub fetched: usize,
    pub added: Vec<NormalizedJob>,
    pub skipped_duplicates: usize,
    pub per_source_errors: BTreeMap<SourceTag, SourceFetchError>,
    pub normalization_errors: Vec<NormalizationError>,
    pub persistence_errors: Vec<(NormalizedJob, PersistenceError)>,
    /// The keys passed in plus those of `added`. Feed this into the next run
    /// instead of re-reading the tracker.
    pub known_keys: KnownKeys,
}

pub struct Pipeline {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl Pipeline {
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    /// Fetch, normalize and deduplicate without persisting anything.
    pub fn plan(&self, params: &FetchParams, known_keys: KnownKeys) -> Result<Plan, IngestError> {
        self.plan_at(params, known_keys, Utc::now())
    }

    pub fn plan_at(
        &self,
        params: &FetchParams,
        known_keys: KnownKeys,
        ingested_at: DateTime<Utc>,
    ) -> Result<Plan, IngestError> {
        if self.adapters.is_empty() {
            return Err(IngestError::NoSources);
        }

        let results: Vec<(SourceTag, Result<Vec<RawPosting>, SourceFetchError>)> = self
            .adapters
            .par_iter()
            .map(|adapter| (adapter.tag(), adapter.fetch(params)))
            .collect();

        // Merge by tag so the outcome does not depend on completion order.
        let mut batches: BTreeMap<SourceTag, Vec<RawPosting>> = BTreeMap::new();
        let mut per_source_errors = BTreeMap::new();
        for (tag, result) in results {
            match result {
                Ok(postings) => {
                    info!(source = %tag, count = postings.len(), "Fetched postings");
                    batches.entry(tag).or_default().extend(postings);
                }
                Err(e) => {
                    warn!(source = %tag, error = %e, "Source failed");
                    per_source_errors.entry(tag).or_insert(e);
                }
            }
        }

        if batches.is_empty() {
            return Err(IngestError::AllSourcesFailed(per_source_errors));
        }

        let mut fetched = 0;
        let mut normalized = Vec::new();
        let mut normalization_errors = Vec::new();
        for (tag, postings) in &batches {
            fetched += postings.len();
            for raw in postings {
                match normalize_at(raw, tag, ingested_at) {
                    Ok(job) => normalized.push(job),
                    Err(e) => {
                        warn!(error = %e, "Dropping posting");
                        normalization_errors.push(e);
                    }
                }
            }
        }

        let candidates = normalized.len();
        let (to_add, known_keys) = filter_new(normalized, known_keys);
        let skipped_duplicates = candidates - to_add.len();

        Ok(Plan {
            fetched,
            to_add,
            skipped_duplicates,
            per_source_errors,
            normalization_errors,
            known_keys,
        })
    }

    /// Plan, then append every surviving record to the tracker.
    pub fn run(
        &self,
        params: &FetchParams,
        known_keys: KnownKeys,
        tracker: &dyn Tracker,
    ) -> Result<IngestionReport, IngestError> {
        let plan = self.plan(params, known_keys)?;
        Ok(persist(plan, tracker))
    }
}

fn persist(plan: Plan, tracker: &dyn Tracker) -> IngestionReport {
    let mut known_keys = plan.known_keys;
    let mut added = Vec::new();
    let mut persistence_errors = Vec::new();
    for job in plan.to_add {
        match tracker.append(&job) {
            Ok(()) => added.push(job),
            Err(e) => {
                warn!(company = %job.company, role = %job.role, error = %e, "Failed to record job");
                // Not stored, so a later run should try it again.
                known_keys.remove(&job.identity_key());
                persistence_errors.push((job, e));
            }
        }
    }

    info!(
        added = added.len(),
        skipped = plan.skipped_duplicates,
        failed_sources = plan.per_source_errors.len(),
        "Ingestion finished"
    );

    IngestionReport {
        fetched: plan.fetched,
        added,
        skipped_duplicates: plan.skipped_duplicates,
        per_source_errors: plan.per_source_errors,
        normalization_errors: plan.normalization_errors,
        persistence_errors,
        known_keys,
    }
}
