//! Bulk loader
//!
//! Streams a record source into a staging table in fixed-size chunks. For each
//! chunk the loader gathers the merge context with three batched lookups (live
//! rows, already-staged ids, live owners), asks the merge policy about every
//! record in feed order, draws fresh ids for new rows in one call and stages
//! the accepted rows with one insert.

use crate::core::merge::{self, Accepted, Change, DropReason, Identity, MergeContext, MergeDecision};
use crate::core::reload::state::ReloadOperation;
use crate::core::reload::ReloadTransaction;
use crate::domain::{EntityKind, ExternalId, Record, ReloadError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::iter::Empty;
use tokio::sync::{mpsc, watch};

/// Records per chunk unless configured otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// What happened to the records of one bulk load
///
/// Dropped records are not errors; they are only counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Records read from the source
    pub received: u64,
    /// Rows written to the staging table
    pub staged: u64,
    /// Staged rows with no live counterpart
    pub inserted: u64,
    /// Staged rows whose content changed
    pub updated: u64,
    /// Staged rows identical to their live counterpart
    pub unchanged: u64,
    /// Records whose external id was already staged
    pub dropped_duplicates: u64,
    /// Payments whose patient is not live
    pub dropped_missing_owner: u64,
    /// Chunks processed
    pub chunks: u64,
}

impl LoadReport {
    pub fn dropped(&self) -> u64 {
        self.dropped_duplicates + self.dropped_missing_owner
    }

    /// Fold the counters of a later load into this one
    pub fn absorb(&mut self, other: &LoadReport) {
        self.received += other.received;
        self.staged += other.staged;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.dropped_duplicates += other.dropped_duplicates;
        self.dropped_missing_owner += other.dropped_missing_owner;
        self.chunks += other.chunks;
    }
}

/// Where the loader pulls records from
pub(crate) enum RecordFeed<I> {
    Iter(I),
    Channel(mpsc::Receiver<Result<Value>>),
}

impl<I> RecordFeed<I>
where
    I: Iterator<Item = Result<Value>>,
{
    async fn next(&mut self) -> Option<Result<Value>> {
        match self {
            RecordFeed::Iter(records) => records.next(),
            RecordFeed::Channel(records) => records.recv().await,
        }
    }
}

/// Chunked loader into a staging table
#[derive(Debug, Clone)]
pub struct BulkLoader {
    chunk_size: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Default for BulkLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BulkLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            shutdown: None,
        }
    }

    /// Stop between chunks once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Consume `records` completely into the staging table of `kind`
    ///
    /// Calling this again before the swap appends to the same staging table.
    ///
    /// # Errors
    ///
    /// - `ReloadError::InvalidTransition` if no staging table was created
    /// - `ReloadError::Ingestion` on the first record that cannot be parsed
    /// - `ReloadError::Cancelled` if shutdown was signalled between chunks
    ///
    /// Rows staged before an error stay in the staging table; the caller
    /// rolls back or discards it.
    pub async fn load<I>(
        &self,
        tx: &mut ReloadTransaction,
        kind: EntityKind,
        records: I,
    ) -> Result<LoadReport>
    where
        I: IntoIterator<Item = Result<Value>>,
    {
        self.load_feed(tx, kind, RecordFeed::Iter(records.into_iter())).await
    }

    /// Like [`BulkLoader::load`], for records handed over through a channel
    ///
    /// The load ends when every sender is gone. Dropping the receiver on an
    /// error tells a background reader to stop.
    pub async fn load_channel(
        &self,
        tx: &mut ReloadTransaction,
        kind: EntityKind,
        records: mpsc::Receiver<Result<Value>>,
    ) -> Result<LoadReport> {
        self.load_feed(tx, kind, RecordFeed::<Empty<Result<Value>>>::Channel(records))
            .await
    }

    pub(crate) async fn load_feed<I>(
        &self,
        tx: &mut ReloadTransaction,
        kind: EntityKind,
        mut records: RecordFeed<I>,
    ) -> Result<LoadReport>
    where
        I: Iterator<Item = Result<Value>>,
    {
        let next = tx.check(kind, ReloadOperation::BulkLoad)?;
        let merging = tx.merges_into(kind.table());

        let mut report = LoadReport::default();
        let mut chunk = Vec::with_capacity(self.chunk_size);

        let mut position: u64 = 0;
        while let Some(raw) = records.next().await {
            let raw = raw.map_err(|e| at_position(e, position))?;
            let record = Record::from_json(kind, &raw)
                .map_err(|e| ReloadError::Ingestion(e.at_position(position)))?;

            report.received += 1;
            position += 1;
            chunk.push(record);

            if chunk.len() == self.chunk_size {
                self.ensure_running(kind)?;
                self.stage_chunk(tx, kind, merging, std::mem::take(&mut chunk), &mut report)
                    .await?;
            }
        }

        if !chunk.is_empty() {
            self.ensure_running(kind)?;
            self.stage_chunk(tx, kind, merging, chunk, &mut report).await?;
        }

        tx.set_state(kind, next);
        tracing::info!(
            reload_id = %tx.reload_id(),
            entity = %kind,
            received = report.received,
            staged = report.staged,
            dropped_duplicates = report.dropped_duplicates,
            dropped_missing_owner = report.dropped_missing_owner,
            "Bulk load finished"
        );
        Ok(report)
    }

    fn ensure_running(&self, kind: EntityKind) -> Result<()> {
        match &self.shutdown {
            Some(rx) if *rx.borrow() => Err(ReloadError::Cancelled(format!(
                "shutdown requested while loading {kind}"
            ))),
            _ => Ok(()),
        }
    }

    async fn stage_chunk(
        &self,
        tx: &mut ReloadTransaction,
        kind: EntityKind,
        merging: bool,
        records: Vec<Record>,
        report: &mut LoadReport,
    ) -> Result<()> {
        let ids = unique(records.iter().map(Record::external_id));
        let now = tx.started_at();

        let staged = tx.store().lookup_staged(kind, &ids).await?;
        let (live, owners) = if merging {
            let live = tx.store().lookup_live(kind, &ids).await?;
            let owners = if kind.is_dependent() {
                let owner_ids = unique(records.iter().filter_map(Record::owner));
                tx.store().live_patient_ids(&owner_ids).await?
            } else {
                HashSet::new()
            };
            (live, owners)
        } else {
            (HashMap::new(), HashSet::new())
        };

        let mut seen = staged;
        let mut accepted: Vec<Accepted> = Vec::with_capacity(records.len());
        for record in records {
            let already_staged = seen.contains(record.external_id());
            let decision = if merging {
                let context = MergeContext {
                    live: live.get(record.external_id()),
                    already_staged,
                    owner_present: record.owner().map_or(true, |owner| owners.contains(owner)),
                };
                merge::evaluate(record, &context, now)
            } else {
                merge::evaluate_plain(record, already_staged)
            };

            match decision {
                MergeDecision::Accept(row) => {
                    seen.insert(row.record.external_id().clone());
                    accepted.push(row);
                }
                MergeDecision::Drop(DropReason::DuplicateInBatch) => {
                    report.dropped_duplicates += 1;
                }
                MergeDecision::Drop(DropReason::MissingOwner) => {
                    report.dropped_missing_owner += 1;
                }
            }
        }

        let fresh = accepted
            .iter()
            .filter(|row| row.identity == Identity::Fresh)
            .count();
        let mut fresh_ids = tx.store().allocate_ids(kind, fresh).await?.into_iter();

        let mut rows = Vec::with_capacity(accepted.len());
        for row in accepted {
            match row.change {
                Change::Inserted => report.inserted += 1,
                Change::Updated => report.updated += 1,
                Change::Unchanged => report.unchanged += 1,
            }
            let fresh_id = match row.identity {
                Identity::Fresh => fresh_ids.next(),
                Identity::Existing { .. } => None,
            };
            let stored = row.into_row(fresh_id, now).ok_or_else(|| {
                ReloadError::Database(format!(
                    "{kind} sequence returned fewer than {fresh} ids"
                ))
            })?;
            rows.push(stored);
        }

        let written = tx.store().insert_staged(kind, &rows).await?;
        // Rows the backend skipped on conflict count as duplicates
        report.dropped_duplicates += rows.len() as u64 - written.min(rows.len() as u64);
        report.staged += written;
        report.chunks += 1;

        crate::log_chunk_processing!(tx.reload_id(), kind, report.chunks, rows.len(), written);
        Ok(())
    }
}

/// Load `records` into the staging table of `kind` with the default chunk size
pub async fn bulk_load<I>(
    tx: &mut ReloadTransaction,
    kind: EntityKind,
    records: I,
) -> Result<LoadReport>
where
    I: IntoIterator<Item = Result<Value>>,
{
    BulkLoader::default().load(tx, kind, records).await
}

fn unique<'a>(ids: impl Iterator<Item = &'a ExternalId>) -> Vec<ExternalId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).cloned().collect()
}

/// Source failures carry the position of the record being read
fn at_position(err: ReloadError, position: u64) -> ReloadError {
    match err {
        ReloadError::Ingestion(e) if e.position.is_none() => {
            ReloadError::Ingestion(e.at_position(position))
        }
        ReloadError::Ingestion(e) => ReloadError::Ingestion(e),
        ReloadError::Serialization(reason) | ReloadError::Io(reason) => ReloadError::Ingestion(
            crate::domain::IngestionError::new(reason).at_position(position),
        ),
        other => other,
    }
}
