//! Reload summary and reporting

use crate::core::loader::LoadReport;
use crate::core::reload::state::ReloadState;
use crate::domain::EntityKind;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Summary of one entity reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    /// Id tagging every log line of the reload
    pub reload_id: Uuid,

    /// Entity kind that was reloaded
    pub entity: EntityKind,

    /// Per-record outcome counters
    pub report: LoadReport,

    /// Stats rows written (payments only)
    pub stats_rows: Option<u64>,

    /// Wall-clock duration
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// State the reload ended in
    pub state: ReloadState,
}

impl ReloadSummary {
    pub fn new(reload_id: Uuid, entity: EntityKind) -> Self {
        Self {
            reload_id,
            entity,
            report: LoadReport::default(),
            stats_rows: None,
            duration: Duration::from_secs(0),
            state: ReloadState::Idle,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the reload reached the live dataset
    pub fn is_successful(&self) -> bool {
        self.state == ReloadState::Swapped
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            reload_id = %self.reload_id,
            entity = %self.entity,
            state = %self.state,
            received = self.report.received,
            staged = self.report.staged,
            inserted = self.report.inserted,
            updated = self.report.updated,
            unchanged = self.report.unchanged,
            dropped_duplicates = self.report.dropped_duplicates,
            dropped_missing_owner = self.report.dropped_missing_owner,
            stats_rows = self.stats_rows.unwrap_or(0),
            duration_ms = self.duration.as_millis() as u64,
            "Reload completed"
        );

        if self.report.dropped() > 0 {
            tracing::warn!(
                reload_id = %self.reload_id,
                entity = %self.entity,
                dropped = self.report.dropped(),
                "Records were dropped during the reload"
            );
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
