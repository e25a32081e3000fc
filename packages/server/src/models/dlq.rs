use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dlq::DlqStats;
use crate::entity::dead_letter_entry;

use super::shared::Pagination;

/// Query parameters for listing DLQ entries.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDlqParams {
    /// Filter by lifecycle status (ACTIVE, ARCHIVED, RETRIED). Defaults
    /// to ACTIVE, the working set an operator triages.
    #[param(example = "ACTIVE")]
    pub status: Option<String>,
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

impl ListDlqParams {
    /// Status to list, ACTIVE when the caller named none.
    pub fn status_filter(&self) -> Result<common::DlqStatus, common::status::ParseStatusError> {
        match &self.status {
            Some(s) => s.parse(),
            None => Ok(common::DlqStatus::Active),
        }
    }
}

/// A quarantined event.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DlqEntryResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub event_id: String,
    #[schema(example = "order-processor")]
    pub processor_name: String,
    pub original_payload: String,
    #[schema(example = "amount must be >= 0")]
    pub failure_reason: String,
    #[schema(example = 3)]
    pub total_attempts: i32,
    pub first_failure_time: DateTime<Utc>,
    pub last_failure_time: DateTime<Utc>,
    #[schema(example = "ACTIVE")]
    pub status: String,
    pub archive_reason: Option<String>,
    pub retention_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<dead_letter_entry::Model> for DlqEntryResponse {
    fn from(m: dead_letter_entry::Model) -> Self {
        Self {
            event_id: m.event_id,
            processor_name: m.processor_name,
            original_payload: m.original_payload,
            failure_reason: m.failure_reason,
            total_attempts: m.total_attempts,
            first_failure_time: m.first_failure_time,
            last_failure_time: m.last_failure_time,
            status: m.status,
            archive_reason: m.archive_reason,
            retention_deadline: m.retention_deadline,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DlqListResponse {
    pub data: Vec<DlqEntryResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DlqStatsResponse {
    #[schema(example = 4)]
    pub active: u64,
    #[schema(example = 12)]
    pub archived: u64,
    #[schema(example = 7)]
    pub retried: u64,
}

impl From<DlqStats> for DlqStatsResponse {
    fn from(s: DlqStats) -> Self {
        Self {
            active: s.active,
            archived: s.archived,
            retried: s.retried,
        }
    }
}

/// Request body for archiving a DLQ entry.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ArchiveDlqRequest {
    /// Operator-supplied reason for closing the entry without reprocessing.
    #[schema(example = "Stale test data, not worth replaying")]
    pub reason: Option<String>,
}

/// Outcome of manually re-publishing a quarantined event.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DlqRetryResponse {
    pub event_id: String,
    /// The entry's status after the retry was issued.
    #[schema(example = "RETRIED")]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use common::DlqStatus;

    use super::*;

    fn params(status: Option<&str>) -> ListDlqParams {
        ListDlqParams {
            status: status.map(String::from),
            page: None,
            per_page: None,
        }
    }

    #[test]
    fn test_listing_defaults_to_active_entries() {
        assert_eq!(params(None).status_filter().unwrap(), DlqStatus::Active);
    }

    #[test]
    fn test_explicit_status_overrides_the_default() {
        assert_eq!(
            params(Some("ARCHIVED")).status_filter().unwrap(),
            DlqStatus::Archived
        );
        assert!(params(Some("CLOSED")).status_filter().is_err());
    }
}
