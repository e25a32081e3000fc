use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status '{invalid}'")]
pub struct ParseStatusError {
    invalid: String,
}

/// Status of a (event, processor) ledger record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    /// Record created, no attempt started yet.
    Pending,
    /// An attempt is in flight.
    Processing,
    /// Terminal: processed successfully.
    Success,
    /// Terminal for a replay row: the replayed attempt failed.
    Failed,
    /// Waiting for the scheduled retry to fire.
    Retry,
    /// Terminal: retries exhausted, quarantined.
    Dlq,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Retry => "RETRY",
            Self::Dlq => "DLQ",
        }
    }

    /// Terminal statuses short-circuit the pipeline: once reached, the
    /// processor is never invoked again for this (event, processor) pair.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Dlq)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "RETRY" => Ok(Self::Retry),
            "DLQ" => Ok(Self::Dlq),
            other => Err(ParseStatusError {
                invalid: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a dead-letter entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DlqStatus {
    /// Quarantined, awaiting manual intervention.
    Active,
    /// Closed without reprocessing.
    Archived,
    /// Manually re-published onto the primary stream.
    Retried,
}

impl DlqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
            Self::Retried => "RETRIED",
        }
    }
}

impl fmt::Display for DlqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DlqStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "ARCHIVED" => Ok(Self::Archived),
            "RETRIED" => Ok(Self::Retried),
            other => Err(ParseStatusError {
                invalid: other.to_string(),
            }),
        }
    }
}

/// Lifecycle of a replay session.
///
/// CREATED -> RUNNING <-> PAUSED -> COMPLETED | CANCELLED.
/// COMPLETED and CANCELLED are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplaySessionStatus {
    Created,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl ReplaySessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ReplaySessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplaySessionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "RUNNING" => Ok(Self::Running),
            "PAUSED" => Ok(Self::Paused),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(ParseStatusError {
                invalid: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_status_round_trip() {
        for s in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Success,
            ProcessingStatus::Failed,
            ProcessingStatus::Retry,
            ProcessingStatus::Dlq,
        ] {
            assert_eq!(s.as_str().parse::<ProcessingStatus>().unwrap(), s);
        }
    }

    #[test]
    fn test_settled_statuses() {
        assert!(ProcessingStatus::Success.is_settled());
        assert!(ProcessingStatus::Dlq.is_settled());
        assert!(!ProcessingStatus::Retry.is_settled());
        assert!(!ProcessingStatus::Pending.is_settled());
    }

    #[test]
    fn test_invalid_status_is_an_error() {
        assert!("DONE".parse::<ProcessingStatus>().is_err());
        assert!("active".parse::<DlqStatus>().is_err());
    }

    #[test]
    fn test_terminal_session_statuses() {
        assert!(ReplaySessionStatus::Completed.is_terminal());
        assert!(ReplaySessionStatus::Cancelled.is_terminal());
        assert!(!ReplaySessionStatus::Paused.is_terminal());
    }
}
