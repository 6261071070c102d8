//! Database models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Responder role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Owns monitors; the reporting party
    Owner,
    /// Eligible to act on a report (e.g. law enforcement)
    Responder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Responder => "RESPONDER",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "OWNER" => Some(Role::Owner),
            "RESPONDER" => Some(Role::Responder),
            _ => None,
        }
    }
}

/// Assignment workflow status
///
/// Ordered: transitions may only move forward (PENDING → IN_PROGRESS →
/// RESOLVED). The rank comparison backs the no-regression guard in
/// `db::assignments::set_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Resolved,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Resolved => "RESOLVED",
        }
    }

    pub fn parse(s: &str) -> Option<AssignmentStatus> {
        match s {
            "PENDING" => Some(AssignmentStatus::Pending),
            "IN_PROGRESS" => Some(AssignmentStatus::InProgress),
            "RESOLVED" => Some(AssignmentStatus::Resolved),
            _ => None,
        }
    }
}

/// A person eligible to own monitors or act on incident reports.
///
/// Coordinates are stored as text (decimal degrees) and may be absent
/// or unparseable; the geo resolver treats both cases as "no
/// coordinates" and skips the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responder {
    pub guid: Uuid,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub lat: Option<String>,
    pub long: Option<String>,
    pub role: Role,
    pub push_token: Option<String>,
}

/// A configured camera/feed source owned by one responder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub guid: Uuid,
    pub responder_id: Uuid,
    /// Camera address (e.g. an RTSP/HTTP endpoint), unique per monitor
    pub source: String,
    pub name: String,
}

/// Immutable incident report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub guid: Uuid,
    pub description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Stored image URI corroborating a detection; 1..N per report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceImage {
    pub guid: Uuid,
    pub report_id: Uuid,
    pub uri: String,
    /// Zero-based order within the report
    pub position: i64,
}

/// Workflow record, 1:1 with an incident report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub guid: Uuid,
    pub responder_id: Uuid,
    pub report_id: Uuid,
    pub status: AssignmentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::parse(Role::Owner.as_str()), Some(Role::Owner));
        assert_eq!(Role::parse(Role::Responder.as_str()), Some(Role::Responder));
        assert_eq!(Role::parse("ADMIN"), None);
    }

    #[test]
    fn test_status_ordering_is_forward_only() {
        assert!(AssignmentStatus::Pending < AssignmentStatus::InProgress);
        assert!(AssignmentStatus::InProgress < AssignmentStatus::Resolved);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            AssignmentStatus::Pending,
            AssignmentStatus::InProgress,
            AssignmentStatus::Resolved,
        ] {
            assert_eq!(AssignmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssignmentStatus::parse("DONE"), None);
    }
}
