use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Pending,
    Completed,
    Other,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Completed => "completed",
            WorkStatus::Other => "other",
        }
    }

    /// Unrecognised stored values are treated as `Other` so they are never paid.
    pub fn from_stored(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => WorkStatus::Pending,
            "completed" => WorkStatus::Completed,
            _ => WorkStatus::Other,
        }
    }
}

/// One unit of completed, payable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRecord {
    pub id: Uuid,
    pub payee_id: Uuid,
    pub amount: Decimal,
    pub status: WorkStatus,
    pub settled: bool,
    pub instruction_id: Option<Uuid>,
}

impl WorkRecord {
    pub fn is_payable(&self) -> bool {
        !self.settled && self.status == WorkStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub active: bool,
    pub rate_per_task: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub rate_per_task: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstructionStatus {
    Pending,
    Success,
    Failed,
}

impl InstructionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionStatus::Pending => "pending",
            InstructionStatus::Success => "success",
            InstructionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstructionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InstructionStatus::Pending),
            "success" => Ok(InstructionStatus::Success),
            "failed" => Ok(InstructionStatus::Failed),
            other => Err(format!(
                "status must be one of pending, success, failed (got {other:?})"
            )),
        }
    }
}

/// One payment attempt for a payee. `amount` is fixed at creation; only the
/// status, completion time and references move afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementInstruction {
    pub id: Uuid,
    pub payee_id: Uuid,
    pub amount: Decimal,
    pub phone_number: String,
    pub records_covered: i64,
    pub reason: String,
    pub status: InstructionStatus,
    pub provider_request_id: Option<String>,
    pub external_ref: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SettlementInstruction {
    pub fn pending(
        payee_id: Uuid,
        amount: Decimal,
        phone_number: &str,
        records_covered: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payee_id,
            amount,
            phone_number: phone_number.to_string(),
            records_covered,
            reason,
            status: InstructionStatus::Pending,
            provider_request_id: None,
            external_ref: None,
            initiated_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InstructionStatus, WorkStatus};

    #[test]
    fn instruction_status_parses_case_insensitively() {
        assert_eq!(
            " SUCCESS ".parse::<InstructionStatus>(),
            Ok(InstructionStatus::Success)
        );
        assert_eq!(
            "failed".parse::<InstructionStatus>(),
            Ok(InstructionStatus::Failed)
        );
        assert!("done".parse::<InstructionStatus>().is_err());
    }

    #[test]
    fn unknown_work_status_is_other() {
        assert_eq!(WorkStatus::from_stored("Completed"), WorkStatus::Completed);
        assert_eq!(WorkStatus::from_stored("rejected"), WorkStatus::Other);
    }
}
