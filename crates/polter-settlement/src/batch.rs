use std::collections::{HashMap, HashSet};

use chrono::Utc;
use polter_core::{
    ErrorKind, Payee, PaymentProvider, PhoneNumber, ProviderError, SettlementError,
    SettlementInstruction, SettlementStore, StoreError, WorkRecord,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::service::SettlementService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayeeOutcome {
    Success,
    Failed,
    /// The transfer was handed off but its result is not known yet. The work
    /// records stay claimed by the pending instruction.
    Unconfirmed,
    /// Another run claimed the payee's records first.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayeeSettlement {
    pub payee_id: Uuid,
    pub payee_name: String,
    pub phone_number: Option<String>,
    pub amount: Decimal,
    pub record_count: i64,
    pub instruction_id: Option<Uuid>,
    pub status: PayeeOutcome,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl PayeeSettlement {
    fn new(payee: &Payee, amount: Decimal, record_count: i64) -> Self {
        Self {
            payee_id: payee.id,
            payee_name: payee.name.clone(),
            phone_number: payee.phone_number.clone(),
            amount,
            record_count,
            instruction_id: None,
            status: PayeeOutcome::Failed,
            error_kind: None,
            error: None,
        }
    }

    fn succeeded(mut self, instruction_id: Uuid) -> Self {
        self.instruction_id = Some(instruction_id);
        self.status = PayeeOutcome::Success;
        self
    }

    fn failed(mut self, instruction_id: Option<Uuid>, err: SettlementError) -> Self {
        warn!(
            payee_id = %self.payee_id,
            kind = ?err.kind(),
            "settlement failed for payee: {err}"
        );
        self.instruction_id = instruction_id;
        self.status = PayeeOutcome::Failed;
        self.error_kind = Some(err.kind());
        self.error = Some(err.to_string());
        self
    }

    fn unconfirmed(mut self, instruction_id: Uuid, err: ProviderError) -> Self {
        self.instruction_id = Some(instruction_id);
        self.status = PayeeOutcome::Unconfirmed;
        self.error_kind = Some(ErrorKind::ProviderFailure);
        self.error = Some(format!("{err}; awaiting provider callback"));
        self
    }

    fn skipped(mut self, reason: String) -> Self {
        info!(
            payee_id = %self.payee_id,
            "payee already claimed by another settlement run: {reason}"
        );
        self.status = PayeeOutcome::Skipped;
        self.error = Some("work records already claimed by another settlement run".to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub success: bool,
    pub message: String,
    pub total_payees: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unconfirmed: usize,
    pub skipped: usize,
    pub details: Vec<PayeeSettlement>,
}

impl SettlementReport {
    fn empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            total_payees: 0,
            succeeded: 0,
            failed: 0,
            unconfirmed: 0,
            skipped: 0,
            details: Vec::new(),
        }
    }

    fn from_details(details: Vec<PayeeSettlement>) -> Self {
        let count = |outcome: PayeeOutcome| {
            details
                .iter()
                .filter(|detail| detail.status == outcome)
                .count()
        };
        let succeeded = count(PayeeOutcome::Success);
        let failed = count(PayeeOutcome::Failed);
        let unconfirmed = count(PayeeOutcome::Unconfirmed);
        let skipped = count(PayeeOutcome::Skipped);

        let mut message = format!("Processed {succeeded} payments, {failed} failed");
        if unconfirmed > 0 {
            message.push_str(&format!(", {unconfirmed} awaiting confirmation"));
        }
        if skipped > 0 {
            message.push_str(&format!(", {skipped} already claimed"));
        }

        Self {
            success: true,
            message,
            total_payees: details.len(),
            succeeded,
            failed,
            unconfirmed,
            skipped,
            details,
        }
    }

    pub fn detail(&self, payee_id: Uuid) -> Option<&PayeeSettlement> {
        self.details.iter().find(|detail| detail.payee_id == payee_id)
    }
}

struct PayeeGroup {
    payee: Payee,
    record_ids: Vec<Uuid>,
    total: Decimal,
}

impl<S, P> SettlementService<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    /// Pays every active payee with at least `min_record_count` completed,
    /// unsettled work records, one instruction per payee.
    ///
    /// Only a failure to read the candidate records or their payees aborts the
    /// run. Anything that goes wrong for a single payee is reported in that
    /// payee's entry and leaves the other payees untouched.
    pub async fn aggregate_and_settle(
        &self,
        payee_ids: Option<&[Uuid]>,
        min_record_count: u32,
    ) -> Result<SettlementReport, SettlementError> {
        if min_record_count < 1 {
            return Err(SettlementError::InvalidRequest(
                "min_record_count must be at least 1".to_string(),
            ));
        }

        let payee_ids = payee_ids.filter(|ids| !ids.is_empty());
        let records = self.store.unsettled_records(payee_ids).await?;
        if records.is_empty() {
            info!("batch settlement found no unsettled work records");
            return Ok(SettlementReport::empty("No unsettled work records found"));
        }

        let groups = self.group_by_payee(records).await?;
        let mut eligible: Vec<PayeeGroup> = groups
            .into_iter()
            .filter(|group| group.record_ids.len() >= min_record_count as usize)
            .collect();
        if eligible.is_empty() {
            return Ok(SettlementReport::empty(format!(
                "No payees have completed the minimum of {min_record_count} records"
            )));
        }
        eligible.sort_by(|a, b| {
            a.payee
                .name
                .cmp(&b.payee.name)
                .then(a.payee.id.cmp(&b.payee.id))
        });

        info!(payees = eligible.len(), "batch settlement started");
        let mut details = Vec::with_capacity(eligible.len());
        for group in eligible {
            details.push(self.settle_group(group).await);
        }

        let report = SettlementReport::from_details(details);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            unconfirmed = report.unconfirmed,
            skipped = report.skipped,
            "batch settlement finished"
        );
        Ok(report)
    }

    async fn group_by_payee(
        &self,
        records: Vec<WorkRecord>,
    ) -> Result<Vec<PayeeGroup>, SettlementError> {
        let payee_ids: Vec<Uuid> = records
            .iter()
            .map(|record| record.payee_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let payees: HashMap<Uuid, Payee> = self
            .store
            .payees_by_ids(&payee_ids)
            .await?
            .into_iter()
            .map(|payee| (payee.id, payee))
            .collect();

        let mut groups: HashMap<Uuid, PayeeGroup> = HashMap::new();
        let mut skipped: HashSet<Uuid> = HashSet::new();
        for record in records {
            let Some(payee) = payees.get(&record.payee_id) else {
                if skipped.insert(record.payee_id) {
                    warn!(payee_id = %record.payee_id, "skipping work records of unknown payee");
                }
                continue;
            };
            if !payee.active {
                if skipped.insert(payee.id) {
                    info!(payee_id = %payee.id, "skipping inactive payee");
                }
                continue;
            }

            let group = groups.entry(payee.id).or_insert_with(|| PayeeGroup {
                payee: payee.clone(),
                record_ids: Vec::new(),
                total: Decimal::ZERO,
            });
            group.record_ids.push(record.id);
            group.total += record.amount;
        }

        Ok(groups.into_values().collect())
    }

    async fn settle_group(&self, group: PayeeGroup) -> PayeeSettlement {
        let PayeeGroup {
            payee,
            record_ids,
            total,
        } = group;
        let record_count = record_ids.len() as i64;
        let detail = PayeeSettlement::new(&payee, total, record_count);

        let phone_number = match payee
            .phone_number
            .as_deref()
            .map(PhoneNumber::parse_canonical)
        {
            Some(Ok(phone_number)) => phone_number,
            _ => {
                return detail.failed(
                    None,
                    SettlementError::InvalidContact(payee.phone_number.clone()),
                );
            }
        };

        let instruction = SettlementInstruction::pending(
            payee.id,
            total,
            phone_number.as_str(),
            record_count,
            format!("Batch payment for {record_count} tasks"),
            Utc::now(),
        );
        match self
            .store
            .insert_instruction_claiming(&instruction, &record_ids)
            .await
        {
            Ok(_) => {}
            Err(StoreError::Conflict(reason)) => return detail.skipped(reason),
            Err(err) => return detail.failed(None, err.into()),
        }
        info!(
            instruction_id = %instruction.id,
            payee_id = %payee.id,
            records = record_count,
            amount = %total,
            "settlement instruction written"
        );

        match self.dispatch(&instruction, &phone_number).await {
            Ok(_) => detail.succeeded(instruction.id),
            Err(err) => {
                self.dispatch_failed(&instruction, &err, true).await;
                if err.is_rejection() {
                    detail.failed(Some(instruction.id), err.into())
                } else {
                    detail.unconfirmed(instruction.id, err)
                }
            }
        }
    }
}
