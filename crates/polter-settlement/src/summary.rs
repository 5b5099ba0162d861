use std::collections::HashMap;

use polter_core::{PaymentProvider, SettlementError, SettlementStore};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::service::SettlementService;

#[derive(Debug, Clone, Serialize)]
pub struct PendingPayee {
    pub payee_id: Uuid,
    pub payee_name: String,
    pub phone_number: Option<String>,
    pub active: bool,
    pub record_count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub pending: Vec<PendingPayee>,
    pub total_payees: usize,
    pub grand_total: Decimal,
}

impl<S, P> SettlementService<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    /// What a batch run would currently owe, per payee. Inactive payees are
    /// listed too so their balances stay visible.
    pub async fn pending_summary(&self) -> Result<PendingSummary, SettlementError> {
        let records = self.store.unsettled_records(None).await?;
        let mut payee_ids: Vec<Uuid> = records.iter().map(|record| record.payee_id).collect();
        payee_ids.sort_unstable();
        payee_ids.dedup();
        let payees = self.store.payees_by_ids(&payee_ids).await?;
        let payees: HashMap<Uuid, _> = payees.into_iter().map(|payee| (payee.id, payee)).collect();

        let mut summary: HashMap<Uuid, PendingPayee> = HashMap::new();
        for record in records {
            let Some(payee) = payees.get(&record.payee_id) else {
                continue;
            };
            let entry = summary.entry(payee.id).or_insert_with(|| PendingPayee {
                payee_id: payee.id,
                payee_name: payee.name.clone(),
                phone_number: payee.phone_number.clone(),
                active: payee.active,
                record_count: 0,
                total_amount: Decimal::ZERO,
            });
            entry.record_count += 1;
            entry.total_amount += record.amount;
        }

        let mut pending: Vec<PendingPayee> = summary.into_values().collect();
        pending.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        let grand_total = pending.iter().map(|entry| entry.total_amount).sum();

        Ok(PendingSummary {
            total_payees: pending.len(),
            grand_total,
            pending,
        })
    }
}
