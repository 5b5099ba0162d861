use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProviderError, StoreError};
use crate::models::{Payee, SettlementInstruction, WorkRecord};
use crate::phone::PhoneNumber;

#[async_trait]
pub trait PayeeStore: Send + Sync {
    /// Newest first.
    async fn list_payees(&self) -> Result<Vec<Payee>, StoreError>;
    async fn payee(&self, id: Uuid) -> Result<Option<Payee>, StoreError>;
    async fn payees_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Payee>, StoreError>;
    async fn payee_by_email(&self, email: &str) -> Result<Option<Payee>, StoreError>;
    async fn payee_by_phone(&self, phone_number: &str) -> Result<Option<Payee>, StoreError>;
    async fn insert_payee(&self, payee: &Payee) -> Result<(), StoreError>;
    async fn update_payee(&self, payee: &Payee) -> Result<(), StoreError>;
    async fn delete_payee(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SettlementStore: PayeeStore {
    /// Work records with `settled = false` and `status = completed`,
    /// optionally limited to the given payees.
    async fn unsettled_records(
        &self,
        payee_ids: Option<&[Uuid]>,
    ) -> Result<Vec<WorkRecord>, StoreError>;

    async fn insert_instruction(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<(), StoreError>;

    /// Writes `instruction` and flags `record_ids` as settled against it in one
    /// step. Only records that still belong to the instruction's payee, are
    /// unsettled and completed are eligible; if any of them is not, nothing is
    /// written and `StoreError::Conflict` is returned.
    async fn insert_instruction_claiming(
        &self,
        instruction: &SettlementInstruction,
        record_ids: &[Uuid],
    ) -> Result<u64, StoreError>;

    /// Returns records settled against `instruction_id` to the unsettled pool.
    async fn release_records(&self, instruction_id: Uuid) -> Result<u64, StoreError>;

    async fn instruction(&self, id: Uuid) -> Result<Option<SettlementInstruction>, StoreError>;

    /// Records the provider's id for a dispatched transfer. Leaves the status
    /// untouched so an early callback is not overwritten.
    async fn attach_provider_request(
        &self,
        instruction_id: Uuid,
        provider_request_id: &str,
    ) -> Result<bool, StoreError>;

    /// Persists status, completion time and external reference. Returns
    /// `false` when the instruction does not exist.
    async fn update_instruction(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub instruction_id: Uuid,
    pub phone_number: PhoneNumber,
    pub amount: Decimal,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub provider_request_id: String,
}

/// Mobile-money payout provider. The final outcome of a transfer arrives
/// later through the settlement callback.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn initiate_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, ProviderError>;
}
