use std::collections::HashMap;

use async_trait::async_trait;
use polter_core::{
    Payee, PayeeStore, SettlementInstruction, SettlementStore, StoreError, WorkRecord,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    payees: HashMap<Uuid, Payee>,
    records: HashMap<Uuid, WorkRecord>,
    instructions: HashMap<Uuid, SettlementInstruction>,
}

/// Process-local store. All mutations happen under a single write lock, so a
/// claim either sees every record unsettled or fails as a whole.
#[derive(Default)]
pub struct InMemorySettlementStore {
    state: RwLock<MemoryState>,
}

impl InMemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_payee(&self, payee: Payee) {
        self.state.write().await.payees.insert(payee.id, payee);
    }

    pub async fn put_record(&self, record: WorkRecord) {
        self.state.write().await.records.insert(record.id, record);
    }

    pub async fn record(&self, id: Uuid) -> Option<WorkRecord> {
        self.state.read().await.records.get(&id).cloned()
    }

    pub async fn records(&self) -> Vec<WorkRecord> {
        self.state.read().await.records.values().cloned().collect()
    }

    pub async fn instructions(&self) -> Vec<SettlementInstruction> {
        self.state
            .read()
            .await
            .instructions
            .values()
            .cloned()
            .collect()
    }
}

fn ensure_unique(state: &MemoryState, payee: &Payee) -> Result<(), StoreError> {
    for other in state.payees.values().filter(|other| other.id != payee.id) {
        if other.email == payee.email {
            return Err(StoreError::DuplicateEmail(payee.email.clone()));
        }
        if payee.phone_number.is_some() && other.phone_number == payee.phone_number {
            return Err(StoreError::DuplicatePhone(
                payee.phone_number.clone().unwrap_or_default(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl PayeeStore for InMemorySettlementStore {
    async fn list_payees(&self) -> Result<Vec<Payee>, StoreError> {
        let state = self.state.read().await;
        let mut payees: Vec<Payee> = state.payees.values().cloned().collect();
        payees.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payees)
    }

    async fn payee(&self, id: Uuid) -> Result<Option<Payee>, StoreError> {
        Ok(self.state.read().await.payees.get(&id).cloned())
    }

    async fn payees_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Payee>, StoreError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.payees.get(id).cloned())
            .collect())
    }

    async fn payee_by_email(&self, email: &str) -> Result<Option<Payee>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .payees
            .values()
            .find(|payee| payee.email == email)
            .cloned())
    }

    async fn payee_by_phone(&self, phone_number: &str) -> Result<Option<Payee>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .payees
            .values()
            .find(|payee| payee.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn insert_payee(&self, payee: &Payee) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.payees.contains_key(&payee.id) {
            return Err(StoreError::Conflict(format!("payee {} already exists", payee.id)));
        }
        ensure_unique(&state, payee)?;
        state.payees.insert(payee.id, payee.clone());
        Ok(())
    }

    async fn update_payee(&self, payee: &Payee) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.payees.contains_key(&payee.id) {
            return Err(StoreError::NotFound(format!("payee {}", payee.id)));
        }
        ensure_unique(&state, payee)?;
        state.payees.insert(payee.id, payee.clone());
        Ok(())
    }

    async fn delete_payee(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.write().await.payees.remove(&id).is_some())
    }
}

#[async_trait]
impl SettlementStore for InMemorySettlementStore {
    async fn unsettled_records(
        &self,
        payee_ids: Option<&[Uuid]>,
    ) -> Result<Vec<WorkRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .filter(|record| record.is_payable())
            .filter(|record| payee_ids.is_none_or(|ids| ids.contains(&record.payee_id)))
            .cloned()
            .collect())
    }

    async fn insert_instruction(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.instructions.contains_key(&instruction.id) {
            return Err(StoreError::Conflict(format!(
                "instruction {} already exists",
                instruction.id
            )));
        }
        state
            .instructions
            .insert(instruction.id, instruction.clone());
        Ok(())
    }

    async fn insert_instruction_claiming(
        &self,
        instruction: &SettlementInstruction,
        record_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        if state.instructions.contains_key(&instruction.id) {
            return Err(StoreError::Conflict(format!(
                "instruction {} already exists",
                instruction.id
            )));
        }

        let claimable = record_ids
            .iter()
            .filter(|id| {
                state.records.get(*id).is_some_and(|record| {
                    record.payee_id == instruction.payee_id && record.is_payable()
                })
            })
            .count();
        if claimable != record_ids.len() {
            return Err(StoreError::Conflict(format!(
                "{} of {} work records for payee {} are no longer unsettled",
                record_ids.len() - claimable,
                record_ids.len(),
                instruction.payee_id
            )));
        }

        state
            .instructions
            .insert(instruction.id, instruction.clone());
        for id in record_ids {
            if let Some(record) = state.records.get_mut(id) {
                record.settled = true;
                record.instruction_id = Some(instruction.id);
            }
        }

        Ok(claimable as u64)
    }

    async fn release_records(&self, instruction_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut released = 0;
        for record in state
            .records
            .values_mut()
            .filter(|record| record.instruction_id == Some(instruction_id))
        {
            record.settled = false;
            record.instruction_id = None;
            released += 1;
        }
        Ok(released)
    }

    async fn instruction(&self, id: Uuid) -> Result<Option<SettlementInstruction>, StoreError> {
        Ok(self.state.read().await.instructions.get(&id).cloned())
    }

    async fn attach_provider_request(
        &self,
        instruction_id: Uuid,
        provider_request_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.instructions.get_mut(&instruction_id) {
            Some(existing) => {
                existing.provider_request_id = Some(provider_request_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_instruction(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.instructions.get_mut(&instruction.id) {
            Some(existing) => {
                existing.status = instruction.status;
                existing.completed_at = instruction.completed_at;
                existing.external_ref = instruction.external_ref.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
