use chrono::Utc;
use polter_core::{InstructionStatus, PaymentProvider, SettlementError, SettlementStore};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::service::SettlementService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Applied,
    Unchanged,
    UnknownInstruction,
}

impl<S, P> SettlementService<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    /// Records the provider's final word on an instruction.
    ///
    /// Providers retry and duplicate callbacks, so an unknown id is ignored and
    /// a repeat of the stored status changes nothing beyond filling in a
    /// missing reference.
    pub async fn apply_callback(
        &self,
        instruction_id: Uuid,
        status: InstructionStatus,
        external_ref: Option<String>,
    ) -> Result<CallbackOutcome, SettlementError> {
        let external_ref = external_ref
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let Some(mut instruction) = self.store.instruction(instruction_id).await? else {
            warn!(%instruction_id, "callback for unknown settlement instruction ignored");
            return Ok(CallbackOutcome::UnknownInstruction);
        };

        if instruction.status == status {
            // A repeat keeps the stored completion time and only ever adds a
            // reference the provider did not send before.
            match external_ref {
                Some(reference) if instruction.external_ref.as_ref() != Some(&reference) => {
                    instruction.external_ref = Some(reference);
                }
                _ => {
                    info!(%instruction_id, %status, "duplicate settlement callback ignored");
                    return Ok(CallbackOutcome::Unchanged);
                }
            }
        } else {
            if instruction.status == InstructionStatus::Failed
                && status == InstructionStatus::Success
            {
                warn!(%instruction_id, "failed settlement instruction reported successful");
            }
            instruction.completed_at = match status {
                InstructionStatus::Success => Some(Utc::now()),
                InstructionStatus::Pending | InstructionStatus::Failed => None,
            };
            instruction.status = status;
            instruction.external_ref = external_ref;
        }

        if !self.store.update_instruction(&instruction).await? {
            warn!(%instruction_id, "settlement instruction disappeared before callback update");
            return Ok(CallbackOutcome::UnknownInstruction);
        }

        info!(%instruction_id, %status, "settlement callback applied");
        Ok(CallbackOutcome::Applied)
    }
}
