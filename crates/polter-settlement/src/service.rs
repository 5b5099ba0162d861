use std::sync::Arc;
use std::time::Duration;

use polter_core::{
    InstructionStatus, PaymentProvider, PhoneNumber, ProviderError, SettlementInstruction,
    SettlementStore, TransferReceipt, TransferRequest,
};
use tracing::{error, info, warn};

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Settles completed work against a storage backend and a payout provider.
///
/// The batch run, direct payouts, the pending summary and provider callbacks
/// are implemented in their own modules on top of this type.
pub struct SettlementService<S, P> {
    pub(crate) store: Arc<S>,
    provider: Arc<P>,
    provider_timeout: Duration,
}

impl<S, P> SettlementService<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    pub fn new(store: Arc<S>, provider: Arc<P>) -> Self {
        Self {
            store,
            provider,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Hands the transfer to the provider, bounded by the provider timeout,
    /// and records the provider's request id on success.
    pub(crate) async fn dispatch(
        &self,
        instruction: &SettlementInstruction,
        phone_number: &PhoneNumber,
    ) -> Result<TransferReceipt, ProviderError> {
        let request = TransferRequest {
            instruction_id: instruction.id,
            phone_number: phone_number.clone(),
            amount: instruction.amount,
            reference: instruction.id.to_string(),
        };

        let receipt = tokio::time::timeout(
            self.provider_timeout,
            self.provider.initiate_transfer(&request),
        )
        .await
        .map_err(|_| ProviderError::Timeout)??;

        info!(
            instruction_id = %instruction.id,
            payee_id = %instruction.payee_id,
            carrier = %phone_number.carrier(),
            amount = %instruction.amount,
            provider_request_id = %receipt.provider_request_id,
            "transfer dispatched"
        );

        if let Err(err) = self
            .store
            .attach_provider_request(instruction.id, &receipt.provider_request_id)
            .await
        {
            warn!(
                instruction_id = %instruction.id,
                "failed to record provider request id: {err}"
            );
        }

        Ok(receipt)
    }

    /// Settles the fate of an instruction whose dispatch returned `err`.
    ///
    /// Only a rejection is final: the instruction is marked failed and, with
    /// `release_claim`, its work records return to the unsettled pool. After a
    /// timeout or transport error the transfer may still complete, so the
    /// instruction stays pending and keeps its records until the provider
    /// callback reports the outcome.
    pub(crate) async fn dispatch_failed(
        &self,
        instruction: &SettlementInstruction,
        err: &ProviderError,
        release_claim: bool,
    ) {
        if err.is_rejection() {
            self.abandon(instruction, release_claim).await;
        } else {
            warn!(
                instruction_id = %instruction.id,
                payee_id = %instruction.payee_id,
                "transfer outcome unknown, instruction left pending for callback: {err}"
            );
        }
    }

    async fn abandon(
        &self,
        instruction: &SettlementInstruction,
        release_claim: bool,
    ) {
        let mut failed = instruction.clone();
        failed.status = InstructionStatus::Failed;
        failed.completed_at = None;

        if let Err(err) = self.store.update_instruction(&failed).await {
            error!(
                instruction_id = %instruction.id,
                "failed to mark instruction failed: {err}"
            );
        }

        if release_claim {
            match self.store.release_records(instruction.id).await {
                Ok(released) => info!(
                    instruction_id = %instruction.id,
                    released,
                    "work records returned to unsettled pool"
                ),
                Err(err) => error!(
                    instruction_id = %instruction.id,
                    "failed to release work records: {err}"
                ),
            }
        }
    }
}
