use chrono::Utc;
use polter_core::{
    PaymentProvider, PhoneNumber, SettlementError, SettlementInstruction, SettlementStore,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::service::SettlementService;

impl<S, P> SettlementService<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    /// Pays one payee an arbitrary amount outside the batch run. No work
    /// records are touched; `records_covered` is informational.
    pub async fn pay_payee(
        &self,
        payee_id: Uuid,
        amount: Decimal,
        reason: &str,
        records_covered: Option<i64>,
    ) -> Result<SettlementInstruction, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SettlementError::InvalidRequest(
                "reason is required".to_string(),
            ));
        }
        let records_covered = records_covered.unwrap_or(0);
        if records_covered < 0 {
            return Err(SettlementError::InvalidRequest(
                "records_covered must be non-negative".to_string(),
            ));
        }

        let payee = self
            .store
            .payee(payee_id)
            .await?
            .ok_or(SettlementError::PayeeNotFound)?;
        if !payee.active {
            return Err(SettlementError::PayeeInactive);
        }
        let phone_number = payee
            .phone_number
            .as_deref()
            .map(PhoneNumber::parse_canonical)
            .and_then(Result::ok)
            .ok_or_else(|| SettlementError::InvalidContact(payee.phone_number.clone()))?;

        let mut instruction = SettlementInstruction::pending(
            payee.id,
            amount,
            phone_number.as_str(),
            records_covered,
            reason.to_string(),
            Utc::now(),
        );
        self.store.insert_instruction(&instruction).await?;
        info!(
            instruction_id = %instruction.id,
            payee_id = %payee.id,
            %amount,
            "direct payout instruction written"
        );

        match self.dispatch(&instruction, &phone_number).await {
            Ok(receipt) => {
                instruction.provider_request_id = Some(receipt.provider_request_id);
                Ok(instruction)
            }
            Err(err) => {
                self.dispatch_failed(&instruction, &err, false).await;
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use polter_core::{
        ErrorKind, InstructionStatus, Payee, PaymentProvider, ProviderError, SettlementError,
        SettlementStore, TransferReceipt, TransferRequest,
    };
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::{InMemorySettlementStore, SettlementService};

    #[derive(Default)]
    struct ScriptedProvider {
        reject: bool,
        delay: Option<Duration>,
        requests: Mutex<Vec<TransferRequest>>,
    }

    #[async_trait]
    impl PaymentProvider for ScriptedProvider {
        async fn initiate_transfer(
            &self,
            request: &TransferRequest,
        ) -> Result<TransferReceipt, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.reject {
                return Err(ProviderError::Rejected("insufficient float".to_string()));
            }
            Ok(TransferReceipt {
                provider_request_id: format!("AG_{}", request.instruction_id.simple()),
            })
        }
    }

    fn payee(phone_number: Option<&str>, active: bool) -> Payee {
        Payee {
            id: Uuid::new_v4(),
            name: "Wanjiru".to_string(),
            email: format!("{}@example.com", Uuid::new_v4().simple()),
            phone_number: phone_number.map(str::to_string),
            active,
            rate_per_task: Decimal::TEN,
            created_at: Utc::now(),
        }
    }

    async fn setup(
        payee: &Payee,
        reject: bool,
    ) -> (
        SettlementService<InMemorySettlementStore, ScriptedProvider>,
        Arc<ScriptedProvider>,
    ) {
        let store = Arc::new(InMemorySettlementStore::new());
        store.put_payee(payee.clone()).await;
        let provider = Arc::new(ScriptedProvider {
            reject,
            ..Default::default()
        });
        (SettlementService::new(store, provider.clone()), provider)
    }

    #[tokio::test]
    async fn pays_active_payee_and_records_pending_instruction() {
        let payee = payee(Some("254712345678"), true);
        let (service, provider) = setup(&payee, false).await;

        let instruction = service
            .pay_payee(payee.id, Decimal::new(15050, 2), "Weekly bonus", Some(4))
            .await
            .unwrap();

        assert_eq!(instruction.status, InstructionStatus::Pending);
        assert_eq!(instruction.amount, Decimal::new(15050, 2));
        assert_eq!(instruction.records_covered, 4);
        assert!(instruction.provider_request_id.is_some());

        let stored = service
            .store()
            .instruction(instruction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.provider_request_id, instruction.provider_request_id);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].phone_number.as_str(), "254712345678");
    }

    #[tokio::test]
    async fn rejects_invalid_requests_before_touching_the_provider() {
        let payee = payee(Some("254712345678"), true);
        let (service, provider) = setup(&payee, false).await;

        let err = service
            .pay_payee(payee.id, Decimal::ZERO, "bonus", None)
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::InvalidAmount);

        let err = service
            .pay_payee(payee.id, Decimal::ONE, "   ", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = service
            .pay_payee(Uuid::new_v4(), Decimal::ONE, "bonus", None)
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::PayeeNotFound);

        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refuses_inactive_payee_and_bad_contact() {
        let inactive = payee(Some("254712345678"), false);
        let (service, _) = setup(&inactive, false).await;
        let err = service
            .pay_payee(inactive.id, Decimal::ONE, "bonus", None)
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::PayeeInactive);

        let local_format = payee(Some("0712345678"), true);
        let (service, _) = setup(&local_format, false).await;
        let err = service
            .pay_payee(local_format.id, Decimal::ONE, "bonus", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidContact);
        assert!(service.store().instructions().await.is_empty());
    }

    #[tokio::test]
    async fn provider_rejection_marks_instruction_failed() {
        let payee = payee(Some("254112345678"), true);
        let (service, _) = setup(&payee, true).await;

        let err = service
            .pay_payee(payee.id, Decimal::ONE, "bonus", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderFailure);

        let instructions = service.store().instructions().await;
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].status, InstructionStatus::Failed);
    }

    #[tokio::test]
    async fn provider_timeout_leaves_instruction_pending() {
        let payee = payee(Some("254712345678"), true);
        let store = Arc::new(InMemorySettlementStore::new());
        store.put_payee(payee.clone()).await;
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let service = SettlementService::new(store, provider)
            .with_provider_timeout(Duration::from_millis(20));

        let err = service
            .pay_payee(payee.id, Decimal::ONE, "bonus", None)
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::Provider(ProviderError::Timeout));

        let instructions = service.store().instructions().await;
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].status, InstructionStatus::Pending);
        assert!(instructions[0].completed_at.is_none());
    }
}
