use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polter_core::{PaymentProvider, ProviderError, TransferReceipt, TransferRequest};
use redis::{AsyncCommands, Client};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const PAYOUTS_REQUESTED_CHANNEL: &str = "payouts.requested";

/// What the mobile-money worker receives. The worker reports back through the
/// settlement callback using `instruction_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequestedEvent {
    pub provider_request_id: String,
    pub instruction_id: Uuid,
    pub phone_number: String,
    pub carrier: String,
    pub amount: Decimal,
    pub reference: String,
    pub requested_at: DateTime<Utc>,
}

/// Hands transfers to the payout worker over Redis pub/sub.
#[derive(Clone)]
pub struct RedisPayoutDispatcher {
    client: Client,
}

impl RedisPayoutDispatcher {
    pub fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn publish(&self, event: &PayoutRequestedEvent) -> Result<i64, ProviderError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(transport_error)?;
        connection
            .publish(PAYOUTS_REQUESTED_CHANNEL, payload)
            .await
            .map_err(transport_error)
    }
}

fn transport_error(err: redis::RedisError) -> ProviderError {
    ProviderError::Transport(err.to_string())
}

#[async_trait]
impl PaymentProvider for RedisPayoutDispatcher {
    async fn initiate_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, ProviderError> {
        let event = PayoutRequestedEvent {
            provider_request_id: format!("PR_{}", Uuid::new_v4().simple()),
            instruction_id: request.instruction_id,
            phone_number: request.phone_number.to_string(),
            carrier: request.phone_number.carrier().to_string(),
            amount: request.amount,
            reference: request.reference.clone(),
            requested_at: Utc::now(),
        };

        let receivers = self.publish(&event).await?;
        if receivers == 0 {
            return Err(ProviderError::Rejected(
                "no payout worker is subscribed".to_string(),
            ));
        }
        if receivers > 1 {
            warn!(
                instruction_id = %request.instruction_id,
                receivers,
                "payout request delivered to more than one worker"
            );
        }

        info!(
            instruction_id = %request.instruction_id,
            provider_request_id = %event.provider_request_id,
            "payout request published"
        );
        Ok(TransferReceipt {
            provider_request_id: event.provider_request_id,
        })
    }
}
