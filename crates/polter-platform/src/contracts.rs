use polter_core::{Carrier, Payee};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizePhoneRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizePhoneResponse {
    pub phone_number: String,
    pub carrier: Carrier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayeeRequest {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub rate_per_task: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePayeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub rate_per_task: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayeeListResponse {
    pub payees: Vec<Payee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPayeeRequest {
    pub amount: Decimal,
    pub reason: String,
    pub records_covered: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettlementRequest {
    #[serde(default)]
    pub payee_ids: Option<Vec<Uuid>>,
    #[serde(default = "default_min_record_count")]
    pub min_record_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCallbackRequest {
    /// Kept as text so a malformed id is answered with a 400 by the handler.
    #[serde(alias = "paymentId")]
    pub instruction_id: String,
    pub status: String,
    #[serde(default, alias = "transactionId")]
    pub external_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub message: String,
}

fn default_min_record_count() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::{BatchSettlementRequest, SettlementCallbackRequest};

    #[test]
    fn callback_accepts_provider_field_names() {
        let request: SettlementCallbackRequest = serde_json::from_str(
            r#"{"paymentId":"67e55044-10b1-426f-9247-bb680e5fe0c8","status":"success","transactionId":"QK71XYZ"}"#,
        )
        .unwrap();
        assert_eq!(request.instruction_id, "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(request.status, "success");
        assert_eq!(request.external_ref.as_deref(), Some("QK71XYZ"));
    }

    #[test]
    fn batch_request_defaults_to_every_payee_and_one_record() {
        let request: BatchSettlementRequest = serde_json::from_str("{}").unwrap();
        assert!(request.payee_ids.is_none());
        assert_eq!(request.min_record_count, 1);
    }
}
