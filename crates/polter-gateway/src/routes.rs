use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use polter_core::{
    ErrorKind, InstructionStatus, Payee, PayeeUpdate, PaymentProvider, PhoneNumber,
    SettlementError, SettlementInstruction, SettlementStore,
};
use polter_platform::{
    BatchSettlementRequest, CallbackResponse, NormalizePhoneRequest, NormalizePhoneResponse,
    PayPayeeRequest, PayeeListResponse, RegisterPayeeRequest, SettlementCallbackRequest,
    UpdatePayeeRequest,
};
use polter_settlement::{
    CallbackOutcome, PayeeDirectory, PendingSummary, RegisterPayee, SettlementReport,
    SettlementService,
};
use rust_decimal::Decimal;
use tracing::error;
use uuid::Uuid;

type ApiError = (StatusCode, String);

pub struct AppState<S, P> {
    payees: Arc<PayeeDirectory<S>>,
    settlements: Arc<SettlementService<S, P>>,
}

impl<S, P> Clone for AppState<S, P> {
    fn clone(&self) -> Self {
        Self {
            payees: self.payees.clone(),
            settlements: self.settlements.clone(),
        }
    }
}

impl<S, P> AppState<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        default_rate_per_task: Decimal,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            payees: Arc::new(PayeeDirectory::new(store.clone(), default_rate_per_task)),
            settlements: Arc::new(
                SettlementService::new(store, provider).with_provider_timeout(provider_timeout),
            ),
        }
    }
}

pub fn router<S, P>(state: AppState<S, P>) -> Router
where
    S: SettlementStore + 'static,
    P: PaymentProvider + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/phone/normalize", post(normalize_phone))
        .route(
            "/payees",
            get(list_payees::<S, P>).post(register_payee::<S, P>),
        )
        .route(
            "/payees/{payee_id}",
            get(get_payee::<S, P>)
                .patch(update_payee::<S, P>)
                .delete(delete_payee::<S, P>),
        )
        .route("/payees/{payee_id}/payments", post(pay_payee::<S, P>))
        .route("/settlements/batch", post(run_batch::<S, P>))
        .route("/settlements/pending", get(pending_summary::<S, P>))
        .route(
            "/settlements/callback",
            get(settlement_callback_query::<S, P>).post(settlement_callback::<S, P>),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn normalize_phone(
    Json(payload): Json<NormalizePhoneRequest>,
) -> Result<Json<NormalizePhoneResponse>, ApiError> {
    let phone_number = PhoneNumber::normalize(&payload.phone_number)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;

    Ok(Json(NormalizePhoneResponse {
        carrier: phone_number.carrier(),
        phone_number: phone_number.into(),
    }))
}

async fn list_payees<S, P>(
    State(state): State<AppState<S, P>>,
) -> Result<Json<PayeeListResponse>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    let payees = state.payees.list().await.map_err(settlement_error)?;
    Ok(Json(PayeeListResponse { payees }))
}

async fn register_payee<S, P>(
    State(state): State<AppState<S, P>>,
    Json(payload): Json<RegisterPayeeRequest>,
) -> Result<(StatusCode, Json<Payee>), ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    let payee = state
        .payees
        .register(RegisterPayee {
            name: payload.name,
            email: payload.email,
            phone_number: payload.phone_number,
            rate_per_task: payload.rate_per_task,
        })
        .await
        .map_err(settlement_error)?;

    Ok((StatusCode::CREATED, Json(payee)))
}

async fn get_payee<S, P>(
    State(state): State<AppState<S, P>>,
    Path(payee_id): Path<Uuid>,
) -> Result<Json<Payee>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    state
        .payees
        .get(payee_id)
        .await
        .map(Json)
        .map_err(settlement_error)
}

async fn update_payee<S, P>(
    State(state): State<AppState<S, P>>,
    Path(payee_id): Path<Uuid>,
    Json(payload): Json<UpdatePayeeRequest>,
) -> Result<Json<Payee>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    let update = PayeeUpdate {
        name: payload.name,
        email: payload.email,
        phone_number: payload.phone_number,
        rate_per_task: payload.rate_per_task,
        active: payload.active,
    };

    state
        .payees
        .update(payee_id, update)
        .await
        .map(Json)
        .map_err(settlement_error)
}

async fn delete_payee<S, P>(
    State(state): State<AppState<S, P>>,
    Path(payee_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    state
        .payees
        .remove(payee_id)
        .await
        .map_err(settlement_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pay_payee<S, P>(
    State(state): State<AppState<S, P>>,
    Path(payee_id): Path<Uuid>,
    Json(payload): Json<PayPayeeRequest>,
) -> Result<(StatusCode, Json<SettlementInstruction>), ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    let instruction = state
        .settlements
        .pay_payee(
            payee_id,
            payload.amount,
            &payload.reason,
            payload.records_covered,
        )
        .await
        .map_err(settlement_error)?;

    Ok((StatusCode::CREATED, Json(instruction)))
}

async fn run_batch<S, P>(
    State(state): State<AppState<S, P>>,
    Json(payload): Json<BatchSettlementRequest>,
) -> Result<Json<SettlementReport>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    state
        .settlements
        .aggregate_and_settle(payload.payee_ids.as_deref(), payload.min_record_count)
        .await
        .map(Json)
        .map_err(settlement_error)
}

async fn pending_summary<S, P>(
    State(state): State<AppState<S, P>>,
) -> Result<Json<PendingSummary>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    state
        .settlements
        .pending_summary()
        .await
        .map(Json)
        .map_err(settlement_error)
}

async fn settlement_callback<S, P>(
    State(state): State<AppState<S, P>>,
    Json(payload): Json<SettlementCallbackRequest>,
) -> Result<Json<CallbackResponse>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    apply_callback(&state, payload).await
}

async fn settlement_callback_query<S, P>(
    State(state): State<AppState<S, P>>,
    Query(payload): Query<SettlementCallbackRequest>,
) -> Result<Json<CallbackResponse>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    apply_callback(&state, payload).await
}

async fn apply_callback<S, P>(
    state: &AppState<S, P>,
    payload: SettlementCallbackRequest,
) -> Result<Json<CallbackResponse>, ApiError>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    let instruction_id: Uuid = payload.instruction_id.trim().parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("instruction_id {:?} is not a valid id", payload.instruction_id),
        )
    })?;
    let status: InstructionStatus = payload
        .status
        .parse()
        .map_err(|err: String| (StatusCode::BAD_REQUEST, err))?;

    let outcome = state
        .settlements
        .apply_callback(instruction_id, status, payload.external_ref)
        .await
        .map_err(settlement_error)?;

    let message = match outcome {
        CallbackOutcome::Applied => "settlement callback applied",
        CallbackOutcome::Unchanged => "settlement callback already applied",
        CallbackOutcome::UnknownInstruction => "settlement callback received",
    };
    Ok(Json(CallbackResponse {
        message: message.to_string(),
    }))
}

fn settlement_error(err: SettlementError) -> ApiError {
    let status = match err.kind() {
        ErrorKind::InvalidPhoneFormat | ErrorKind::InvalidContact | ErrorKind::InvalidRequest => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Duplicate => StatusCode::CONFLICT,
        ErrorKind::ProviderFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::StorageFailure => {
            error!("storage failure: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use polter_core::{
        PaymentProvider, ProviderError, SettlementStore, TransferReceipt, TransferRequest,
        WorkRecord, WorkStatus,
    };
    use polter_settlement::InMemorySettlementStore;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::{AppState, router};

    struct AcceptingProvider;

    #[async_trait]
    impl PaymentProvider for AcceptingProvider {
        async fn initiate_transfer(
            &self,
            request: &TransferRequest,
        ) -> Result<TransferReceipt, ProviderError> {
            Ok(TransferReceipt {
                provider_request_id: format!("PR_{}", request.instruction_id.simple()),
            })
        }
    }

    fn app(store: &Arc<InMemorySettlementStore>) -> Router {
        router(AppState::new(
            store.clone(),
            Arc::new(AcceptingProvider),
            Decimal::TEN,
            Duration::from_secs(1),
        ))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn normalize_endpoint_reports_carrier() {
        let store = Arc::new(InMemorySettlementStore::new());
        let app = app(&store);

        let (status, body) = send(
            &app,
            "POST",
            "/phone/normalize",
            Some(json!({ "phone_number": "0112 345 678" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone_number"], "254112345678");
        assert_eq!(body["carrier"], "Airtel");

        let (status, _) = send(
            &app,
            "POST",
            "/phone/normalize",
            Some(json!({ "phone_number": "0612345678" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn payee_lifecycle_over_http() {
        let store = Arc::new(InMemorySettlementStore::new());
        let app = app(&store);

        let (status, payee) = send(
            &app,
            "POST",
            "/payees",
            Some(json!({
                "name": "Njeri",
                "email": "njeri@example.com",
                "phone_number": "+254 712 345 678"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payee["phone_number"], "254712345678");
        let id = payee["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/payees",
            Some(json!({
                "name": "Njeri Again",
                "email": "other@example.com",
                "phone_number": "0712345678"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = send(
            &app,
            "PATCH",
            &format!("/payees/{id}"),
            Some(json!({ "active": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["active"], false);

        let (status, _) = send(&app, "DELETE", &format!("/payees/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", &format!("/payees/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn batch_and_callback_over_http() {
        let store = Arc::new(InMemorySettlementStore::new());
        let app = app(&store);

        let (_, payee) = send(
            &app,
            "POST",
            "/payees",
            Some(json!({
                "name": "Otieno",
                "email": "otieno@example.com",
                "phone_number": "0712345678"
            })),
        )
        .await;
        let payee_id: Uuid = payee["id"].as_str().unwrap().parse().unwrap();
        for amount in ["10.25", "9.75"] {
            store
                .put_record(WorkRecord {
                    id: Uuid::new_v4(),
                    payee_id,
                    amount: amount.parse().unwrap(),
                    status: WorkStatus::Completed,
                    settled: false,
                    instruction_id: None,
                })
                .await;
        }

        let (status, summary) = send(&app, "GET", "/settlements/pending", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total_payees"], 1);
        assert_eq!(summary["grand_total"], "20.00");

        let (status, report) = send(
            &app,
            "POST",
            "/settlements/batch",
            Some(json!({ "min_record_count": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["succeeded"], 1);
        assert_eq!(report["details"][0]["status"], "success");
        let instruction_id = report["details"][0]["instruction_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, _) = send(
            &app,
            "GET",
            &format!(
                "/settlements/callback?paymentId={instruction_id}&status=success&transactionId=QK71XYZ"
            ),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let instruction = store
            .instruction(instruction_id.parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(instruction.external_ref.as_deref(), Some("QK71XYZ"));
        assert!(instruction.completed_at.is_some_and(|at| at <= Utc::now()));

        let (status, _) = send(
            &app,
            "POST",
            "/settlements/callback",
            Some(json!({ "instruction_id": instruction_id, "status": "settled" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/settlements/callback",
            Some(json!({ "instruction_id": "PAY-42", "status": "success" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "GET",
            "/settlements/callback?paymentId=not-an-id&status=success",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn direct_payment_requires_positive_amount() {
        let store = Arc::new(InMemorySettlementStore::new());
        let app = app(&store);

        let (_, payee) = send(
            &app,
            "POST",
            "/payees",
            Some(json!({
                "name": "Kamau",
                "email": "kamau@example.com",
                "phone_number": "0212345678"
            })),
        )
        .await;
        let id = payee["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            &format!("/payees/{id}/payments"),
            Some(json!({ "amount": "0", "reason": "bonus" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, instruction) = send(
            &app,
            "POST",
            &format!("/payees/{id}/payments"),
            Some(json!({ "amount": "250.00", "reason": "bonus" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(instruction["status"], "pending");
        assert_eq!(instruction["phone_number"], "254212345678");
    }
}
