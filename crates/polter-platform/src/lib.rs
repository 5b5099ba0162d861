pub mod config;
pub mod contracts;
pub mod db;
pub mod payouts;
pub mod pg_store;

pub use config::ServiceConfig;
pub use contracts::{
    BatchSettlementRequest, CallbackResponse, NormalizePhoneRequest, NormalizePhoneResponse,
    PayPayeeRequest, PayeeListResponse, RegisterPayeeRequest, SettlementCallbackRequest,
    UpdatePayeeRequest,
};
pub use db::{connect_database, ensure_schema};
pub use payouts::{PAYOUTS_REQUESTED_CHANNEL, PayoutRequestedEvent, RedisPayoutDispatcher};
pub use pg_store::PgSettlementStore;
