pub mod batch;
pub mod callback;
pub mod memory;
pub mod payees;
pub mod payout;
pub mod service;
pub mod summary;

pub use batch::{PayeeOutcome, PayeeSettlement, SettlementReport};
pub use callback::CallbackOutcome;
pub use memory::InMemorySettlementStore;
pub use payees::{PayeeDirectory, RegisterPayee};
pub use service::SettlementService;
pub use summary::{PendingPayee, PendingSummary};
