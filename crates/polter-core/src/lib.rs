pub mod error;
pub mod models;
pub mod phone;
pub mod storage;

pub use error::{ErrorKind, PhoneError, ProviderError, SettlementError, StoreError};
pub use models::{
    InstructionStatus, Payee, PayeeUpdate, SettlementInstruction, WorkRecord, WorkStatus,
};
pub use phone::{Carrier, PhoneNumber};
pub use storage::{
    PayeeStore, PaymentProvider, SettlementStore, TransferReceipt, TransferRequest,
};
