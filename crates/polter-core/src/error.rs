use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("invalid Kenyan phone number {0:?}: must start with 7, 1, or 2 and be 9 digits long")]
    InvalidPhoneFormat(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("phone number already registered: {0}")]
    DuplicatePhone(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transfer rejected: {0}")]
    Rejected(String),
    #[error("transfer request timed out")]
    Timeout,
    #[error("payment provider unreachable: {0}")]
    Transport(String),
}

impl ProviderError {
    /// True when the provider certainly did not take the transfer. After a
    /// timeout or transport error the money may still move.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProviderError::Rejected(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error(transparent)]
    InvalidPhoneFormat(#[from] PhoneError),
    #[error("invalid phone number on payee account: {0:?}")]
    InvalidContact(Option<String>),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("payee not found")]
    PayeeNotFound,
    #[error("payee account is not active")]
    PayeeInactive,
    #[error("amount must be greater than 0")]
    InvalidAmount,
    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPhoneFormat,
    InvalidContact,
    StorageFailure,
    ProviderFailure,
    NotFound,
    Duplicate,
    InvalidRequest,
}

impl SettlementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::InvalidPhoneFormat(_) => ErrorKind::InvalidPhoneFormat,
            SettlementError::InvalidContact(_) => ErrorKind::InvalidContact,
            SettlementError::Storage(StoreError::NotFound(_)) => ErrorKind::NotFound,
            SettlementError::Storage(
                StoreError::DuplicateEmail(_) | StoreError::DuplicatePhone(_),
            ) => ErrorKind::Duplicate,
            SettlementError::Storage(_) => ErrorKind::StorageFailure,
            SettlementError::Provider(_) => ErrorKind::ProviderFailure,
            SettlementError::PayeeNotFound => ErrorKind::NotFound,
            SettlementError::PayeeInactive
            | SettlementError::InvalidAmount
            | SettlementError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}
