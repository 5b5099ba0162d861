use std::sync::Arc;

use chrono::Utc;
use polter_core::{Payee, PayeeStore, PayeeUpdate, PhoneNumber, SettlementError, StoreError};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RegisterPayee {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub rate_per_task: Option<Decimal>,
}

/// Registration and maintenance of the people who get paid. Phone numbers
/// are normalized here, so everything persisted is canonical.
pub struct PayeeDirectory<S> {
    store: Arc<S>,
    default_rate: Decimal,
}

impl<S: PayeeStore> PayeeDirectory<S> {
    pub fn new(store: Arc<S>, default_rate: Decimal) -> Self {
        Self {
            store,
            default_rate,
        }
    }

    pub async fn register(&self, request: RegisterPayee) -> Result<Payee, SettlementError> {
        let name = required(&request.name, "name")?;
        let email = required(&request.email, "email")?;
        required(&request.phone_number, "phone_number")?;
        let phone_number = PhoneNumber::normalize(&request.phone_number)?;
        let rate_per_task = validate_rate(request.rate_per_task.unwrap_or(self.default_rate))?;

        if self.store.payee_by_email(&email).await?.is_some() {
            return Err(StoreError::DuplicateEmail(email).into());
        }
        if self
            .store
            .payee_by_phone(phone_number.as_str())
            .await?
            .is_some()
        {
            return Err(StoreError::DuplicatePhone(phone_number.to_string()).into());
        }

        let payee = Payee {
            id: Uuid::new_v4(),
            name,
            email,
            phone_number: Some(phone_number.into()),
            active: true,
            rate_per_task,
            created_at: Utc::now(),
        };
        self.store.insert_payee(&payee).await?;
        info!(payee_id = %payee.id, "payee registered");

        Ok(payee)
    }

    /// Applies the non-empty fields of `update`. A new phone number is
    /// normalized the same way as on registration.
    pub async fn update(&self, id: Uuid, update: PayeeUpdate) -> Result<Payee, SettlementError> {
        let mut payee = self.get(id).await?;

        if let Some(name) = non_empty(update.name) {
            payee.name = name;
        }
        if let Some(email) = non_empty(update.email)
            && email != payee.email
        {
            if self.store.payee_by_email(&email).await?.is_some() {
                return Err(StoreError::DuplicateEmail(email).into());
            }
            payee.email = email;
        }
        if let Some(raw) = non_empty(update.phone_number) {
            let phone_number = PhoneNumber::normalize(&raw)?;
            if payee.phone_number.as_deref() != Some(phone_number.as_str()) {
                if self
                    .store
                    .payee_by_phone(phone_number.as_str())
                    .await?
                    .is_some()
                {
                    return Err(StoreError::DuplicatePhone(phone_number.to_string()).into());
                }
                payee.phone_number = Some(phone_number.into());
            }
        }
        if let Some(rate_per_task) = update.rate_per_task {
            payee.rate_per_task = validate_rate(rate_per_task)?;
        }
        if let Some(active) = update.active {
            payee.active = active;
        }

        self.store.update_payee(&payee).await?;
        info!(payee_id = %payee.id, active = payee.active, "payee updated");

        Ok(payee)
    }

    pub async fn get(&self, id: Uuid) -> Result<Payee, SettlementError> {
        self.store
            .payee(id)
            .await?
            .ok_or(SettlementError::PayeeNotFound)
    }

    pub async fn list(&self) -> Result<Vec<Payee>, SettlementError> {
        Ok(self.store.list_payees().await?)
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), SettlementError> {
        if !self.store.delete_payee(id).await? {
            return Err(SettlementError::PayeeNotFound);
        }
        info!(payee_id = %id, "payee removed");
        Ok(())
    }
}

fn required(value: &str, field: &str) -> Result<String, SettlementError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SettlementError::InvalidRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_rate(rate: Decimal) -> Result<Decimal, SettlementError> {
    if rate < Decimal::ZERO {
        return Err(SettlementError::InvalidRequest(
            "rate_per_task must be non-negative".to_string(),
        ));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use polter_core::{ErrorKind, PayeeUpdate, SettlementError};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{PayeeDirectory, RegisterPayee};
    use crate::InMemorySettlementStore;

    fn directory() -> PayeeDirectory<InMemorySettlementStore> {
        PayeeDirectory::new(Arc::new(InMemorySettlementStore::new()), Decimal::TEN)
    }

    fn request(email: &str, phone_number: &str) -> RegisterPayee {
        RegisterPayee {
            name: " Achieng Otieno ".to_string(),
            email: email.to_string(),
            phone_number: phone_number.to_string(),
            rate_per_task: None,
        }
    }

    #[tokio::test]
    async fn register_normalizes_phone_and_applies_defaults() {
        let directory = directory();

        let payee = directory
            .register(request("achieng@example.com", "0712 345 678"))
            .await
            .unwrap();

        assert_eq!(payee.name, "Achieng Otieno");
        assert_eq!(payee.phone_number.as_deref(), Some("254712345678"));
        assert_eq!(payee.rate_per_task, Decimal::TEN);
        assert!(payee.active);
        assert_eq!(directory.get(payee.id).await.unwrap().email, "achieng@example.com");
    }

    #[tokio::test]
    async fn register_rejects_missing_fields_and_bad_phone() {
        let directory = directory();

        let err = directory
            .register(request("  ", "0712345678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = directory
            .register(request("a@example.com", "0612345678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPhoneFormat);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_and_phone() {
        let directory = directory();
        directory
            .register(request("a@example.com", "0712345678"))
            .await
            .unwrap();

        let err = directory
            .register(request("a@example.com", "0112345678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let err = directory
            .register(request("b@example.com", "+254 712 345 678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn update_applies_patch_and_renormalizes_phone() {
        let directory = directory();
        let payee = directory
            .register(request("a@example.com", "0712345678"))
            .await
            .unwrap();

        let updated = directory
            .update(
                payee.id,
                PayeeUpdate {
                    phone_number: Some("0212-345-678".to_string()),
                    active: Some(false),
                    name: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.phone_number.as_deref(), Some("254212345678"));
        assert!(!updated.active);
        assert_eq!(updated.name, "Achieng Otieno");
    }

    #[tokio::test]
    async fn remove_and_lookup_of_missing_payee() {
        let directory = directory();
        let payee = directory
            .register(request("a@example.com", "0712345678"))
            .await
            .unwrap();

        directory.remove(payee.id).await.unwrap();
        assert_eq!(
            directory.get(payee.id).await.unwrap_err(),
            SettlementError::PayeeNotFound
        );
        assert_eq!(
            directory.remove(Uuid::new_v4()).await.unwrap_err(),
            SettlementError::PayeeNotFound
        );
        assert!(directory.list().await.unwrap().is_empty());
    }
}
