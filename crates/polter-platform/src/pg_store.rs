use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polter_core::{
    InstructionStatus, Payee, PayeeStore, SettlementInstruction, SettlementStore, StoreError,
    WorkRecord, WorkStatus,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

const PAYEE_COLUMNS: &str =
    "id, name, email, phone_number, is_active, rate_per_task, created_at";
const INSTRUCTION_COLUMNS: &str = "id, payee_id, amount, phone_number, records_covered, reason, \
     status, provider_request_id, external_ref, initiated_at, completed_at";

/// Postgres-backed store. Claims and releases run inside a transaction so an
/// instruction and the records pointing at it are committed together.
#[derive(Clone)]
pub struct PgSettlementStore {
    pool: PgPool,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn payee_write_error(err: sqlx::Error, payee: &Payee) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return match db_err.constraint() {
            Some(constraint) if constraint.contains("email") => {
                StoreError::DuplicateEmail(payee.email.clone())
            }
            Some(constraint) if constraint.contains("phone") => {
                StoreError::DuplicatePhone(payee.phone_number.clone().unwrap_or_default())
            }
            _ => StoreError::Conflict(db_err.message().to_string()),
        };
    }
    backend_error(err)
}

fn payee_from_row(row: &PgRow) -> Result<Payee, StoreError> {
    Ok(Payee {
        id: row.try_get("id").map_err(backend_error)?,
        name: row.try_get("name").map_err(backend_error)?,
        email: row.try_get("email").map_err(backend_error)?,
        phone_number: row.try_get("phone_number").map_err(backend_error)?,
        active: row.try_get("is_active").map_err(backend_error)?,
        rate_per_task: row.try_get("rate_per_task").map_err(backend_error)?,
        created_at: row.try_get("created_at").map_err(backend_error)?,
    })
}

fn record_from_row(row: &PgRow) -> Result<WorkRecord, StoreError> {
    let status: String = row.try_get("status").map_err(backend_error)?;
    Ok(WorkRecord {
        id: row.try_get("id").map_err(backend_error)?,
        payee_id: row.try_get("payee_id").map_err(backend_error)?,
        amount: row.try_get("amount").map_err(backend_error)?,
        status: WorkStatus::from_stored(&status),
        settled: row.try_get("settled").map_err(backend_error)?,
        instruction_id: row.try_get("instruction_id").map_err(backend_error)?,
    })
}

fn instruction_from_row(row: &PgRow) -> Result<SettlementInstruction, StoreError> {
    let status: String = row.try_get("status").map_err(backend_error)?;
    let amount: Decimal = row.try_get("amount").map_err(backend_error)?;
    let completed_at: Option<DateTime<Utc>> =
        row.try_get("completed_at").map_err(backend_error)?;

    Ok(SettlementInstruction {
        id: row.try_get("id").map_err(backend_error)?,
        payee_id: row.try_get("payee_id").map_err(backend_error)?,
        amount,
        phone_number: row.try_get("phone_number").map_err(backend_error)?,
        records_covered: row.try_get("records_covered").map_err(backend_error)?,
        reason: row.try_get("reason").map_err(backend_error)?,
        status: status
            .parse::<InstructionStatus>()
            .map_err(StoreError::Backend)?,
        provider_request_id: row.try_get("provider_request_id").map_err(backend_error)?,
        external_ref: row.try_get("external_ref").map_err(backend_error)?,
        initiated_at: row.try_get("initiated_at").map_err(backend_error)?,
        completed_at,
    })
}

#[async_trait]
impl PayeeStore for PgSettlementStore {
    async fn list_payees(&self) -> Result<Vec<Payee>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYEE_COLUMNS} FROM payees ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(payee_from_row).collect()
    }

    async fn payee(&self, id: Uuid) -> Result<Option<Payee>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PAYEE_COLUMNS} FROM payees WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        row.as_ref().map(payee_from_row).transpose()
    }

    async fn payees_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Payee>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYEE_COLUMNS} FROM payees WHERE id = ANY($1)"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(payee_from_row).collect()
    }

    async fn payee_by_email(&self, email: &str) -> Result<Option<Payee>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYEE_COLUMNS} FROM payees WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        row.as_ref().map(payee_from_row).transpose()
    }

    async fn payee_by_phone(&self, phone_number: &str) -> Result<Option<Payee>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYEE_COLUMNS} FROM payees WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        row.as_ref().map(payee_from_row).transpose()
    }

    async fn insert_payee(&self, payee: &Payee) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payees (id, name, email, phone_number, is_active, rate_per_task, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payee.id)
        .bind(&payee.name)
        .bind(&payee.email)
        .bind(&payee.phone_number)
        .bind(payee.active)
        .bind(payee.rate_per_task)
        .bind(payee.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| payee_write_error(err, payee))?;

        Ok(())
    }

    async fn update_payee(&self, payee: &Payee) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payees
            SET name = $2,
                email = $3,
                phone_number = $4,
                is_active = $5,
                rate_per_task = $6
            WHERE id = $1
            "#,
        )
        .bind(payee.id)
        .bind(&payee.name)
        .bind(&payee.email)
        .bind(&payee.phone_number)
        .bind(payee.active)
        .bind(payee.rate_per_task)
        .execute(&self.pool)
        .await
        .map_err(|err| payee_write_error(err, payee))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("payee {}", payee.id)));
        }
        Ok(())
    }

    async fn delete_payee(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM payees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_instruction_row<'e, E>(
    executor: E,
    instruction: &SettlementInstruction,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO settlement_instructions (
            id,
            payee_id,
            amount,
            phone_number,
            records_covered,
            reason,
            status,
            provider_request_id,
            external_ref,
            initiated_at,
            completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(instruction.id)
    .bind(instruction.payee_id)
    .bind(instruction.amount)
    .bind(&instruction.phone_number)
    .bind(instruction.records_covered)
    .bind(&instruction.reason)
    .bind(instruction.status.as_str())
    .bind(&instruction.provider_request_id)
    .bind(&instruction.external_ref)
    .bind(instruction.initiated_at)
    .bind(instruction.completed_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn unsettled_records(
        &self,
        payee_ids: Option<&[Uuid]>,
    ) -> Result<Vec<WorkRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, payee_id, amount, status, settled, instruction_id
            FROM work_records
            WHERE settled = FALSE
              AND status = 'completed'
              AND ($1::uuid[] IS NULL OR payee_id = ANY($1))
            "#,
        )
        .bind(payee_ids.map(<[Uuid]>::to_vec))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn insert_instruction(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<(), StoreError> {
        insert_instruction_row(&self.pool, instruction)
            .await
            .map_err(backend_error)
    }

    async fn insert_instruction_claiming(
        &self,
        instruction: &SettlementInstruction,
        record_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        insert_instruction_row(&mut *tx, instruction)
            .await
            .map_err(backend_error)?;

        let claimed = sqlx::query(
            r#"
            UPDATE work_records
            SET settled = TRUE,
                instruction_id = $1
            WHERE payee_id = $2
              AND id = ANY($3)
              AND settled = FALSE
              AND status = 'completed'
            "#,
        )
        .bind(instruction.id)
        .bind(instruction.payee_id)
        .bind(record_ids.to_vec())
        .execute(&mut *tx)
        .await
        .map_err(backend_error)?
        .rows_affected();

        if claimed != record_ids.len() as u64 {
            tx.rollback().await.map_err(backend_error)?;
            return Err(StoreError::Conflict(format!(
                "{} of {} work records for payee {} are no longer unsettled",
                record_ids.len() as u64 - claimed,
                record_ids.len(),
                instruction.payee_id
            )));
        }

        tx.commit().await.map_err(backend_error)?;
        Ok(claimed)
    }

    async fn release_records(&self, instruction_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE work_records
            SET settled = FALSE,
                instruction_id = NULL
            WHERE instruction_id = $1
            "#,
        )
        .bind(instruction_id)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected())
    }

    async fn instruction(&self, id: Uuid) -> Result<Option<SettlementInstruction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {INSTRUCTION_COLUMNS} FROM settlement_instructions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        row.as_ref().map(instruction_from_row).transpose()
    }

    async fn attach_provider_request(
        &self,
        instruction_id: Uuid,
        provider_request_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE settlement_instructions SET provider_request_id = $2 WHERE id = $1",
        )
        .bind(instruction_id)
        .bind(provider_request_id)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_instruction(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE settlement_instructions
            SET status = $2,
                completed_at = $3,
                external_ref = $4
            WHERE id = $1
            "#,
        )
        .bind(instruction.id)
        .bind(instruction.status.as_str())
        .bind(instruction.completed_at)
        .bind(&instruction.external_ref)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }
}
