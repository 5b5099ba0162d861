use anyhow::Result;
use sqlx::{PgPool, postgres::PgPoolOptions};

pub async fn connect_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS payees (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone_number TEXT UNIQUE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        rate_per_task NUMERIC(14, 2) NOT NULL DEFAULT 10,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settlement_instructions (
        id UUID PRIMARY KEY,
        payee_id UUID NOT NULL,
        amount NUMERIC(14, 2) NOT NULL,
        phone_number TEXT NOT NULL,
        records_covered BIGINT NOT NULL DEFAULT 0,
        reason TEXT NOT NULL,
        status TEXT NOT NULL,
        provider_request_id TEXT,
        external_ref TEXT,
        initiated_at TIMESTAMPTZ NOT NULL,
        completed_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS work_records (
        id UUID PRIMARY KEY,
        payee_id UUID NOT NULL,
        amount NUMERIC(14, 2) NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        settled BOOLEAN NOT NULL DEFAULT FALSE,
        instruction_id UUID REFERENCES settlement_instructions (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS work_records_unsettled_idx
        ON work_records (payee_id)
        WHERE settled = FALSE AND status = 'completed'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS settlement_instructions_payee_idx
        ON settlement_instructions (payee_id, initiated_at DESC)
    "#,
];

/// Creates the settlement tables if they are missing. Safe to run on every
/// start-up.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
