//! Ledger and queue DDL
//!
//! Everything lives in the `payments` schema. `auth.users` belongs to the
//! identity service; it is only read here to resolve recipients by email,
//! and is created empty when absent so a standalone deployment can boot.

use sqlx::PgPool;

pub const CREATE_PAYMENTS_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS payments";

pub const CREATE_AUTH_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS auth";

pub const CREATE_AUTH_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS auth.users (
    id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    email       TEXT NOT NULL UNIQUE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments.accounts (
    id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id     UUID NOT NULL UNIQUE,
    balance     NUMERIC(15, 2) NOT NULL CHECK (balance >= 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments.transactions (
    id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    from_account_id  UUID REFERENCES payments.accounts (id),
    to_account_id    UUID NOT NULL REFERENCES payments.accounts (id),
    amount           NUMERIC(15, 2) NOT NULL CHECK (amount > 0),
    status           TEXT NOT NULL DEFAULT 'pending'
                     CHECK (status IN ('pending', 'completed', 'failed')),
    description      TEXT,
    error_message    TEXT,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSACTIONS_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS transactions_from_idx ON payments.transactions (from_account_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS transactions_to_idx ON payments.transactions (to_account_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS transactions_pending_idx ON payments.transactions (created_at) WHERE status = 'pending'",
];

/// Live transfer messages. One row per message; `transaction_id` is unique so
/// a pending transaction can never have two outstanding messages.
pub const CREATE_TRANSFER_QUEUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments.transfer_queue (
    id              BIGSERIAL PRIMARY KEY,
    transaction_id  UUID,
    payload         TEXT NOT NULL,
    deliveries      INT NOT NULL DEFAULT 0,
    available_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    locked_until    TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSFER_QUEUE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS transfer_queue_tx_uidx ON payments.transfer_queue (transaction_id) WHERE transaction_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS transfer_queue_ready_idx ON payments.transfer_queue (available_at, id)",
];

pub const CREATE_DEAD_LETTER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments.transfer_dead_letters (
    id                BIGSERIAL PRIMARY KEY,
    message_id        BIGINT NOT NULL,
    transaction_id    UUID,
    payload           TEXT NOT NULL,
    deliveries        INT NOT NULL,
    reason            TEXT NOT NULL,
    dead_lettered_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_DEAD_LETTER_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS transfer_dead_letters_tx_idx ON payments.transfer_dead_letters (transaction_id)",
];

/// Initialize every table the service owns. Safe to run on every boot.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing payments schema...");

    for ddl in [
        CREATE_PAYMENTS_SCHEMA,
        CREATE_AUTH_SCHEMA,
        CREATE_AUTH_USERS_TABLE,
        CREATE_ACCOUNTS_TABLE,
        CREATE_TRANSACTIONS_TABLE,
        CREATE_TRANSFER_QUEUE_TABLE,
        CREATE_DEAD_LETTER_TABLE,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in CREATE_TRANSACTIONS_INDEXES
        .iter()
        .chain(CREATE_TRANSFER_QUEUE_INDEXES)
        .chain(CREATE_DEAD_LETTER_INDEXES)
    {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Payments schema ready");
    Ok(())
}
