use std::time::Duration;
use std::{error::Error, pin::Pin};

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use storage::{Storage, MAX_INSERT_ROWS};
use tracing::debug;
use types::{Checkpoint, TransferRecord};

use crate::error::PostgresStorageError;

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pub db_dsn: String,
    pub pool: PgPool,
    pub tables_prefix: String,
    genesis_slot: i64,
}

impl PostgresStorage {
    pub async fn new(
        db_dsn: String,
        tables_prefix: String,
        genesis_slot: i64,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(30))
            .connect(&db_dsn)
            .await?;

        Ok(Self {
            db_dsn,
            pool,
            tables_prefix,
            genesis_slot,
        })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        debug!("Migrating database tables");
        let create_transfers_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {0}_token_transfers (
                slot BIGINT NOT NULL,
                signature VARCHAR(96) NOT NULL,
                transfer_index INT NOT NULL,
                mint VARCHAR(44) NOT NULL,
                from_account VARCHAR(44),
                to_account VARCHAR(44),
                amount TEXT NOT NULL,
                decimals INT NOT NULL,
                block_time TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                UNIQUE (signature, transfer_index)
            );
        "#,
            self.tables_prefix
        );

        let create_state_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {0}_pipeline_state (
                id INT PRIMARY KEY,
                last_processed_slot BIGINT NOT NULL,
                streaming_start_slot BIGINT,
                last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        "#,
            self.tables_prefix
        );

        sqlx::query(&create_transfers_table)
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_state_table)
            .execute(&self.pool)
            .await?;

        // Seed the singleton checkpoint row on first run only
        sqlx::query(
            format!(
                "INSERT INTO {}_pipeline_state (id, last_processed_slot) VALUES (1, $1) ON CONFLICT (id) DO NOTHING",
                self.tables_prefix
            )
            .as_str(),
        )
        .bind(self.genesis_slot)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_indexes(&self) -> Result<(), sqlx::Error> {
        let indexes = vec![
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{0}_token_transfers_mint ON {0}_token_transfers (mint);",
                self.tables_prefix
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{0}_token_transfers_slot ON {0}_token_transfers (slot);",
                self.tables_prefix
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{0}_token_transfers_block_time ON {0}_token_transfers (block_time);",
                self.tables_prefix
            ),
        ];

        for index in indexes {
            sqlx::query(&index).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn prepare_db(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        self.migrate().await.map_err(PostgresStorageError::from)?;
        self.create_indexes()
            .await
            .map_err(PostgresStorageError::from)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(PostgresStorageError::from)?;
        Ok(())
    }

    async fn write_transfers(
        &self,
        transfers: &[TransferRecord],
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        if transfers.is_empty() {
            return Ok(());
        }
        if transfers.len() > MAX_INSERT_ROWS {
            return Err(PostgresStorageError::BatchTooLarge(transfers.len()).into());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {}_token_transfers (slot, signature, transfer_index, mint, from_account, to_account, amount, decimals, block_time) ",
            self.tables_prefix
        ));
        builder.push_values(transfers, |mut row, t| {
            row.push_bind(t.slot)
                .push_bind(&t.signature)
                .push_bind(t.transfer_index)
                .push_bind(&t.mint)
                .push_bind(&t.from_account)
                .push_bind(&t.to_account)
                .push_bind(&t.amount)
                .push_bind(t.decimals)
                .push_bind(t.block_time);
        });
        builder.push(" ON CONFLICT (signature, transfer_index) DO NOTHING");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(PostgresStorageError::from)?;

        debug!(
            "Inserted {} of {} transfers (conflicts ignored)",
            result.rows_affected(),
            transfers.len()
        );
        Ok(())
    }

    async fn checkpoint(&self) -> Result<Checkpoint, Pin<Box<dyn Error + Send + Sync>>> {
        let checkpoint = sqlx::query_as::<_, Checkpoint>(
            format!(
                "SELECT last_processed_slot, streaming_start_slot, last_updated FROM {}_pipeline_state WHERE id = 1",
                self.tables_prefix
            )
            .as_str(),
        )
        .fetch_one(&self.pool)
        .await
        .map_err(PostgresStorageError::from)?;
        Ok(checkpoint)
    }

    async fn advance_checkpoint(
        &self,
        slot: i64,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        // Forward-only: a lower slot matches no row and is silently dropped
        sqlx::query(
            format!(
                "UPDATE {}_pipeline_state SET last_processed_slot = $1, last_updated = NOW() WHERE id = 1 AND last_processed_slot < $1",
                self.tables_prefix
            )
            .as_str(),
        )
        .bind(slot)
        .execute(&self.pool)
        .await
        .map_err(PostgresStorageError::from)?;
        Ok(())
    }

    async fn seed_streaming_start(
        &self,
        slot: i64,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        sqlx::query(
            format!(
                "UPDATE {}_pipeline_state SET streaming_start_slot = $1 WHERE id = 1 AND streaming_start_slot IS NULL",
                self.tables_prefix
            )
            .as_str(),
        )
        .bind(slot)
        .execute(&self.pool)
        .await
        .map_err(PostgresStorageError::from)?;
        Ok(())
    }
}
