//! Postgres-backed product store implementation.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | `(product_id, condition)` already taken |
//! | Database (check constraint violation) | `23514` | `Rejected(Validation)` | Negative quantity/levels slipped past the domain |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Backend` | Connection failures, pool shutdown |
//!
//! ## Atomicity
//!
//! `modify` locks the target row with `SELECT ... FOR UPDATE` inside a
//! transaction, applies the mutation in process and writes the row back before
//! committing. Concurrent adjustments of the same record serialize on the row lock.

use std::sync::Arc;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stockroom_core::{DomainError, ProductId, RecordId};
use stockroom_inventory::{AdjustmentOutcome, CompositeKey, Condition, NewProduct, ProductRecord};

use super::r#trait::{Mutation, ProductFilter, ProductStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_products.sql");

/// Postgres-backed product store.
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
/// Uniqueness of `(product_id, condition)` is enforced by a table constraint.
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Ensure the `products` table exists.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(
        skip(self, product),
        fields(
            product_id = %product.product_id,
            condition = %product.condition,
            record_id = tracing::field::Empty
        ),
        err
    )]
    async fn create(&self, product: NewProduct) -> Result<ProductRecord, StoreError> {
        let key = product.key();
        let row = sqlx::query(
            r#"
            INSERT INTO products (
                product_id,
                product_name,
                quantity,
                condition,
                restock_level,
                reorder_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(product.product_id.get())
        .bind(&product.product_name)
        .bind(product.quantity)
        .bind(product.condition.as_str())
        .bind(product.restock_level)
        .bind(product.reorder_amount)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(key)
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::Backend(format!("failed to read id: {e}")))?;
        Span::current().record("record_id", id);
        Ok(product.into_record(RecordId::new(id)))
    }

    #[instrument(skip(self, record), fields(record_id = %record.id()), err)]
    async fn save(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let result = write_record(&*self.pool, record).await?;
        if result == 0 {
            return Err(StoreError::NotFound(format!("record {}", record.id())));
        }
        Ok(())
    }

    #[instrument(skip(self, record), fields(record_id = %record.id()), err)]
    async fn delete(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(record.id().get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("record {}", record.id())));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn query(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                product_id,
                product_name,
                quantity,
                condition,
                restock_level,
                reorder_amount
            FROM products
            WHERE ($1::bigint IS NULL OR product_id = $1)
                AND ($2::text IS NULL OR product_name = $2)
                AND ($3::text IS NULL OR condition = $3)
            ORDER BY id ASC
            "#,
        )
        .bind(filter.product_id.map(ProductId::get))
        .bind(filter.product_name.as_deref())
        .bind(filter.condition.map(Condition::as_str))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_products", e))?;

        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_matching(&self, filter: &ProductFilter) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE ($1::bigint IS NULL OR product_id = $1)
                AND ($2::text IS NULL OR product_name = $2)
                AND ($3::text IS NULL OR condition = $3)
            "#,
        )
        .bind(filter.product_id.map(ProductId::get))
        .bind(filter.product_name.as_deref())
        .bind(filter.condition.map(Condition::as_str))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_products", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(
        skip(self, key, mutation),
        fields(product_id = %key.product_id, condition = %key.condition),
        err
    )]
    async fn modify(
        &self,
        key: CompositeKey,
        mutation: Mutation,
    ) -> Result<(ProductRecord, AdjustmentOutcome), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(mut record) = lock_record(&mut tx, key).await? else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound(key.to_string()));
        };

        let outcome = match mutation(&mut record) {
            Ok(outcome) => outcome,
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Rejected(e));
            }
        };

        write_record(&mut *tx, &record).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok((record, outcome))
    }
}

async fn lock_record(
    tx: &mut Transaction<'_, Postgres>,
    key: CompositeKey,
) -> Result<Option<ProductRecord>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            id,
            product_id,
            product_name,
            quantity,
            condition,
            restock_level,
            reorder_amount
        FROM products
        WHERE product_id = $1 AND condition = $2
        FOR UPDATE
        "#,
    )
    .bind(key.product_id.get())
    .bind(key.condition.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_product", e))?;

    row.as_ref().map(record_from_row).transpose()
}

/// Write every mutable column of `record`; returns the number of rows touched.
async fn write_record<'e, E>(executor: E, record: &ProductRecord) -> Result<u64, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE products
        SET
            product_name = $2,
            quantity = $3,
            condition = $4,
            restock_level = $5,
            reorder_amount = $6,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(record.id().get())
    .bind(record.product_name())
    .bind(record.quantity())
    .bind(record.condition().as_str())
    .bind(record.restock_level())
    .bind(record.reorder_amount())
    .execute(executor)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Duplicate(record.key())
        } else {
            map_sqlx_error("update_product", e)
        }
    })?;

    Ok(result.rows_affected())
}

fn record_from_row(row: &PgRow) -> Result<ProductRecord, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to deserialize product row: {e}"));

    let condition: String = row.try_get("condition").map_err(read)?;
    let condition = condition
        .parse::<Condition>()
        .map_err(|e| StoreError::Backend(format!("stored condition is invalid: {e}")))?;

    let product = NewProduct {
        product_id: ProductId::new(row.try_get("product_id").map_err(read)?),
        product_name: row.try_get("product_name").map_err(read)?,
        quantity: row.try_get("quantity").map_err(read)?,
        condition,
        restock_level: row.try_get("restock_level").map_err(read)?,
        reorder_amount: row.try_get("reorder_amount").map_err(read)?,
    };
    let id: i64 = row.try_get("id").map_err(read)?;
    Ok(product.into_record(RecordId::new(id)))
}

/// Map SQLx errors to StoreError with context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23514") => StoreError::Rejected(DomainError::validation(msg)),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[cfg(test)]
mod tests {
    //! Runs only when `TEST_DATABASE_URL` points at a disposable database.

    use super::*;
    use stockroom_inventory::QuantityAdjustment;

    async fn store() -> Option<PostgresProductStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let store = PostgresProductStore::connect(&url, 2).await.ok()?;
        store.migrate().await.ok()?;
        Some(store)
    }

    #[tokio::test]
    async fn create_modify_delete_round_trip() {
        let Some(store) = store().await else {
            return;
        };

        // Random-ish product id so reruns don't collide.
        let product_id = ProductId::new(9_000_000 + i64::from(std::process::id()));
        let filter = ProductFilter::all().with_product_id(product_id);
        store.delete_matching(&filter).await.unwrap();

        let created = store
            .create(NewProduct {
                product_id,
                product_name: "Green Apple".to_string(),
                quantity: 5,
                condition: Condition::New,
                restock_level: 10,
                reorder_amount: 50,
            })
            .await
            .unwrap();

        let dup = store
            .create(NewProduct {
                product_id,
                product_name: "Green Apple".to_string(),
                quantity: 1,
                condition: Condition::New,
                restock_level: 0,
                reorder_amount: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(dup, StoreError::Duplicate(_)));

        let adj = QuantityAdjustment::decrease(0).unwrap();
        let (updated, outcome) = store
            .modify(created.key(), Box::new(move |r| r.apply_adjustment(adj)))
            .await
            .unwrap();
        assert!(outcome.reordered);
        assert_eq!(updated.quantity(), 55);

        let rows = store.query(&filter).await.unwrap();
        assert_eq!(rows, vec![updated]);

        assert_eq!(store.delete_matching(&filter).await.unwrap(), 1);
    }
}
