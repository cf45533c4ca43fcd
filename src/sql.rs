use crate::backend::RelationalStore;
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use async_trait::async_trait;
use sea_query::{SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::FromRow;
use std::marker::PhantomData;
use tracing::debug;

/// SQLite-backed relational store for one table
///
/// Clone is cheap; the pool is reference counted internally.
pub struct SqliteStore<R> {
    pool: SqlitePool,
    table: String,
    _entity: PhantomData<fn() -> R>,
}

impl<R> Clone for SqliteStore<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
            _entity: PhantomData,
        }
    }
}

impl<R> SqliteStore<R> {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl<R> RelationalStore<R> for SqliteStore<R>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + 'static,
{
    fn table(&self) -> &str {
        &self.table
    }

    async fn fetch(&self, ctx: &QueryContext, statement: SelectStatement) -> QueryResult<Vec<R>> {
        let sql = statement.to_string(SqliteQueryBuilder);
        debug!("Query {} fetch: {}", ctx.id(), sql);

        let rows = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(QueryError::Cancelled),
            rows = sqlx::query(&sql).fetch_all(&self.pool) => rows?,
        };

        rows.iter()
            .map(|row| R::from_row(row).map_err(QueryError::from))
            .collect()
    }

    async fn count(&self, ctx: &QueryContext, statement: SelectStatement) -> QueryResult<u64> {
        let sql = statement.to_string(SqliteQueryBuilder);
        debug!("Query {} count: {}", ctx.id(), sql);

        let total = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(QueryError::Cancelled),
            total = sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool) => total?,
        };

        u64::try_from(total)
            .map_err(|_| QueryError::Backend(format!("Negative count returned: {total}")))
    }
}
