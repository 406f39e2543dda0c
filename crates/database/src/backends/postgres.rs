use crate::backend::{Backend, BackendTransaction};
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::DbError;
use crate::pool::{ConnectionPool, PoolSettings, PoolStatus};
use crate::registry::BackendKind;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use core_types::{Row, Value};
use rust_decimal::Decimal;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnectOptions, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Column, Encode, Postgres, Row as _, Type, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct PostgresBackend {
    pool: ConnectionPool<Postgres>,
    dialect: Arc<dyn Dialect>,
}

impl PostgresBackend {
    pub(crate) async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, DbError> {
        let options = PgConnectOptions::from_str(url)
            .map_err(DbError::Connection)?
            .application_name("dbal");

        debug!(capacity = settings.capacity, "Opening PostgreSQL pool");
        let pool =
            ConnectionPool::open(ConnectionPool::<Postgres>::options(settings), options, *settings)
                .await?;
        Ok(Self {
            pool,
            dialect: Arc::new(PostgresDialect),
        })
    }
}

/// Splits a schema script into its individual statements.
fn split_statements(script: &str) -> impl Iterator<Item = &str> {
    script.split(';').map(str::trim).filter(|s| !s.is_empty())
}

#[async_trait]
impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    async fn begin(&self) -> Result<Box<dyn BackendTransaction>, DbError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn execute_ddl(&self, script: &str) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for statement in split_statements(script) {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|source| DbError::Ddl {
                    statement: statement.to_string(),
                    source,
                })?;
        }
        tx.commit().await.map_err(DbError::Commit)
    }

    fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl BackendTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = query.fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        // One statement per row: a multi-row VALUES list fails outright when the
        // same key appears twice in it.
        let mut affected = 0;
        for params in rows {
            let query = params.iter().fold(sqlx::query(sql), bind_value);
            affected += query.execute(&mut *self.tx).await?.rows_affected();
        }
        Ok(affected)
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await.map_err(DbError::Commit)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// A NULL parameter sent with type OID 0, leaving Postgres to infer the type
/// from the statement. A typed NULL (say, TEXT) is rejected when it lands in a
/// NUMERIC, DATE or TIMESTAMP column.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Decimal(d) => query.bind(*d),
        Value::Date(d) => query.bind(*d),
        Value::Timestamp(ts) => query.bind(*ts),
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    let mut out = Row::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match column.type_info().name() {
                "BOOL" => Value::Bool(row.try_get::<bool, _>(i)?),
                "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(i)?)),
                "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(i)?)),
                "INT8" => Value::Int(row.try_get::<i64, _>(i)?),
                "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(i)?)),
                "FLOAT8" => Value::Float(row.try_get::<f64, _>(i)?),
                "NUMERIC" => Value::Decimal(row.try_get::<Decimal, _>(i)?),
                "DATE" => Value::Date(row.try_get::<NaiveDate, _>(i)?),
                "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(i)?),
                "TIMESTAMPTZ" => {
                    Value::Timestamp(row.try_get::<DateTime<Utc>, _>(i)?.naive_utc())
                }
                _ => Value::Text(row.try_get::<String, _>(i)?),
            }
        };
        out.push(column.name(), value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::split_statements;

    #[test]
    fn splits_scripts_on_semicolons() {
        let script = "CREATE TABLE a (id INT);\n\nCREATE INDEX i ON a (id);\n";
        let statements: Vec<_> = split_statements(script).collect();
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE INDEX i ON a (id)"]
        );
    }
}
