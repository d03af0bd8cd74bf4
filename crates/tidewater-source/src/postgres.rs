//! `PostgreSQL` source.

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::types::{ToSql, Type};
use postgres::Client;
use tidewater_sql::{DbError, Dialect, PgConfig};

use crate::encode;
use crate::query::{with_text_casts, ExtractQuery};
use crate::source::RelationalSource;
use crate::types::Column;

const TABLE_NAMES_QUERY: &str = "SELECT tablename FROM pg_catalog.pg_tables \
     WHERE schemaname NOT IN ('pg_catalog', 'information_schema') \
     AND tablename NOT LIKE '\\_%' \
     ORDER BY tablename";

/// [`RelationalSource`] over a blocking `postgres` client.
pub struct PostgresSource {
    client: Client,
}

impl PostgresSource {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using `config`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DbError`] if the connection cannot be opened.
    pub fn connect(config: &PgConfig) -> Result<Self, DbError> {
        config.connect().map(Self::new)
    }
}

/// A time bound typed to match the parameter the server inferred.
enum TimeBound {
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl TimeBound {
    fn for_param(at: NaiveDateTime, ty: Option<&Type>) -> Self {
        if ty == Some(&Type::TIMESTAMPTZ) {
            Self::Utc(at.and_utc())
        } else {
            Self::Naive(at)
        }
    }

    fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Naive(v) => v,
            Self::Utc(v) => v,
        }
    }
}

impl RelationalSource for PostgresSource {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn table_names(&mut self) -> Result<Vec<String>, DbError> {
        let rows = self
            .client
            .query(TABLE_NAMES_QUERY, &[])
            .map_err(|e| DbError::from_postgres("Table listing failed", &e))?;
        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| DbError::from_postgres("Table listing failed", &e))
            })
            .collect()
    }

    fn fetch(&mut self, query: &ExtractQuery) -> Result<RecordBatch, DbError> {
        let mut statement = self
            .client
            .prepare(&query.sql)
            .map_err(|e| DbError::from_postgres("Prepare failed", &e))?;

        let columns: Vec<Column> = statement
            .columns()
            .iter()
            .map(|c| Column::new(c.name(), c.type_().name()))
            .collect();

        if let Some(cast_sql) = with_text_casts(&query.sql, &columns) {
            tracing::debug!(sql = %cast_sql, "Selecting text casts for non-native columns");
            statement = self
                .client
                .prepare(&cast_sql)
                .map_err(|e| DbError::from_postgres("Prepare failed", &e))?;
        }

        let bounds: Vec<TimeBound> = query
            .binds
            .iter()
            .enumerate()
            .map(|(i, at)| TimeBound::for_param(*at, statement.params().get(i)))
            .collect();
        let params: Vec<&(dyn ToSql + Sync)> = bounds.iter().map(TimeBound::as_tosql).collect();

        let rows = self
            .client
            .query(&statement, &params)
            .map_err(|e| DbError::from_postgres("Query failed", &e))?;

        encode::rows_to_record_batch(&rows, &columns)
    }
}
