//! `PostgreSQL` target.
//!
//! The statement is prepared once per object. Each column gets a binding
//! plan from its Arrow type and the parameter type the server inferred;
//! columns without a native conversion are bound as text and cast on the
//! server (`$n::text::numeric`).

use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{ToSql, Type};
use postgres::{Client, GenericClient, Statement};
use tidewater_sql::{DbError, Dialect, PgConfig};

use crate::statement::UpsertStatement;
use crate::target::{CommitMode, RelationalTarget};
use crate::typed_col::{cell_value, downcast_columns, CellValue};

/// [`RelationalTarget`] over a blocking `postgres` client.
pub struct PostgresTarget {
    client: Client,
}

impl PostgresTarget {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns a classified [`DbError`] if the connection cannot be opened.
    pub fn connect(config: &PgConfig) -> Result<Self, DbError> {
        config.connect().map(Self::new)
    }
}

impl RelationalTarget for PostgresTarget {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn apply(
        &mut self,
        statement: &UpsertStatement,
        batches: &[RecordBatch],
        mode: CommitMode,
    ) -> Result<u64, DbError> {
        let Some(first) = batches.first() else {
            return Ok(0);
        };
        let types: Vec<DataType> = first
            .schema()
            .fields()
            .iter()
            .map(|f| f.data_type().clone())
            .collect();

        match mode {
            CommitMode::PerBatch => {
                let mut tx = self
                    .client
                    .transaction()
                    .map_err(|e| DbError::from_postgres("BEGIN failed", &e))?;
                // Dropping `tx` on error rolls back.
                let rows = execute_rows(&mut tx, statement, &types, batches)?;
                tx.commit()
                    .map_err(|e| DbError::from_postgres("COMMIT failed", &e))?;
                Ok(rows)
            }
            CommitMode::PerRow => execute_rows(&mut self.client, statement, &types, batches),
        }
    }
}

fn execute_rows<C: GenericClient>(
    client: &mut C,
    statement: &UpsertStatement,
    types: &[DataType],
    batches: &[RecordBatch],
) -> Result<u64, DbError> {
    let target = statement.target();
    if types.len() != statement.columns().len() {
        return Err(DbError::schema(format!(
            "batch has {} columns, statement for {target} binds {}",
            types.len(),
            statement.columns().len()
        )));
    }
    let (prepared, plans) = prepare(client, statement, types)?;

    let mut total: u64 = 0;
    for batch in batches {
        let cols = downcast_columns(batch)?;
        for row in 0..batch.num_rows() {
            let params = cols
                .iter()
                .zip(&plans)
                .enumerate()
                .map(|(i, (col, plan))| {
                    bind(plan, cell_value(col, row)).map_err(|msg| {
                        DbError::data(format!(
                            "{target}.{}: {msg}",
                            statement.columns()[i].name
                        ))
                    })
                })
                .collect::<Result<Vec<PgParam>, DbError>>()?;
            let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(PgParam::as_tosql).collect();
            client.execute(&prepared, &refs).map_err(|e| {
                DbError::from_postgres(&format!("Upsert into {target} failed at row {total}"), &e)
            })?;
            total += 1;
        }
    }
    Ok(total)
}

/// Prepare `statement`, re-preparing with text casts for columns the server
/// typed in a way no native binding covers.
fn prepare<C: GenericClient>(
    client: &mut C,
    statement: &UpsertStatement,
    types: &[DataType],
) -> Result<(Statement, Vec<Plan>), DbError> {
    let prepare_failed = |e: postgres::Error| {
        DbError::from_postgres(&format!("Prepare for {} failed", statement.target()), &e)
    };

    let prepared = client.prepare(statement.sql()).map_err(prepare_failed)?;
    let plans: Vec<Plan> = types
        .iter()
        .zip(prepared.params())
        .map(|(dt, ty)| plan_for(dt, ty))
        .collect();

    if !plans.contains(&Plan::Bridge) {
        return Ok((prepared, plans));
    }

    let casts: Vec<Option<String>> = plans
        .iter()
        .zip(prepared.params())
        .map(|(plan, ty)| (*plan == Plan::Bridge).then(|| ty.name().to_string()))
        .collect();
    let sql = statement.with_text_casts(&casts);
    tracing::debug!(target_table = %statement.target(), sql = %sql, "Binding non-native columns as text");
    let prepared = client.prepare(&sql).map_err(prepare_failed)?;
    let plans = plans
        .into_iter()
        .map(|p| if p == Plan::Bridge { Plan::Text } else { p })
        .collect();
    Ok((prepared, plans))
}

/// How a column's cells are converted for its parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Text,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Bytes,
    /// No native binding; bind text and cast server-side.
    Bridge,
}

fn plan_for(dt: &DataType, ty: &Type) -> Plan {
    let integer = matches!(dt, DataType::Int16 | DataType::Int32 | DataType::Int64);
    let numeric = integer || matches!(dt, DataType::Float32 | DataType::Float64);
    let null = dt == &DataType::Null;

    match *ty {
        Type::INT2 if integer || null => Plan::I16,
        Type::INT4 if integer || null => Plan::I32,
        Type::INT8 if integer || null => Plan::I64,
        Type::FLOAT4 if numeric || null => Plan::F32,
        Type::FLOAT8 if numeric || null => Plan::F64,
        Type::BOOL if dt == &DataType::Boolean || null => Plan::Bool,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => Plan::Text,
        Type::TIMESTAMP if matches!(dt, DataType::Timestamp(TimeUnit::Microsecond, _)) || null => {
            Plan::Timestamp
        }
        Type::TIMESTAMPTZ
            if matches!(dt, DataType::Timestamp(TimeUnit::Microsecond, _)) || null =>
        {
            Plan::TimestampTz
        }
        Type::DATE if dt == &DataType::Date32 || null => Plan::Date,
        Type::TIME if dt == &DataType::Time64(TimeUnit::Microsecond) || null => Plan::Time,
        Type::BYTEA if dt == &DataType::Binary || null => Plan::Bytes,
        _ => Plan::Bridge,
    }
}

/// An owned, correctly typed bind parameter.
#[derive(Debug, PartialEq)]
enum PgParam {
    I16(Option<i16>),
    I32(Option<i32>),
    I64(Option<i64>),
    F32(Option<f32>),
    F64(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
    Timestamp(Option<NaiveDateTime>),
    TimestampTz(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Bytes(Option<Vec<u8>>),
}

impl PgParam {
    fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::I16(v) => v,
            Self::I32(v) => v,
            Self::I64(v) => v,
            Self::F32(v) => v,
            Self::F64(v) => v,
            Self::Bool(v) => v,
            Self::Text(v) => v,
            Self::Timestamp(v) => v,
            Self::TimestampTz(v) => v,
            Self::Date(v) => v,
            Self::Time(v) => v,
            Self::Bytes(v) => v,
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn bind(plan: &Plan, cell: CellValue<'_>) -> Result<PgParam, String> {
    let out_of_range = |v: i64| format!("value {v} out of range for {plan:?}");
    let as_f64 = |cell: &CellValue<'_>| match cell {
        CellValue::Float32(v) => v.map(f64::from),
        CellValue::Float64(v) => *v,
        other => other.as_i64().map(|i| i as f64),
    };

    Ok(match plan {
        Plan::I16 => PgParam::I16(
            cell.as_i64()
                .map(|v| i16::try_from(v).map_err(|_| out_of_range(v)))
                .transpose()?,
        ),
        Plan::I32 => PgParam::I32(
            cell.as_i64()
                .map(|v| i32::try_from(v).map_err(|_| out_of_range(v)))
                .transpose()?,
        ),
        Plan::I64 => PgParam::I64(cell.as_i64()),
        Plan::F32 => PgParam::F32(as_f64(&cell).map(|v| v as f32)),
        Plan::F64 => PgParam::F64(as_f64(&cell)),
        Plan::Bool => PgParam::Bool(match cell {
            CellValue::Boolean(v) => v,
            _ => None,
        }),
        Plan::Text | Plan::Bridge => PgParam::Text(cell.to_text()),
        Plan::Timestamp => PgParam::Timestamp(match cell {
            CellValue::Timestamp(v) => v,
            _ => None,
        }),
        Plan::TimestampTz => PgParam::TimestampTz(match cell {
            CellValue::Timestamp(v) => v.map(|ts| ts.and_utc()),
            _ => None,
        }),
        Plan::Date => PgParam::Date(match cell {
            CellValue::Date(v) => v,
            _ => None,
        }),
        Plan::Time => PgParam::Time(match cell {
            CellValue::Time(v) => v,
            _ => None,
        }),
        Plan::Bytes => PgParam::Bytes(match cell {
            CellValue::Bytes(v) => v.map(<[u8]>::to_vec),
            _ => None,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DataType::Int64, Type::INT4, Plan::I32)]
    #[case(DataType::Int32, Type::INT8, Plan::I64)]
    #[case(DataType::Int64, Type::FLOAT8, Plan::F64)]
    #[case(DataType::Float64, Type::NUMERIC, Plan::Bridge)]
    #[case(DataType::Utf8, Type::NUMERIC, Plan::Bridge)]
    #[case(DataType::Utf8, Type::DATE, Plan::Bridge)]
    #[case(DataType::Date32, Type::DATE, Plan::Date)]
    #[case(DataType::Time64(TimeUnit::Microsecond), Type::TIME, Plan::Time)]
    #[case(DataType::Timestamp(TimeUnit::Microsecond, None), Type::TIMESTAMPTZ, Plan::TimestampTz)]
    #[case(DataType::Int64, Type::VARCHAR, Plan::Text)]
    #[case(DataType::Null, Type::INT4, Plan::I32)]
    #[case(DataType::Boolean, Type::INT4, Plan::Bridge)]
    fn plans_follow_arrow_and_server_types(
        #[case] dt: DataType,
        #[case] ty: Type,
        #[case] expected: Plan,
    ) {
        assert_eq!(plan_for(&dt, &ty), expected);
    }

    #[test]
    fn integers_narrow_with_range_check() {
        assert_eq!(bind(&Plan::I32, CellValue::Int64(Some(7))).unwrap(), PgParam::I32(Some(7)));
        assert_eq!(bind(&Plan::I32, CellValue::Int64(None)).unwrap(), PgParam::I32(None));
        assert_eq!(bind(&Plan::I16, CellValue::Null).unwrap(), PgParam::I16(None));
        let err = bind(&Plan::I16, CellValue::Int64(Some(70_000))).unwrap_err();
        assert!(err.contains("70000"), "{err}");
    }

    #[test]
    fn bridged_values_bind_as_text() {
        assert_eq!(
            bind(&Plan::Bridge, CellValue::Float64(Some(2.5))).unwrap(),
            PgParam::Text(Some("2.5".into()))
        );
        assert_eq!(
            bind(&Plan::Text, CellValue::Text(Some("GBP"))).unwrap(),
            PgParam::Text(Some("GBP".into()))
        );
    }

    #[test]
    fn naive_timestamps_bind_to_timestamptz_as_utc() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 15)
            .unwrap()
            .and_hms_opt(19, 1, 53)
            .unwrap();
        assert_eq!(
            bind(&Plan::TimestampTz, CellValue::Timestamp(Some(ts))).unwrap(),
            PgParam::TimestampTz(Some(ts.and_utc()))
        );
    }

    /// Needs a live server: `TEST_POSTGRES_URL=postgres://... cargo test -- --ignored`.
    #[test]
    #[ignore = "requires TEST_POSTGRES_URL"]
    fn upserts_against_live_postgres() {
        use std::sync::Arc;

        use arrow::array::{ArrayRef, Int64Array, StringArray};
        use arrow::datatypes::{Field, Schema};

        use crate::statement::ColumnSpec;

        let url = std::env::var("TEST_POSTGRES_URL").unwrap();
        let mut client = Client::connect(&url, postgres::NoTls).unwrap();
        client
            .batch_execute(
                "DROP TABLE IF EXISTS tw_dim_currency;
                 CREATE TABLE tw_dim_currency (currency_record_id INT PRIMARY KEY,
                     currency_code VARCHAR(3), rate NUMERIC(10,2));",
            )
            .unwrap();
        let mut target = PostgresTarget::new(client);

        let schema = Arc::new(Schema::new(vec![
            Field::new("currency_record_id", DataType::Int64, false),
            Field::new("currency_code", DataType::Utf8, true),
            Field::new("rate", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 1])) as ArrayRef,
                Arc::new(StringArray::from(vec!["GBP", "EUR"])),
                Arc::new(StringArray::from(vec!["1.00", "1.17"])),
            ],
        )
        .unwrap();
        let stmt = UpsertStatement::build(
            "tw_dim_currency",
            "currency_record_id",
            vec![
                ColumnSpec::verbatim("currency_record_id"),
                ColumnSpec::verbatim("currency_code"),
                ColumnSpec::verbatim("rate"),
            ],
            Dialect::Postgres,
        )
        .unwrap();

        let rows = target.apply(&stmt, &[batch], CommitMode::PerBatch).unwrap();
        assert_eq!(rows, 2);
        let row = target
            .client
            .query_one("SELECT currency_code, rate::text FROM tw_dim_currency", &[])
            .unwrap();
        assert_eq!(row.get::<_, String>(0), "EUR");
        assert_eq!(row.get::<_, String>(1), "1.17");
    }
}
