//! Upsert statement construction.
//!
//! The statement is built from the columns actually present in the staged
//! object, so the loader never needs a per-table column list:
//!
//! ```text
//! INSERT INTO target (c1, c2, ...) VALUES ($1, $2, ...)
//! ON CONFLICT (pk) DO UPDATE SET c2 = EXCLUDED.c2, ...
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int64Array};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use pg_escape::quote_identifier;
use tidewater_sql::identifier::validate_identifier;
use tidewater_sql::{DbError, Dialect};

/// Foreign keys that arrive as `-1` when absent upstream.
const SENTINEL_COLUMNS: &[(&str, &str)] = &[
    ("dim_transaction", "sales_order_id"),
    ("dim_transaction", "purchase_order_id"),
];

/// How a column's value is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPolicy {
    /// Bind the value as-is.
    Verbatim,
    /// Store `NULL` when the value equals the sentinel.
    NullIfSentinel(i64),
}

/// Policy for `column` when loading into `target`.
#[must_use]
pub fn policy_for(target: &str, column: &str) -> ColumnPolicy {
    if SENTINEL_COLUMNS.contains(&(target, column)) {
        ColumnPolicy::NullIfSentinel(-1)
    } else {
        ColumnPolicy::Verbatim
    }
}

/// A column of the upsert and its binding policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub policy: ColumnPolicy,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, policy: ColumnPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    #[must_use]
    pub fn verbatim(name: impl Into<String>) -> Self {
        Self::new(name, ColumnPolicy::Verbatim)
    }
}

/// A validated `INSERT ... ON CONFLICT` statement for one target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertStatement {
    target: String,
    primary_key: String,
    columns: Vec<ColumnSpec>,
    dialect: Dialect,
    sql: String,
}

impl UpsertStatement {
    /// Build the statement for `columns`, bound in order.
    ///
    /// # Errors
    ///
    /// Returns a schema-category [`DbError`] if an identifier is invalid, a
    /// column repeats, or the primary key is not among `columns`.
    pub fn build(
        target: &str,
        primary_key: &str,
        columns: Vec<ColumnSpec>,
        dialect: Dialect,
    ) -> Result<Self, DbError> {
        validate_identifier(target)?;
        validate_identifier(primary_key)?;
        if columns.is_empty() {
            return Err(DbError::schema(format!("no columns to load into {target}")));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            validate_identifier(&col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(DbError::schema(format!(
                    "column '{}' appears more than once",
                    col.name
                )));
            }
        }
        if !seen.contains(primary_key) {
            return Err(DbError::schema(format!(
                "primary key '{primary_key}' missing from columns loaded into {target}"
            )));
        }

        let sql = render(target, primary_key, &columns, dialect, &[]);
        Ok(Self {
            target: target.to_string(),
            primary_key: primary_key.to_string(),
            columns,
            dialect,
            sql,
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The statement with selected placeholders read as text and cast to a
    /// server type (`$n::text::numeric`). `casts[i]` applies to column `i`.
    #[must_use]
    pub fn with_text_casts(&self, casts: &[Option<String>]) -> String {
        render(&self.target, &self.primary_key, &self.columns, self.dialect, casts)
    }
}

fn render(
    target: &str,
    primary_key: &str,
    columns: &[ColumnSpec],
    dialect: Dialect,
    casts: &[Option<String>],
) -> String {
    let col_list = columns
        .iter()
        .map(|c| quote_identifier(&c.name).into_owned())
        .collect::<Vec<_>>()
        .join(", ");

    let mut values = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            values.push_str(", ");
        }
        let mut placeholder = dialect.placeholder(i + 1);
        if let Some(Some(ty)) = casts.get(i) {
            let _ = write!(placeholder, "::text::{ty}");
        }
        match col.policy {
            ColumnPolicy::Verbatim => values.push_str(&placeholder),
            ColumnPolicy::NullIfSentinel(sentinel) => {
                let _ = write!(values, "NULLIF({placeholder}, {sentinel})");
            }
        }
    }

    let updates = columns
        .iter()
        .filter(|c| c.name != primary_key)
        .map(|c| {
            let ident = quote_identifier(&c.name);
            format!("{ident} = EXCLUDED.{ident}")
        })
        .collect::<Vec<_>>();

    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO {} ({col_list}) VALUES ({values}) ON CONFLICT ({}) {conflict}",
        quote_identifier(target),
        quote_identifier(primary_key),
    )
}

/// Cast legacy `Float64` sentinel columns to nullable `Int64`.
///
/// Only columns with a [`ColumnPolicy::NullIfSentinel`] policy are touched;
/// `NaN` becomes `NULL`.
///
/// # Errors
///
/// Returns a data-category [`DbError`] if a value has a fractional part or
/// is out of `i64` range.
pub fn normalize_sentinel_columns(
    batch: &RecordBatch,
    columns: &[ColumnSpec],
) -> Result<RecordBatch, DbError> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    let mut changed = false;

    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let sentinel = columns
            .iter()
            .any(|c| c.name == *field.name() && matches!(c.policy, ColumnPolicy::NullIfSentinel(_)));
        if sentinel && field.data_type() == &DataType::Float64 {
            arrays.push(Arc::new(float_to_int(field.name(), array.as_ref())?));
            fields.push(Field::new(field.name(), DataType::Int64, true));
            changed = true;
        } else {
            arrays.push(array.clone());
            fields.push(field.as_ref().clone());
        }
    }

    if !changed {
        return Ok(batch.clone());
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| DbError::data(format!("failed to rebuild batch: {e}")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(name: &str, array: &dyn Array) -> Result<Int64Array, DbError> {
    array
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| match v {
            None => Ok(None),
            Some(f) if f.is_nan() => Ok(None),
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Ok(Some(f as i64))
            }
            Some(f) => Err(DbError::data(format!(
                "column '{name}' holds {f}, which is not an integer id"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use arrow::datatypes::Int64Type;
    use proptest::prelude::*;

    fn cols(names: &[&str]) -> Vec<ColumnSpec> {
        names.iter().map(|n| ColumnSpec::verbatim(*n)).collect()
    }

    #[test]
    fn builds_upsert_over_every_column() {
        let stmt = UpsertStatement::build(
            "dim_location",
            "location_record_id",
            cols(&["location_record_id", "city", "country"]),
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO dim_location (location_record_id, city, country) VALUES ($1, $2, $3) \
             ON CONFLICT (location_record_id) DO UPDATE SET city = EXCLUDED.city, country = EXCLUDED.country"
        );
    }

    #[test]
    fn key_only_columns_do_nothing_on_conflict() {
        let stmt =
            UpsertStatement::build("dim_design", "design_record_id", cols(&["design_record_id"]), Dialect::Sqlite)
                .unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO dim_design (design_record_id) VALUES (?1) ON CONFLICT (design_record_id) DO NOTHING"
        );
    }

    #[test]
    fn sentinel_columns_wrap_placeholder_in_nullif() {
        let columns = ["transaction_record_id", "sales_order_id", "purchase_order_id"]
            .iter()
            .map(|c| ColumnSpec::new(*c, policy_for("dim_transaction", c)))
            .collect();
        let stmt = UpsertStatement::build("dim_transaction", "transaction_record_id", columns, Dialect::Postgres)
            .unwrap();
        assert!(
            stmt.sql().contains("VALUES ($1, NULLIF($2, -1), NULLIF($3, -1))"),
            "{}",
            stmt.sql()
        );
    }

    #[test]
    fn policy_only_applies_to_dim_transaction() {
        assert_eq!(policy_for("dim_transaction", "sales_order_id"), ColumnPolicy::NullIfSentinel(-1));
        assert_eq!(policy_for("fact_sales_order", "sales_order_id"), ColumnPolicy::Verbatim);
        assert_eq!(policy_for("dim_transaction", "transaction_type"), ColumnPolicy::Verbatim);
    }

    #[test]
    fn text_casts_apply_per_placeholder() {
        let columns = vec![
            ColumnSpec::verbatim("sales_record_id"),
            ColumnSpec::verbatim("unit_price"),
            ColumnSpec::new("purchase_order_id", ColumnPolicy::NullIfSentinel(-1)),
        ];
        let stmt = UpsertStatement::build("fact_sales_order", "sales_record_id", columns, Dialect::Postgres)
            .unwrap();
        let sql = stmt.with_text_casts(&[None, Some("numeric".into()), Some("int4".into())]);
        assert!(
            sql.contains("VALUES ($1, $2::text::numeric, NULLIF($3::text::int4, -1))"),
            "{sql}"
        );
    }

    #[test]
    fn reserved_words_are_quoted() {
        let stmt = UpsertStatement::build("dim_order", "id", cols(&["id", "order"]), Dialect::Postgres).unwrap();
        assert!(stmt.sql().contains("(id, \"order\")"), "{}", stmt.sql());
        assert!(stmt.sql().contains("\"order\" = EXCLUDED.\"order\""));
    }

    #[test]
    fn rejects_missing_primary_key() {
        let err = UpsertStatement::build("dim_staff", "staff_record_id", cols(&["first_name"]), Dialect::Postgres)
            .unwrap_err();
        assert!(err.to_string().contains("staff_record_id"));
    }

    #[test]
    fn rejects_duplicates_and_bad_identifiers() {
        assert!(UpsertStatement::build("t", "id", cols(&["id", "id"]), Dialect::Postgres).is_err());
        assert!(UpsertStatement::build("t", "id", cols(&["id", "a;b"]), Dialect::Postgres).is_err());
        assert!(UpsertStatement::build("t x", "id", cols(&["id"]), Dialect::Postgres).is_err());
        assert!(UpsertStatement::build("t", "id", vec![], Dialect::Postgres).is_err());
    }

    #[test]
    fn legacy_float_sentinels_become_nullable_ints() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("transaction_record_id", DataType::Int64, false),
            Field::new("sales_order_id", DataType::Float64, true),
            Field::new("amount", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Float64Array::from(vec![Some(7.0), Some(f64::NAN), None])),
                Arc::new(Float64Array::from(vec![1.5, 2.5, f64::NAN])),
            ],
        )
        .unwrap();
        let columns = vec![
            ColumnSpec::verbatim("transaction_record_id"),
            ColumnSpec::new("sales_order_id", ColumnPolicy::NullIfSentinel(-1)),
            ColumnSpec::verbatim("amount"),
        ];

        let out = normalize_sentinel_columns(&batch, &columns).unwrap();

        assert_eq!(out.schema().field(1).data_type(), &DataType::Int64);
        let ids = out.column(1).as_primitive::<Int64Type>();
        assert_eq!(ids.value(0), 7);
        assert!(ids.is_null(1));
        assert!(ids.is_null(2));
        // Verbatim float columns keep their type and NaN.
        assert_eq!(out.schema().field(2).data_type(), &DataType::Float64);
        assert!(out.column(2).as_primitive::<Float64Type>().value(2).is_nan());
    }

    #[test]
    fn fractional_sentinel_value_is_rejected() {
        let schema = Arc::new(Schema::new(vec![Field::new("sales_order_id", DataType::Float64, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(vec![1.5]))]).unwrap();
        let columns = vec![ColumnSpec::new("sales_order_id", ColumnPolicy::NullIfSentinel(-1))];
        assert!(normalize_sentinel_columns(&batch, &columns).is_err());
    }

    proptest! {
        #[test]
        fn every_column_is_inserted_and_non_keys_updated(
            extra in proptest::collection::btree_set("[a-z][a-z0-9_]{0,10}", 0..8)
        ) {
            let extra: Vec<String> = extra.into_iter().filter(|c| c != "pk").collect();
            let mut columns = vec![ColumnSpec::verbatim("pk")];
            columns.extend(extra.iter().map(ColumnSpec::verbatim));
            let stmt = UpsertStatement::build("t", "pk", columns, Dialect::Postgres).unwrap();
            let sql = stmt.sql();

            for i in 1..=extra.len() + 1 {
                let placeholder = format!("${i}");
                prop_assert!(sql.contains(&placeholder));
            }
            let updates = sql.matches("= EXCLUDED.").count();
            prop_assert_eq!(updates, extra.len());
            prop_assert_eq!(sql.ends_with("DO NOTHING"), extra.is_empty());
        }
    }
}
