//! `PostgreSQL` -> Arrow type registry.
//!
//! Single source of truth for type mapping and text-cast decisions. Types
//! without a native `FromSql` conversion are selected as `::text`.

use arrow::datatypes::{DataType, TimeUnit};

/// Resolved type information for a `PostgreSQL` column type.
pub struct TypeInfo {
    /// Target Arrow data type.
    pub data_type: DataType,
    /// Whether the SELECT should cast this column to text (`col::text AS col`).
    pub needs_cast: bool,
}

/// Result column carrying both its PG origin and Arrow target.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub pg_type: String,
    pub data_type: DataType,
    pub needs_cast: bool,
}

impl Column {
    /// Build a `Column` from a PG type name, resolving Arrow type and cast requirement.
    #[must_use]
    pub fn new(name: &str, pg_type: &str) -> Self {
        let info = resolve(pg_type);
        Self {
            name: name.to_string(),
            pg_type: pg_type.to_string(),
            data_type: info.data_type,
            needs_cast: info.needs_cast,
        }
    }
}

fn native(data_type: DataType) -> TypeInfo {
    TypeInfo {
        data_type,
        needs_cast: false,
    }
}

/// Resolve a `PostgreSQL` type name to its Arrow type and cast requirement.
#[must_use]
pub fn resolve(pg_type: &str) -> TypeInfo {
    match pg_type {
        "smallint" | "int2" | "smallserial" => native(DataType::Int16),
        "integer" | "int4" | "serial" => native(DataType::Int32),
        "bigint" | "int8" | "bigserial" => native(DataType::Int64),
        "real" | "float4" => native(DataType::Float32),
        "double precision" | "float8" => native(DataType::Float64),
        "boolean" | "bool" => native(DataType::Boolean),

        "text" | "varchar" | "character varying" | "char" | "character" | "bpchar" | "name" => {
            native(DataType::Utf8)
        }

        "timestamp" | "timestamp without time zone" | "timestamp with time zone" | "timestamptz" => {
            native(DataType::Timestamp(TimeUnit::Microsecond, None))
        }
        "date" => native(DataType::Date32),
        "time" | "time without time zone" => native(DataType::Time64(TimeUnit::Microsecond)),
        "bytea" => native(DataType::Binary),

        // numeric, uuid, json, intervals, arrays, and custom types have no
        // native FromSql here; read their text form.
        _ => TypeInfo {
            data_type: DataType::Utf8,
            needs_cast: true,
        },
    }
}
