//! Static table registry.
//!
//! Every table the pipeline knows about is a [`SourceTable`] variant. The
//! registry carries its dimension/fact classification, the fixed join
//! template used by the two enriched tables, and the warehouse relation the
//! loader upserts into.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Descriptive reference data vs. transactional data.
///
/// Dimensions are staged before any fact table because facts reference
/// dimension record ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Dimension,
    Fact,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimension => f.write_str("dimension"),
            Self::Fact => f.write_str("fact"),
        }
    }
}

/// A source table on the extraction allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    Currency,
    Department,
    Transaction,
    Design,
    Address,
    Staff,
    Counterparty,
    PaymentType,
    Payment,
    PurchaseOrder,
    SalesOrder,
}

/// Warehouse target for a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relation {
    pub target_table: &'static str,
    pub primary_key: &'static str,
}

/// Dimension tables in extraction order.
pub const DIMENSION_TABLES: [SourceTable; 8] = [
    SourceTable::Currency,
    SourceTable::Department,
    SourceTable::Transaction,
    SourceTable::Design,
    SourceTable::Address,
    SourceTable::Staff,
    SourceTable::Counterparty,
    SourceTable::PaymentType,
];

/// Fact tables in extraction order.
pub const FACT_TABLES: [SourceTable; 3] = [
    SourceTable::Payment,
    SourceTable::PurchaseOrder,
    SourceTable::SalesOrder,
];

/// Denormalizing `LEFT JOIN` applied when extracting an enriched table.
///
/// The extracted table is aliased `t`; `columns` are selected from the
/// joined table under `alias`, after every column of `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub table: SourceTable,
    pub alias: &'static str,
    pub columns: &'static [&'static str],
    /// Column of `t` holding the reference.
    pub local_key: &'static str,
    /// Referenced column of the joined table.
    pub foreign_key: &'static str,
}

const STAFF_JOIN: Join = Join {
    table: SourceTable::Department,
    alias: "d",
    columns: &["department_name", "location"],
    local_key: "department_id",
    foreign_key: "department_id",
};

const COUNTERPARTY_JOIN: Join = Join {
    table: SourceTable::Address,
    alias: "a",
    columns: &[
        "address_line_1",
        "address_line_2",
        "district",
        "city",
        "postal_code",
        "country",
        "phone",
    ],
    local_key: "legal_address_id",
    foreign_key: "address_id",
};

impl SourceTable {
    /// All known tables, dimensions first.
    pub const ALL: [SourceTable; 11] = [
        SourceTable::Currency,
        SourceTable::Department,
        SourceTable::Transaction,
        SourceTable::Design,
        SourceTable::Address,
        SourceTable::Staff,
        SourceTable::Counterparty,
        SourceTable::PaymentType,
        SourceTable::Payment,
        SourceTable::PurchaseOrder,
        SourceTable::SalesOrder,
    ];

    /// Canonical (lower-case) table name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Department => "department",
            Self::Transaction => "transaction",
            Self::Design => "design",
            Self::Address => "address",
            Self::Staff => "staff",
            Self::Counterparty => "counterparty",
            Self::PaymentType => "payment_type",
            Self::Payment => "payment",
            Self::PurchaseOrder => "purchase_order",
            Self::SalesOrder => "sales_order",
        }
    }

    #[must_use]
    pub fn kind(self) -> TableKind {
        match self {
            Self::Payment | Self::PurchaseOrder | Self::SalesOrder => TableKind::Fact,
            _ => TableKind::Dimension,
        }
    }

    /// Fixed join for tables enriched with denormalized columns.
    #[must_use]
    pub fn join(self) -> Option<Join> {
        match self {
            Self::Staff => Some(STAFF_JOIN),
            Self::Counterparty => Some(COUNTERPARTY_JOIN),
            _ => None,
        }
    }

    /// Warehouse relation, or `None` for tables that are only consumed by
    /// join templates.
    #[must_use]
    pub fn relation(self) -> Option<Relation> {
        let (target_table, primary_key) = match self {
            Self::Currency => ("dim_currency", "currency_record_id"),
            Self::Payment => ("fact_payment", "payment_record_id"),
            Self::Transaction => ("dim_transaction", "transaction_record_id"),
            Self::Design => ("dim_design", "design_record_id"),
            Self::Address => ("dim_location", "location_record_id"),
            Self::Staff => ("dim_staff", "staff_record_id"),
            Self::Counterparty => ("dim_counterparty", "counterparty_record_id"),
            Self::PurchaseOrder => ("fact_purchase_order", "purchase_record_id"),
            Self::PaymentType => ("dim_payment_type", "payment_type_record_id"),
            Self::SalesOrder => ("fact_sales_order", "sales_record_id"),
            Self::Department => return None,
        };
        Some(Relation {
            target_table,
            primary_key,
        })
    }

    /// Match a catalog name against the allow-list, ignoring case.
    #[must_use]
    pub fn from_catalog_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a name is not on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown table '{0}'")]
pub struct UnknownTable(pub String);

impl FromStr for SourceTable {
    type Err = UnknownTable;

    /// Exact, case-sensitive match on the canonical name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn dimension_and_fact_lists_partition_all_tables() {
        let mut combined: Vec<SourceTable> = DIMENSION_TABLES.to_vec();
        combined.extend(FACT_TABLES);
        assert_eq!(combined, SourceTable::ALL.to_vec());
        assert!(DIMENSION_TABLES.iter().all(|t| t.kind() == TableKind::Dimension));
        assert!(FACT_TABLES.iter().all(|t| t.kind() == TableKind::Fact));
    }

    #[test]
    fn relations_cover_ten_tables() {
        let mapped = SourceTable::ALL
            .iter()
            .filter(|t| t.relation().is_some())
            .count();
        assert_eq!(mapped, 10);
        assert!(SourceTable::Department.relation().is_none());
    }

    #[rstest]
    #[case(SourceTable::Address, "dim_location", "location_record_id")]
    #[case(SourceTable::Transaction, "dim_transaction", "transaction_record_id")]
    #[case(SourceTable::SalesOrder, "fact_sales_order", "sales_record_id")]
    #[case(SourceTable::PurchaseOrder, "fact_purchase_order", "purchase_record_id")]
    fn relation_lookup(
        #[case] table: SourceTable,
        #[case] target: &str,
        #[case] pk: &str,
    ) {
        let rel = table.relation().unwrap();
        assert_eq!(rel.target_table, target);
        assert_eq!(rel.primary_key, pk);
    }

    #[test]
    fn catalog_match_ignores_case() {
        assert_eq!(
            SourceTable::from_catalog_name("Sales_Order"),
            Some(SourceTable::SalesOrder)
        );
        assert_eq!(SourceTable::from_catalog_name("_prisma_migrations"), None);
    }

    #[test]
    fn from_str_is_exact() {
        assert_eq!("staff".parse::<SourceTable>(), Ok(SourceTable::Staff));
        let err = "Staff".parse::<SourceTable>().unwrap_err();
        assert_eq!(err.to_string(), "unknown table 'Staff'");
    }

    #[test]
    fn only_staff_and_counterparty_have_join_templates() {
        for table in SourceTable::ALL {
            let expected = matches!(table, SourceTable::Staff | SourceTable::Counterparty);
            assert_eq!(table.join().is_some(), expected, "{table}");
        }
        let staff = SourceTable::Staff.join().unwrap();
        assert_eq!(staff.table, SourceTable::Department);
        assert_eq!(staff.columns, ["department_name", "location"]);
        let counterparty = SourceTable::Counterparty.join().unwrap();
        assert_eq!(counterparty.table, SourceTable::Address);
        assert_eq!(counterparty.local_key, "legal_address_id");
    }
}
