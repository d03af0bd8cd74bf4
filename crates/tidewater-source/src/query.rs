//! Time-bounded extraction queries.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use pg_escape::quote_identifier;
use tidewater_sql::{quote_ident, Dialect};
use tidewater_types::SourceTable;

use crate::types::Column;

/// Column every extracted table is windowed on.
pub const CURSOR_COLUMN: &str = "last_updated";

/// A query plus its time-bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractQuery {
    pub sql: String,
    pub binds: Vec<NaiveDateTime>,
}

/// Allow-listed tables present in the source catalog, with the spelling
/// the catalog reports for each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogNames(BTreeMap<SourceTable, String>);

impl CatalogNames {
    /// Match `names` against the allow-list, ignoring case. If several
    /// spellings match one table, the canonical one wins, otherwise the first.
    pub fn from_catalog<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut present = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let Some(table) = SourceTable::from_catalog_name(name) else {
                continue;
            };
            present
                .entry(table)
                .and_modify(|spelling: &mut String| {
                    if name == table.name() {
                        *spelling = name.to_string();
                    }
                })
                .or_insert_with(|| name.to_string());
        }
        Self(present)
    }

    #[must_use]
    pub fn contains(&self, table: SourceTable) -> bool {
        self.0.contains_key(&table)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Catalog spelling of `table`, or its canonical name when absent.
    #[must_use]
    pub fn spelling(&self, table: SourceTable) -> &str {
        self.0.get(&table).map_or(table.name(), String::as_str)
    }
}

/// Build the extraction query for `table` over `[since, until)`.
///
/// The lower bound is omitted entirely when `since` is `None`, so a first
/// run extracts all history up to `until`. `staff` and `counterparty` use
/// their fixed joins; every other table selects `*`. Table names are taken
/// from `names` and always quoted.
#[must_use]
pub fn build_extract_query(
    table: SourceTable,
    names: &CatalogNames,
    since: Option<NaiveDateTime>,
    until: NaiveDateTime,
    dialect: Dialect,
) -> ExtractQuery {
    let from = quote_ident(names.spelling(table));
    let base = match table.join() {
        Some(join) => {
            let alias = join.alias;
            let extra = join
                .columns
                .iter()
                .map(|c| format!("{alias}.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "SELECT t.*, {extra} FROM {from} AS t LEFT JOIN {} AS {alias} ON t.{} = {alias}.{}",
                quote_ident(names.spelling(join.table)),
                join.local_key,
                join.foreign_key,
            )
        }
        None => format!("SELECT * FROM {from} AS t"),
    };

    match since {
        Some(since) => ExtractQuery {
            sql: format!(
                "{base} WHERE t.{CURSOR_COLUMN} >= {} AND t.{CURSOR_COLUMN} < {}",
                dialect.placeholder(1),
                dialect.placeholder(2)
            ),
            binds: vec![since, until],
        },
        None => ExtractQuery {
            sql: format!("{base} WHERE t.{CURSOR_COLUMN} < {}", dialect.placeholder(1)),
            binds: vec![until],
        },
    }
}

/// Wrap `sql` so that columns without a native conversion are read as text.
///
/// Returns `None` when no column needs a cast.
#[must_use]
pub fn with_text_casts(sql: &str, columns: &[Column]) -> Option<String> {
    if !columns.iter().any(|c| c.needs_cast) {
        return None;
    }
    let col_list = columns
        .iter()
        .map(|c| {
            let ident = quote_identifier(&c.name);
            if c.needs_cast {
                format!("{ident}::text AS {ident}")
            } else {
                ident.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("SELECT {col_list} FROM ({sql}) AS q"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 13)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn query(
        table: SourceTable,
        since: Option<NaiveDateTime>,
        until: NaiveDateTime,
        dialect: Dialect,
    ) -> ExtractQuery {
        build_extract_query(table, &CatalogNames::default(), since, until, dialect)
    }

    #[test]
    fn first_run_omits_lower_bound() {
        let q = query(SourceTable::Address, None, at(10), Dialect::Postgres);
        assert_eq!(q.sql, r#"SELECT * FROM "address" AS t WHERE t.last_updated < $1"#);
        assert_eq!(q.binds, vec![at(10)]);
    }

    #[test]
    fn incremental_run_binds_both_bounds() {
        let q = query(SourceTable::Currency, Some(at(9)), at(10), Dialect::Postgres);
        assert_eq!(
            q.sql,
            r#"SELECT * FROM "currency" AS t WHERE t.last_updated >= $1 AND t.last_updated < $2"#
        );
        assert_eq!(q.binds, vec![at(9), at(10)]);
    }

    #[test]
    fn sqlite_uses_numbered_question_marks() {
        let q = query(SourceTable::Design, Some(at(9)), at(10), Dialect::Sqlite);
        assert!(q.sql.ends_with("t.last_updated >= ?1 AND t.last_updated < ?2"), "{}", q.sql);
    }

    #[test]
    fn staff_joins_department() {
        let q = query(SourceTable::Staff, None, at(10), Dialect::Postgres);
        assert_eq!(
            q.sql,
            r#"SELECT t.*, d.department_name, d.location FROM "staff" AS t LEFT JOIN "department" AS d ON t.department_id = d.department_id WHERE t.last_updated < $1"#
        );
    }

    #[test]
    fn counterparty_joins_legal_address() {
        let q = query(SourceTable::Counterparty, Some(at(1)), at(2), Dialect::Postgres);
        assert!(q.sql.starts_with(
            "SELECT t.*, a.address_line_1, a.address_line_2, a.district, a.city, \
             a.postal_code, a.country, a.phone FROM \"counterparty\" AS t"
        ));
        assert!(q.sql.contains(r#"LEFT JOIN "address" AS a ON t.legal_address_id = a.address_id"#));
        assert!(q.sql.contains("WHERE t.last_updated >= $1 AND t.last_updated < $2"));
    }

    #[rstest]
    #[case(SourceTable::Currency)]
    #[case(SourceTable::Department)]
    #[case(SourceTable::Transaction)]
    #[case(SourceTable::Design)]
    #[case(SourceTable::Address)]
    #[case(SourceTable::PaymentType)]
    #[case(SourceTable::Payment)]
    #[case(SourceTable::PurchaseOrder)]
    #[case(SourceTable::SalesOrder)]
    fn plain_tables_select_star(#[case] table: SourceTable) {
        for dialect in [Dialect::Postgres, Dialect::Sqlite] {
            let q = query(table, None, at(10), dialect);
            assert_eq!(
                q.sql,
                format!(
                    "SELECT * FROM \"{}\" AS t WHERE t.last_updated < {}",
                    table.name(),
                    dialect.placeholder(1)
                )
            );
            assert!(!q.sql.contains("JOIN"));
        }
    }

    #[test]
    fn catalog_spelling_is_used_and_quoted() {
        let names = CatalogNames::from_catalog(["Address", "Counterparty", "audit_log"]);
        assert_eq!(names.len(), 2);
        assert!(names.contains(SourceTable::Address));
        assert!(!names.contains(SourceTable::Staff));

        let q = build_extract_query(SourceTable::Address, &names, None, at(10), Dialect::Postgres);
        assert_eq!(q.sql, r#"SELECT * FROM "Address" AS t WHERE t.last_updated < $1"#);

        let q = build_extract_query(SourceTable::Counterparty, &names, None, at(10), Dialect::Postgres);
        assert!(q.sql.contains(r#"FROM "Counterparty" AS t LEFT JOIN "Address" AS a"#), "{}", q.sql);
    }

    #[test]
    fn canonical_spelling_wins_over_variants() {
        let names = CatalogNames::from_catalog(["Currency", "currency", "CURRENCY"]);
        assert_eq!(names.spelling(SourceTable::Currency), "currency");
        let names = CatalogNames::from_catalog(["Currency", "CURRENCY"]);
        assert_eq!(names.spelling(SourceTable::Currency), "Currency");
        assert_eq!(names.spelling(SourceTable::Staff), "staff");
    }

    #[test]
    fn text_casts_wrap_only_when_needed() {
        let plain = vec![Column::new("id", "int4"), Column::new("name", "text")];
        assert_eq!(with_text_casts("SELECT 1", &plain), None);

        let cols = vec![Column::new("id", "int4"), Column::new("unit_price", "numeric")];
        assert_eq!(
            with_text_casts("SELECT * FROM sales_order AS t", &cols).unwrap(),
            "SELECT id, unit_price::text AS unit_price FROM (SELECT * FROM sales_order AS t) AS q"
        );
    }
}
