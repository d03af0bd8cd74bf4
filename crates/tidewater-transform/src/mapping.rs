//! Per-table transforms.

use tidewater_types::SourceTable;

use crate::ops::ColumnOp::{self, CurrencyName, Rename, Split};

/// How a staged table is reshaped before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableTransform {
    /// Apply these operations in order.
    Mapped(&'static [ColumnOp]),
    /// Nothing to do; the table is only read through join templates.
    PassThrough,
}

const SPLIT_CREATED: ColumnOp = Split {
    source: "created_at",
    date: "created_date",
    time: "created_time",
};

const SPLIT_LAST_UPDATED: ColumnOp = Split {
    source: "last_updated",
    date: "last_updated_date",
    time: "last_updated_time",
};

const PAYMENT: &[ColumnOp] = &[
    ColumnOp::Copy {
        from: "payment_id",
        to: "payment_record_id",
    },
    SPLIT_CREATED,
    SPLIT_LAST_UPDATED,
    Rename {
        from: "transaction_id",
        to: "transaction_record_id",
    },
    Rename {
        from: "counterparty_id",
        to: "counterparty_record_id",
    },
    Rename {
        from: "currency_id",
        to: "currency_record_id",
    },
    Rename {
        from: "payment_type_id",
        to: "payment_type_record_id",
    },
    ColumnOp::Drop("company_ac_number"),
    ColumnOp::Drop("counterparty_ac_number"),
    ColumnOp::Drop("created_at"),
    ColumnOp::Drop("last_updated"),
];

const PURCHASE_ORDER: &[ColumnOp] = &[
    ColumnOp::Copy {
        from: "purchase_order_id",
        to: "purchase_record_id",
    },
    SPLIT_CREATED,
    SPLIT_LAST_UPDATED,
    Rename {
        from: "staff_id",
        to: "staff_record_id",
    },
    Rename {
        from: "counterparty_id",
        to: "counterparty_record_id",
    },
    Rename {
        from: "currency_id",
        to: "currency_record_id",
    },
    ColumnOp::Drop("created_at"),
    ColumnOp::Drop("last_updated"),
];

const SALES_ORDER: &[ColumnOp] = &[
    ColumnOp::Copy {
        from: "sales_order_id",
        to: "sales_record_id",
    },
    SPLIT_CREATED,
    SPLIT_LAST_UPDATED,
    Rename {
        from: "design_id",
        to: "design_record_id",
    },
    Rename {
        from: "staff_id",
        to: "sales_staff_id",
    },
    Rename {
        from: "counterparty_id",
        to: "counterparty_record_id",
    },
    Rename {
        from: "currency_id",
        to: "currency_record_id",
    },
    ColumnOp::Drop("created_at"),
    ColumnOp::Drop("last_updated"),
];

const ADDRESS: &[ColumnOp] = &[
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "address_id",
        to: "location_record_id",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
];

const COUNTERPARTY: &[ColumnOp] = &[
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "counterparty_id",
        to: "counterparty_record_id",
    },
    Rename {
        from: "address_line_1",
        to: "counterparty_legal_address_line_1",
    },
    Rename {
        from: "address_line_2",
        to: "counterparty_legal_address_line_2",
    },
    Rename {
        from: "district",
        to: "counterparty_legal_district",
    },
    Rename {
        from: "city",
        to: "counterparty_legal_city",
    },
    Rename {
        from: "postal_code",
        to: "counterparty_legal_postal_code",
    },
    Rename {
        from: "country",
        to: "counterparty_legal_country",
    },
    Rename {
        from: "phone",
        to: "counterparty_legal_phone_number",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
    ColumnOp::Drop("legal_address_id"),
    ColumnOp::Drop("commercial_contact"),
    ColumnOp::Drop("delivery_contact"),
];

const CURRENCY: &[ColumnOp] = &[
    CurrencyName,
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "currency_id",
        to: "currency_record_id",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
];

const DESIGN: &[ColumnOp] = &[
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "design_id",
        to: "design_record_id",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
];

const PAYMENT_TYPE: &[ColumnOp] = &[
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "payment_type_id",
        to: "payment_type_record_id",
    },
    ColumnOp::Copy {
        from: "payment_type_id",
        to: "payment_record_id",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
    ColumnOp::Drop("payment_type_id"),
];

const STAFF: &[ColumnOp] = &[
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "staff_id",
        to: "staff_record_id",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
    ColumnOp::Drop("department_id"),
];

const TRANSACTION: &[ColumnOp] = &[
    SPLIT_LAST_UPDATED,
    ColumnOp::Copy {
        from: "transaction_id",
        to: "transaction_record_id",
    },
    ColumnOp::Drop("last_updated"),
    ColumnOp::Drop("created_at"),
];

impl TableTransform {
    #[must_use]
    pub fn for_table(table: SourceTable) -> Self {
        match table {
            SourceTable::Payment => Self::Mapped(PAYMENT),
            SourceTable::PurchaseOrder => Self::Mapped(PURCHASE_ORDER),
            SourceTable::SalesOrder => Self::Mapped(SALES_ORDER),
            SourceTable::Address => Self::Mapped(ADDRESS),
            SourceTable::Counterparty => Self::Mapped(COUNTERPARTY),
            SourceTable::Currency => Self::Mapped(CURRENCY),
            SourceTable::Design => Self::Mapped(DESIGN),
            SourceTable::PaymentType => Self::Mapped(PAYMENT_TYPE),
            SourceTable::Staff => Self::Mapped(STAFF),
            SourceTable::Transaction => Self::Mapped(TRANSACTION),
            SourceTable::Department => Self::PassThrough,
        }
    }

    /// Short label for listings.
    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Mapped(ops) => format!("{} ops", ops.len()),
            Self::PassThrough => "pass-through".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn only_department_passes_through() {
        for table in SourceTable::ALL {
            let transform = TableTransform::for_table(table);
            assert_eq!(
                transform == TableTransform::PassThrough,
                table == SourceTable::Department,
                "{table}"
            );
        }
    }

    /// Every mapped table must produce the primary key its relation upserts on.
    #[rstest]
    #[case(SourceTable::Payment)]
    #[case(SourceTable::PurchaseOrder)]
    #[case(SourceTable::SalesOrder)]
    #[case(SourceTable::Address)]
    #[case(SourceTable::Counterparty)]
    #[case(SourceTable::Currency)]
    #[case(SourceTable::Design)]
    #[case(SourceTable::PaymentType)]
    #[case(SourceTable::Staff)]
    #[case(SourceTable::Transaction)]
    fn mapping_produces_relation_key(#[case] table: SourceTable) {
        let TableTransform::Mapped(ops) = TableTransform::for_table(table) else {
            panic!("{table} should be mapped");
        };
        let key = table.relation().unwrap().primary_key;
        assert!(
            ops.iter().any(|op| matches!(op, ColumnOp::Copy { to, .. } if *to == key)),
            "{table} never produces {key}"
        );
    }

    #[test]
    fn currency_lookup_runs_before_split() {
        let TableTransform::Mapped(ops) = TableTransform::for_table(SourceTable::Currency) else {
            panic!("currency should be mapped");
        };
        assert_eq!(ops[0], CurrencyName);
    }
}
