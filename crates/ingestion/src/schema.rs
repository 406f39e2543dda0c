use database::{
    ColumnDef, ColumnType, DatabaseService, DbError, IndexDef, TableDef, UpsertTarget,
};

const AMOUNT: ColumnType = ColumnType::Decimal {
    precision: 15,
    scale: 6,
};

/// Column order shared by the table, the upsert and `UsageRecord::to_values`.
pub const USAGE_COLUMNS: &[&str] = &["date", "bill_id", "currency", "name", "amount1", "amount2"];

pub const USAGE_TABLE: TableDef = TableDef {
    name: "usage_data",
    columns: &[
        ColumnDef::required("date", ColumnType::Date),
        ColumnDef::required("bill_id", ColumnType::BigInt),
        ColumnDef::required("currency", ColumnType::Varchar(3)),
        ColumnDef::required("name", ColumnType::Varchar(255)),
        ColumnDef::required("amount1", AMOUNT),
        ColumnDef::required("amount2", AMOUNT),
    ],
    primary_key: &["date", "bill_id"],
    indexes: &[
        IndexDef {
            name: "idx_usage_date",
            columns: &["date"],
        },
        IndexDef {
            name: "idx_usage_currency",
            columns: &["currency"],
        },
    ],
};

/// Insert-or-overwrite keyed on `(date, bill_id)`.
pub const USAGE_UPSERT: UpsertTarget<'static> =
    UpsertTarget::new("usage_data", USAGE_COLUMNS, &["date", "bill_id"]);

/// Creates `usage_data` and its indexes if they do not exist yet.
pub async fn ensure_schema(service: &DatabaseService) -> Result<(), DbError> {
    let script = USAGE_TABLE.create_script(service.dialect().as_ref());
    service.execute_ddl(&script).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_upsert_agree_on_columns() {
        assert_eq!(USAGE_TABLE.column_names(), USAGE_COLUMNS);
        assert_eq!(USAGE_UPSERT.update_columns().collect::<Vec<_>>(), [
            "currency", "name", "amount1", "amount2"
        ]);
    }
}
