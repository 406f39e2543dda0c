use database::{
    ColumnDef, ColumnDefault, ColumnType, DatabaseService, DbError, TableDef, UpsertTarget,
};

/// Columns supplied by every write; `fetched_at` is owned by the database.
pub const FX_COLUMNS: &[&str] = &["date", "currency", "rate_to_base"];

pub const FX_TABLE: TableDef = TableDef {
    name: "fx_rates",
    columns: &[
        ColumnDef::required("date", ColumnType::Date),
        ColumnDef::required("currency", ColumnType::Varchar(3)),
        ColumnDef::required(
            "rate_to_base",
            ColumnType::Decimal {
                precision: 15,
                scale: 6,
            },
        ),
        ColumnDef::defaulting(
            "fetched_at",
            ColumnType::Timestamp,
            ColumnDefault::CurrentTimestamp,
        ),
    ],
    primary_key: &["date", "currency"],
    indexes: &[],
};

/// Insert-or-overwrite keyed on `(date, currency)`, refreshing `fetched_at`
/// whenever an existing rate is replaced.
pub const FX_UPSERT: UpsertTarget<'static> =
    UpsertTarget::new("fx_rates", FX_COLUMNS, &["date", "currency"]).touching(&["fetched_at"]);

/// Creates `fx_rates` if it does not exist yet.
pub async fn ensure_schema(service: &DatabaseService) -> Result<(), DbError> {
    let script = FX_TABLE.create_script(service.dialect().as_ref());
    service.execute_ddl(&script).await
}
