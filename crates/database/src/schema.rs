//! Backend-neutral table definitions rendered to DDL through a [`Dialect`].

use crate::dialect::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Text,
    Varchar(u16),
    Decimal { precision: u8, scale: u8 },
    Date,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    CurrentTimestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDef {
    pub const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: None,
        }
    }

    pub const fn defaulting(name: &'static str, ty: ColumnType, default: ColumnDefault) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            default: Some(default),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub indexes: &'static [IndexDef],
}

impl TableDef {
    /// Idempotent `CREATE TABLE IF NOT EXISTS` script, followed by one
    /// `CREATE INDEX IF NOT EXISTS` per index.
    pub fn create_script(&self, dialect: &dyn Dialect) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let mut line = format!("    {} {}", column.name, dialect.column_type(column.ty));
                if !column.nullable {
                    line.push_str(" NOT NULL");
                }
                if let Some(ColumnDefault::CurrentTimestamp) = column.default {
                    line.push_str(" DEFAULT ");
                    line.push_str(dialect.current_timestamp());
                }
                line
            })
            .collect();
        lines.push(format!("    PRIMARY KEY ({})", self.primary_key.join(", ")));

        let mut script = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
            self.name,
            lines.join(",\n")
        );
        for index in self.indexes {
            script.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({});\n",
                index.name,
                self.name,
                index.columns.join(", ")
            ));
        }
        script
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}
