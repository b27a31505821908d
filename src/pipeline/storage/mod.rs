//! Persistence target descriptors and the batch persister.
//!
//! Table shape is data, not code: both the full `reviews` layout and the
//! reduced `restaurant_name/review/sentiment` layout are [`TargetSchema`] values.

pub mod persister;

use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalField, CanonicalRecord};
use crate::error::{IngestError, Result};

pub use persister::BatchPersister;

/// Ledger of committed batch keys, kept next to the target table.
pub const BATCH_LEDGER_TABLE: &str = "ingest_batches";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    Reviews,
    ReviewsReduced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

/// A value ready to bind into an insert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

#[derive(Debug, Clone)]
pub struct ColumnBinding {
    pub column: &'static str,
    pub field: CanonicalField,
    pub sql_type: SqlType,
    /// Column constraint appended verbatim to the DDL.
    pub constraint: Option<&'static str>,
}

impl ColumnBinding {
    const fn new(
        column: &'static str,
        field: CanonicalField,
        sql_type: SqlType,
        constraint: Option<&'static str>,
    ) -> Self {
        Self {
            column,
            field,
            sql_type,
            constraint,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetSchema {
    pub table: String,
    pub columns: Vec<ColumnBinding>,
    /// Canonical fields whose source column must be present in every row.
    pub required: Vec<CanonicalField>,
}

impl TargetSchema {
    pub fn reviews() -> Self {
        use CanonicalField::*;
        Self {
            table: "reviews".to_string(),
            columns: vec![
                ColumnBinding::new("title", Title, SqlType::Text, Some("NOT NULL CHECK (length(title) > 0)")),
                ColumnBinding::new(
                    "number_of_reviews",
                    ReviewCount,
                    SqlType::Integer,
                    Some("NOT NULL CHECK (number_of_reviews >= 0)"),
                ),
                ColumnBinding::new("category", Category, SqlType::Text, None),
                ColumnBinding::new("review_comment", ReviewText, SqlType::Text, Some("NOT NULL")),
                ColumnBinding::new(
                    "sentiment",
                    Sentiment,
                    SqlType::Real,
                    Some("NOT NULL CHECK (sentiment BETWEEN -1.0 AND 1.0)"),
                ),
                ColumnBinding::new("popular_food", PopularFood, SqlType::Text, None),
                ColumnBinding::new("online_order", OnlineOrder, SqlType::Text, None),
            ],
            required: vec![Title],
        }
    }

    pub fn reviews_reduced() -> Self {
        use CanonicalField::*;
        Self {
            table: "reviews".to_string(),
            columns: vec![
                ColumnBinding::new(
                    "restaurant_name",
                    Title,
                    SqlType::Text,
                    Some("NOT NULL CHECK (length(restaurant_name) > 0)"),
                ),
                ColumnBinding::new("review", ReviewText, SqlType::Text, Some("NOT NULL")),
                ColumnBinding::new(
                    "sentiment",
                    Sentiment,
                    SqlType::Real,
                    Some("NOT NULL CHECK (sentiment BETWEEN -1.0 AND 1.0)"),
                ),
            ],
            required: vec![Title],
        }
    }

    pub fn for_kind(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Reviews => Self::reviews(),
            TargetKind::ReviewsReduced => Self::reviews_reduced(),
        }
    }

    /// Same layout under another table name.
    pub fn with_table(mut self, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        self.table = table.to_string();
        Ok(self)
    }

    pub fn create_table_sql(&self) -> String {
        let mut cols = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        for c in &self.columns {
            let mut def = format!("{} {}", c.column, c.sql_type.as_sql());
            if let Some(constraint) = c.constraint {
                def.push(' ');
                def.push_str(constraint);
            }
            cols.push(def);
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            cols.join(",\n    ")
        )
    }

    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.column).collect();
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// Bind values for one record, in column order.
    pub fn values(&self, record: &CanonicalRecord) -> Vec<StoreValue> {
        self.columns
            .iter()
            .map(|c| match c.field {
                CanonicalField::Title => StoreValue::Text(record.title.clone()),
                CanonicalField::ReviewCount => StoreValue::Integer(record.review_count),
                CanonicalField::Category => StoreValue::Text(record.category.clone()),
                CanonicalField::ReviewText => StoreValue::Text(record.review_text.clone()),
                CanonicalField::Sentiment => StoreValue::Real(record.sentiment),
                CanonicalField::PopularFood => StoreValue::Text(record.popular_food.clone()),
                CanonicalField::OnlineOrder => StoreValue::Text(record.online_order.to_store_text()),
            })
            .collect()
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(IngestError::Config(format!("invalid table name '{}'", name)))
    }
}
