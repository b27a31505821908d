//! Maps heterogeneous input columns onto [`CanonicalRecord`] and coerces field types.

pub mod aliases;

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{CanonicalField, CanonicalRecord, OnlineOrder};
use crate::error::{IngestError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::{RawRow, RawValue};

pub use aliases::AliasTable;

/// A reconciled row plus the field-level problems that were absorbed into defaults.
#[derive(Debug)]
pub struct Reconciled {
    pub record: CanonicalRecord,
    pub warnings: Vec<IngestError>,
}

pub struct SchemaReconciler {
    aliases: AliasTable,
    required: Vec<CanonicalField>,
}

impl SchemaReconciler {
    pub fn new(aliases: AliasTable, required: Vec<CanonicalField>) -> Self {
        Self { aliases, required }
    }

    /// Build a canonical record from one row.
    ///
    /// Fails with [`IngestError::Schema`] only when a required field has no
    /// matching column. Every other problem degrades to the field default and
    /// is reported in `warnings`.
    pub fn reconcile(&self, row: &RawRow) -> Result<Reconciled> {
        let mut mapped: HashMap<CanonicalField, &RawValue> = HashMap::new();
        for (column, value) in row.cells() {
            if let Some(field) = self.aliases.resolve(column) {
                // first matching column wins
                mapped.entry(field).or_insert(value);
            }
        }

        for field in &self.required {
            if !mapped.contains_key(field) {
                return Err(IngestError::Schema { field: *field });
            }
        }

        let mut warnings = Vec::new();
        let text = |field: CanonicalField| -> String {
            mapped
                .get(&field)
                .and_then(|v| v.as_text())
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let review_count = match mapped.get(&CanonicalField::ReviewCount) {
            Some(value) => coerce_count(value).unwrap_or_else(|err| {
                metrics::reconcile::coercion_failed(CanonicalField::ReviewCount);
                warnings.push(err);
                0
            }),
            None => 0,
        };

        let record = CanonicalRecord {
            title: text(CanonicalField::Title),
            review_count,
            category: text(CanonicalField::Category),
            // left raw; the normalizer owns line-break and padding cleanup
            review_text: mapped
                .get(&CanonicalField::ReviewText)
                .and_then(|v| v.as_text())
                .unwrap_or_default(),
            sentiment: 0.0,
            popular_food: text(CanonicalField::PopularFood),
            online_order: mapped
                .get(&CanonicalField::OnlineOrder)
                .map(|v| coerce_online_order(v))
                .unwrap_or_default(),
        };

        for field in CanonicalField::SOURCED {
            if !mapped.contains_key(&field) {
                debug!(field = %field, "no column for field, using default");
                metrics::reconcile::field_defaulted(field);
            }
        }

        Ok(Reconciled { record, warnings })
    }
}

/// Integer coercion for counts. Grouping commas and blanks are stripped;
/// integral non-negative floats are accepted.
pub fn coerce_count(value: &RawValue) -> Result<i64> {
    let fail = |raw: String, reason: &str| IngestError::TypeCoercion {
        field: CanonicalField::ReviewCount,
        value: raw,
        reason: reason.to_string(),
    };

    match value {
        RawValue::Null => Ok(0),
        RawValue::Number(n) if n.is_nan() => Ok(0),
        RawValue::Number(n) => integral(*n).ok_or_else(|| fail(n.to_string(), "not a non-negative integer")),
        RawValue::Text(raw) => {
            let cleaned: String = raw
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return Ok(0);
            }
            if let Ok(n) = cleaned.parse::<i64>() {
                return if n < 0 {
                    Err(fail(raw.clone(), "negative count"))
                } else {
                    Ok(n)
                };
            }
            match cleaned.parse::<f64>() {
                Ok(f) => integral(f).ok_or_else(|| fail(raw.clone(), "not a non-negative integer")),
                Err(_) => Err(fail(raw.clone(), "not numeric")),
            }
        }
    }
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

pub fn coerce_online_order(value: &RawValue) -> OnlineOrder {
    let Some(text) = value.as_text() else {
        return OnlineOrder::default();
    };
    let trimmed = text.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => OnlineOrder::Flag(true),
        "no" | "n" | "false" | "0" => OnlineOrder::Flag(false),
        _ => OnlineOrder::Text(trimmed.to_string()),
    }
}
