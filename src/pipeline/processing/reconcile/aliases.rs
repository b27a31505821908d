use std::collections::{BTreeMap, HashMap};

use crate::domain::CanonicalField;
use crate::error::{IngestError, Result};

/// Column spellings seen from upstream producers, typos included.
const DEFAULT_ALIASES: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::Title,
        &["Title", "Restaurant_Name", "Restaurant Name", "Name"],
    ),
    (
        CanonicalField::ReviewCount,
        &["Number of review", "Number of reviews", "Number of Reveiws", "Review Count"],
    ),
    (CanonicalField::Category, &["Category", "Catagory"]),
    (
        CanonicalField::ReviewText,
        &["Review Comment", "Reveiw Comment", "Review", "Reveiw"],
    ),
    (
        CanonicalField::PopularFood,
        &["Popular food", "Popular Foods", "Popluar food"],
    ),
    (
        CanonicalField::OnlineOrder,
        &["Online Order", "Online Ordering", "Onlne Order"],
    ),
];

/// Matching key for a column name: trimmed, case-folded, `_` read as a space,
/// inner whitespace collapsed.
pub fn column_key(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical field → accepted source column names.
///
/// This is the only place producer drift is declared; scoring and persistence
/// never look at raw column names.
#[derive(Debug, Clone)]
pub struct AliasTable {
    by_key: HashMap<String, CanonicalField>,
    declared: BTreeMap<CanonicalField, Vec<String>>,
}

impl AliasTable {
    pub fn new(declared: BTreeMap<CanonicalField, Vec<String>>) -> Result<Self> {
        let mut by_key = HashMap::new();
        for (field, names) in &declared {
            if *field == CanonicalField::Sentiment {
                return Err(IngestError::Config(
                    "sentiment is derived and cannot be aliased to an input column".into(),
                ));
            }
            for name in names {
                let key = column_key(name);
                if key.is_empty() {
                    continue;
                }
                if let Some(existing) = by_key.insert(key, *field) {
                    if existing != *field {
                        return Err(IngestError::Config(format!(
                            "column alias '{}' is declared for both {} and {}",
                            name, existing, field
                        )));
                    }
                }
            }
        }
        Ok(Self { by_key, declared })
    }

    /// Built-in table with per-field replacements from configuration.
    pub fn with_overrides(overrides: &BTreeMap<CanonicalField, Vec<String>>) -> Result<Self> {
        let mut declared = default_declared();
        for (field, names) in overrides {
            declared.insert(*field, names.clone());
        }
        Self::new(declared)
    }

    pub fn resolve(&self, column: &str) -> Option<CanonicalField> {
        self.by_key.get(&column_key(column)).copied()
    }

    pub fn aliases_for(&self, field: CanonicalField) -> &[String] {
        self.declared.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        let declared = default_declared();
        let by_key = declared
            .iter()
            .flat_map(|(field, names)| names.iter().map(move |n| (column_key(n), *field)))
            .collect();
        Self { by_key, declared }
    }
}

fn default_declared() -> BTreeMap<CanonicalField, Vec<String>> {
    DEFAULT_ALIASES
        .iter()
        .map(|(field, names)| (*field, names.iter().map(|s| s.to_string()).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_padding_case_and_underscores() {
        let table = AliasTable::default();
        assert_eq!(table.resolve("  reveiw   COMMENT "), Some(CanonicalField::ReviewText));
        assert_eq!(table.resolve("Restaurant_Name"), Some(CanonicalField::Title));
        assert_eq!(table.resolve("restaurant name"), Some(CanonicalField::Title));
        assert_eq!(table.resolve("Catagory"), Some(CanonicalField::Category));
        assert_eq!(table.resolve("Rating"), None);
    }

    #[test]
    fn overrides_replace_a_fields_aliases() {
        let mut overrides = BTreeMap::new();
        overrides.insert(CanonicalField::Category, vec!["Cuisine".to_string()]);
        let table = AliasTable::with_overrides(&overrides).unwrap();
        assert_eq!(table.resolve("cuisine"), Some(CanonicalField::Category));
        assert_eq!(table.resolve("Category"), None);
        assert_eq!(table.resolve("Title"), Some(CanonicalField::Title));
    }

    #[test]
    fn conflicting_aliases_are_rejected() {
        let mut declared = BTreeMap::new();
        declared.insert(CanonicalField::Title, vec!["Name".to_string()]);
        declared.insert(CanonicalField::Category, vec!["name".to_string()]);
        assert!(matches!(AliasTable::new(declared), Err(IngestError::Config(_))));
    }

    #[test]
    fn sentiment_cannot_be_sourced() {
        let mut declared = BTreeMap::new();
        declared.insert(CanonicalField::Sentiment, vec!["Score".to_string()]);
        assert!(AliasTable::new(declared).is_err());
    }
}
