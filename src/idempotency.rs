use sha2::{Digest, Sha256};

use crate::pipeline::ingestion::{RawValue, TabularBuffer};

/// Content key for a batch: hex SHA-256 over the target table, the source name
/// and every cell in order.
///
/// Re-uploading the same file under the same name into the same table yields the
/// same key, so the persister can refuse to write it twice. The ledger is shared
/// by every table in the database, hence the table in the key.
pub fn compute_batch_key(table: &str, source: &str, buffer: &TabularBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.as_bytes());
    hasher.update(b"\x1e");
    hasher.update(source.as_bytes());
    hasher.update(b"\x1e");
    for row in buffer.rows() {
        for (column, value) in row.cells() {
            hasher.update(column.as_bytes());
            hasher.update(b"\x1f");
            match value {
                RawValue::Text(s) => {
                    hasher.update(b"t");
                    hasher.update(s.as_bytes());
                }
                RawValue::Number(n) => {
                    hasher.update(b"n");
                    hasher.update(n.to_bits().to_be_bytes());
                }
                RawValue::Null => hasher.update(b"0"),
            }
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x1e");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::RawRow;

    fn buffer(title: &str) -> TabularBuffer {
        TabularBuffer::from_rows(vec![RawRow::new()
            .with("Title", RawValue::Text(title.into()))
            .with("Review", RawValue::Null)])
    }

    #[test]
    fn key_is_stable_and_content_sensitive() {
        let a = compute_batch_key("reviews", "uploads/a.csv", &buffer("Cafe"));
        assert_eq!(a, compute_batch_key("reviews", "uploads/a.csv", &buffer("Cafe")));
        assert_eq!(a.len(), 64);
        assert_ne!(a, compute_batch_key("reviews", "uploads/a.csv", &buffer("Cafe ")));
        assert_ne!(a, compute_batch_key("reviews", "uploads/b.csv", &buffer("Cafe")));
    }

    #[test]
    fn key_differs_per_target_table() {
        let full = compute_batch_key("reviews", "uploads/a.csv", &buffer("Cafe"));
        let reduced = compute_batch_key("restaurant_reviews", "uploads/a.csv", &buffer("Cafe"));
        assert_ne!(full, reduced);
    }
}
