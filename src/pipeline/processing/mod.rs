// Per-row processing: schema reconciliation, text normalization, sentiment scoring

pub mod normalize;
pub mod reconcile;
pub mod sentiment;
