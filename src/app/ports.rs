use crate::domain::CanonicalRecord;
use crate::error::Result;
use crate::pipeline::storage::TargetSchema;

/// External polarity model used by the `model` sentiment strategy.
pub trait PolarityModel: Send + Sync {
    fn name(&self) -> &str;

    /// Polarity in `[-1.0, 1.0]` per the model's contract.
    fn polarity(&self, text: &str) -> anyhow::Result<f64>;
}

/// Why a store operation failed, as far as the batch is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteFault {
    /// The store rejected this row only; the transaction is still usable.
    Row(String),
    /// The session is no longer usable; the batch must be rolled back.
    Fatal(String),
}

impl std::fmt::Display for WriteFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteFault::Row(m) | WriteFault::Fatal(m) => f.write_str(m),
        }
    }
}

/// Hands out one transactional session per batch.
pub trait StoreConnector: Send + Sync {
    /// Open a connection and begin a transaction. Failures are
    /// [`crate::error::IngestError::Connection`].
    fn acquire(&self, schema: &TargetSchema) -> Result<Box<dyn StoreSession>>;
}

/// One open transaction. Dropping a session that was neither committed nor
/// rolled back must roll it back.
pub trait StoreSession {
    fn insert(&mut self, schema: &TargetSchema, record: &CanonicalRecord) -> std::result::Result<(), WriteFault>;

    /// Whether a batch with this key was already committed.
    fn batch_recorded(&mut self, batch_key: &str) -> std::result::Result<bool, WriteFault>;

    fn record_batch(
        &mut self,
        batch_key: &str,
        source: &str,
        rows_written: usize,
    ) -> std::result::Result<(), WriteFault>;

    fn commit(self: Box<Self>) -> std::result::Result<(), WriteFault>;

    fn rollback(self: Box<Self>) -> std::result::Result<(), WriteFault>;
}
