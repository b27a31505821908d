pub mod http_polarity;
pub mod sqlite_store;

pub use http_polarity::HttpPolarityModel;
pub use sqlite_store::SqliteConnector;
