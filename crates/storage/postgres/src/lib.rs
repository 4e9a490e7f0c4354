pub mod error;
pub mod postgres;
pub use postgres::PostgresStorage;
