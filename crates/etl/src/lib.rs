pub mod error;
pub use error::EtlError;

pub mod universe;
pub use universe::{resolve_universe, TokenUniverse, UniverseRefresher};

pub mod backfill;
pub use backfill::BackfillEngine;

pub mod live;
pub use live::LiveBuffer;

pub mod stream;
pub use stream::StreamWorker;

#[cfg(test)]
pub(crate) mod testutil;
