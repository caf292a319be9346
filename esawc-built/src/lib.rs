pub mod batch;
pub mod collect;
pub mod error;
pub mod geo_core;
pub mod geometric;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchDriver, BatchOutcome, RegionFailure};
pub use error::{BuiltupError, Result};
pub use geometric::builtup::BuiltupExtractor;
pub use geometric::region::Region;
pub use geometric::vector_dataset::VectorDataset;
