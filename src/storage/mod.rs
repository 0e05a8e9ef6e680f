pub mod backends;
pub mod template;

pub use template::{ObjectMetadata, ObjectReader, ObjectStore};
