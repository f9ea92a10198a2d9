mod repository;

pub use repository::{METADATA_PREFIX, MetadataRepository};
