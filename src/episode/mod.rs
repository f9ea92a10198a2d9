mod filename;
mod record;

pub use filename::{PLACEHOLDER_STEM, sanitize_filename, stem_of};
pub use record::{EpisodeDefaults, EpisodeRecord};
