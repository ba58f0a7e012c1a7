//! Data models for vshelf-ingest

pub mod collection;
pub mod segment;
pub mod taxonomy;
pub mod video;

pub use collection::{Collection, CollectionMatch, CollectionOrigin, FilingResult};
pub use segment::{DraftSegment, EmbeddedSegment, Segment};
pub use taxonomy::Taxonomy;
pub use video::{SourceVideo, Video, VideoStatus};
