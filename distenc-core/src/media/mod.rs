// ============================================================================
// distenc-core/src/media/mod.rs
// ============================================================================
//
// MEDIA: video analysis data model and the probe that populates it.

mod probe;
mod types;

pub use probe::{FfprobeMediaProbe, MediaProbe};
#[cfg(any(test, feature = "test-mocks"))]
pub use probe::mocks;
pub use types::{Chapter, CropRect, TEXT_SUBTITLE_CODECS, VideoInfo};
