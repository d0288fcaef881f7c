//! Media decoding and duration-bounded segmentation.

pub mod error;
pub mod plan;
pub mod segmenter;
pub mod toolkit;
pub mod work_area;

use std::path::PathBuf;

pub use error::{MediaError, SegmentError};
pub use plan::{plan_segments, SegmentSpan};
pub use segmenter::{MediaSegmenter, SegmentedAudio};
pub use toolkit::{AudioFormat, FfmpegToolkit, MediaToolkit};
pub use work_area::WorkArea;

/// A materialized slice of the canonical audio, owned by one job run.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the plan. Transcripts are assembled in this order.
    pub index: usize,
    pub start_offset: f64,
    pub duration: f64,
    pub path: PathBuf,
}
