use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::SegmentError;
use super::plan::plan_segments;
use super::toolkit::{AudioFormat, MediaToolkit};
use super::work_area::WorkArea;
use super::Segment;

const CANONICAL_FILE: &str = "canonical.wav";

/// Result of segmenting one input.
#[derive(Debug, Clone)]
pub struct SegmentedAudio {
    pub duration_seconds: f64,
    pub planned: usize,
    /// Produced segments in index order. Indices of skipped spans are absent.
    pub segments: Vec<Segment>,
}

impl SegmentedAudio {
    pub fn skipped(&self) -> usize {
        self.planned - self.segments.len()
    }
}

/// Converts input media into canonical PCM and splits it into segments no
/// longer than the configured limit.
#[derive(Clone)]
pub struct MediaSegmenter {
    toolkit: Arc<dyn MediaToolkit>,
    format: AudioFormat,
}

impl MediaSegmenter {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, format: AudioFormat) -> Self {
        Self { toolkit, format }
    }

    pub async fn probe_duration(&self, input: &Path) -> Result<f64, SegmentError> {
        Ok(self.toolkit.probe_duration(input).await?)
    }

    /// Writes all artifacts into `area`. A span that fails to extract is
    /// skipped with a warning; failing every span is an error.
    pub async fn segment(
        &self,
        input: &Path,
        max_segment_seconds: f64,
        area: &WorkArea,
    ) -> Result<SegmentedAudio, SegmentError> {
        let canonical = area.file(CANONICAL_FILE);
        self.toolkit
            .transcode(input, &canonical, &self.format)
            .await?;

        let duration = self.probe_duration(&canonical).await?;
        let plan = plan_segments(duration, max_segment_seconds);
        if plan.is_empty() {
            return Err(SegmentError::EmptyAudio { duration });
        }

        info!(
            duration_seconds = duration,
            segment_count = plan.len(),
            "Planned audio segments"
        );

        if plan.len() == 1 {
            return Ok(SegmentedAudio {
                duration_seconds: duration,
                planned: 1,
                segments: vec![Segment {
                    index: 0,
                    start_offset: 0.0,
                    duration,
                    path: canonical,
                }],
            });
        }

        let mut segments = Vec::with_capacity(plan.len());
        for span in &plan {
            let path = area.file(&format!("segment_{:03}.wav", span.index));
            match self
                .toolkit
                .extract(&canonical, &path, span.start, span.duration, &self.format)
                .await
            {
                Ok(()) => {
                    debug!(index = span.index, start = span.start, "Segment extracted");
                    segments.push(Segment {
                        index: span.index,
                        start_offset: span.start,
                        duration: span.duration,
                        path,
                    });
                }
                Err(e) => {
                    warn!(
                        index = span.index,
                        start = span.start,
                        error = %e,
                        "Skipping segment that failed to extract"
                    );
                }
            }
        }

        if segments.is_empty() {
            return Err(SegmentError::NoSegments {
                planned: plan.len(),
            });
        }

        Ok(SegmentedAudio {
            duration_seconds: duration,
            planned: plan.len(),
            segments,
        })
    }
}
