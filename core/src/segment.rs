//! Annotation-aware partitioning of a continuous timeline.

use crate::recording::Annotation;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Keep,
    Skip,
}

/// Half-open sample range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn keep(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            kind: SegmentKind::Keep,
        }
    }

    pub fn skip(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            kind: SegmentKind::Skip,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn is_keep(&self) -> bool {
        self.kind == SegmentKind::Keep
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Splits `[0, n_samples)` into alternating keep/skip runs. A sample is
/// skipped when an annotation whose label starts with one of the configured
/// prefixes covers it.
pub struct SegmentPartitioner {
    skip_prefixes: Vec<String>,
}

impl SegmentPartitioner {
    pub fn new(skip_prefixes: Vec<String>) -> Self {
        Self { skip_prefixes }
    }

    pub fn partition(&self, n_samples: usize, annotations: &[Annotation]) -> Vec<Segment> {
        let mut spans: Vec<(usize, usize)> = annotations
            .iter()
            .filter(|annotation| annotation.has_prefix(&self.skip_prefixes))
            .map(|annotation| {
                (
                    annotation.onset.min(n_samples),
                    annotation.end().min(n_samples),
                )
            })
            .filter(|(start, end)| start < end)
            .collect();
        spans.sort_unstable();

        // overlapping or touching spans collapse into one skip run
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        let mut segments = Vec::with_capacity(merged.len() * 2 + 1);
        let mut cursor = 0;
        for (start, end) in merged {
            if cursor < start {
                segments.push(Segment::keep(cursor, start));
            }
            segments.push(Segment::skip(start, end));
            cursor = end;
        }
        if cursor < n_samples {
            segments.push(Segment::keep(cursor, n_samples));
        }
        segments
    }
}
