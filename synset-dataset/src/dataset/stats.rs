use crate::{
    common::*,
    error::{RejectionKind, SampleError},
};

/// Counters of rejected samples.
///
/// Rejections skew the effective class distribution. The per-class counters
/// show which synsets lose samples.
#[derive(Debug)]
pub struct ResampleStats {
    missing_annotation_match: AtomicUsize,
    image_unavailable: AtomicUsize,
    degenerate_box: AtomicUsize,
    crop_decode_failure: AtomicUsize,
    exhausted: AtomicUsize,
    per_class: Vec<AtomicUsize>,
}

/// A point-in-time copy of [ResampleStats].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResampleSummary {
    pub missing_annotation_match: usize,
    pub image_unavailable: usize,
    pub degenerate_box: usize,
    pub crop_decode_failure: usize,
    /// Requests that ran out of attempts.
    pub exhausted: usize,
    pub per_class: Vec<usize>,
}

impl ResampleSummary {
    pub fn total_rejections(&self) -> usize {
        self.missing_annotation_match
            + self.image_unavailable
            + self.degenerate_box
            + self.crop_decode_failure
    }
}

impl ResampleStats {
    pub fn new(num_classes: usize) -> Self {
        Self {
            missing_annotation_match: AtomicUsize::new(0),
            image_unavailable: AtomicUsize::new(0),
            degenerate_box: AtomicUsize::new(0),
            crop_decode_failure: AtomicUsize::new(0),
            exhausted: AtomicUsize::new(0),
            per_class: (0..num_classes).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    pub fn record(&self, class_id: usize, error: &SampleError) {
        let counter = match error.kind() {
            RejectionKind::MissingAnnotationMatch => &self.missing_annotation_match,
            RejectionKind::ImageUnavailable => &self.image_unavailable,
            RejectionKind::DegenerateBox => &self.degenerate_box,
            RejectionKind::CropDecodeFailure => &self.crop_decode_failure,
            RejectionKind::Fatal => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Some(counter) = self.per_class.get(class_id) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> ResampleSummary {
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        ResampleSummary {
            missing_annotation_match: load(&self.missing_annotation_match),
            image_unavailable: load(&self.image_unavailable),
            degenerate_box: load(&self.degenerate_box),
            crop_decode_failure: load(&self.crop_decode_failure),
            exhausted: load(&self.exhausted),
            per_class: self.per_class.iter().map(load).collect(),
        }
    }
}
