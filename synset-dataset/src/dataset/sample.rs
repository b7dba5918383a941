use crate::common::*;

/// One training sample.
///
/// `bbox_target` and `bbox_target_dup` always hold the same values. Both
/// slots are kept because consumers expect a six-element tuple.
#[derive(Debug, Clone)]
pub struct AugmentedSample<T> {
    /// The class the sample was finally drawn from.
    pub class_id: usize,
    pub anchor: T,
    pub positive: T,
    pub negative: T,
    /// One-hot vector of length `num_classes`.
    pub class_labels: Array1<f32>,
    /// `[dx, dy, dw, dh]`.
    pub bbox_target: Array1<f32>,
    pub bbox_target_dup: Array1<f32>,
}

impl<T> AugmentedSample<T> {
    pub fn into_tuple(self) -> (T, T, T, Array1<f32>, Array1<f32>, Array1<f32>) {
        let Self {
            anchor,
            positive,
            negative,
            class_labels,
            bbox_target,
            bbox_target_dup,
            ..
        } = self;
        (
            anchor,
            positive,
            negative,
            class_labels,
            bbox_target,
            bbox_target_dup,
        )
    }
}

/// Build a one-hot vector with a one at `class_id`.
pub fn one_hot(num_classes: usize, class_id: usize) -> Array1<f32> {
    let mut labels = Array1::zeros(num_classes);
    labels[class_id] = 1.0;
    labels
}
