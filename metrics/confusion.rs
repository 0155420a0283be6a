use super::FMeasureError;
use itertools::izip;
use ndarray::prelude::*;
use std::cmp::Ordering;

/// Weighted counts of true positives, false positives and false negatives, one entry per threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionCounts {
	pub true_positives: Array1<f64>,
	pub false_positives: Array1<f64>,
	pub false_negatives: Array1<f64>,
}

/// How the scores in each row are narrowed down before they are compared with the thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Selection {
	/// Only the `top_k` highest scores in a row can be predicted positive.
	pub top_k: Option<usize>,
	/// Only this column of each row is counted.
	pub class_id: Option<usize>,
}

pub struct ConfusionInput<'a> {
	/// (n_examples..., n_classes), any non-zero value is a positive label
	pub labels: ArrayViewD<'a, f32>,
	/// (n_examples..., n_classes), scores in [0, 1]
	pub predictions: ArrayViewD<'a, f32>,
	/// broadcastable to the shape of `predictions`
	pub sample_weight: Option<ArrayViewD<'a, f32>>,
}

impl ConfusionCounts {
	pub fn zeros(n_thresholds: usize) -> Self {
		Self {
			true_positives: Array1::zeros(n_thresholds),
			false_positives: Array1::zeros(n_thresholds),
			false_negatives: Array1::zeros(n_thresholds),
		}
	}

	pub fn len(&self) -> usize {
		self.true_positives.len()
	}

	pub fn is_empty(&self) -> bool {
		self.true_positives.is_empty()
	}

	pub fn add(&mut self, other: &ConfusionCounts) {
		self.true_positives += &other.true_positives;
		self.false_positives += &other.false_positives;
		self.false_negatives += &other.false_negatives;
	}

	pub fn clear(&mut self) {
		self.true_positives.fill(0.0);
		self.false_positives.fill(0.0);
		self.false_negatives.fill(0.0);
	}
}

/**
Count the true positives, false positives and false negatives in a batch for each threshold.

The last axis of `labels` and `predictions` holds the classes and every leading axis indexes examples, so a one dimensional input is a single row. Within a row, `top_k` first keeps the k highest scores, preferring the lower index when scores tie. `class_id` then restricts counting to a single column. A kept score is predicted positive at a threshold when it is strictly greater than the threshold.

A weight array with one fewer axis than `predictions` holds one weight per row.
*/
pub fn confusion_counts(
	thresholds: &[f32],
	selection: Selection,
	input: ConfusionInput,
) -> Result<ConfusionCounts, FMeasureError> {
	let ConfusionInput {
		labels,
		predictions,
		sample_weight,
	} = input;
	if labels.shape() != predictions.shape() {
		return Err(FMeasureError::Shape(format!(
			"labels have shape {:?} but predictions have shape {:?}",
			labels.shape(),
			predictions.shape()
		)));
	}
	if predictions.ndim() == 0 {
		return Err(FMeasureError::Shape(
			"predictions must have at least one axis".to_owned(),
		));
	}
	if predictions.iter().any(|p| !(0.0..=1.0).contains(p)) {
		return Err(FMeasureError::InvalidInput(
			"predictions must be in [0, 1]".to_owned(),
		));
	}
	let n_classes = predictions.shape()[predictions.ndim() - 1];
	if let Some(class_id) = selection.class_id {
		if class_id >= n_classes {
			return Err(FMeasureError::Shape(format!(
				"class_id {} is out of bounds for {} classes",
				class_id, n_classes
			)));
		}
	}
	let unit_weight = arr0(1.0f32).into_dyn();
	let sample_weight: Option<ArrayViewD<'_, f32>> = sample_weight.map(|w| w.reborrow());
	let weights = sample_weight.unwrap_or_else(|| unit_weight.view());
	let weights = if weights.ndim() + 1 == predictions.ndim() {
		let axis = Axis(weights.ndim());
		weights.insert_axis(axis)
	} else {
		weights
	};
	let weights = weights.broadcast(predictions.shape()).ok_or_else(|| {
		FMeasureError::Shape(format!(
			"sample_weight with shape {:?} cannot be broadcast to shape {:?}",
			weights.shape(),
			predictions.shape()
		))
	})?;
	if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
		return Err(FMeasureError::InvalidInput(
			"sample weights must be finite and non-negative".to_owned(),
		));
	}
	let columns = match selection.class_id {
		Some(class_id) => class_id..class_id + 1,
		None => 0..n_classes,
	};
	let mut counts = ConfusionCounts::zeros(thresholds.len());
	let mut kept = vec![true; n_classes];
	let mut order = Vec::with_capacity(n_classes);
	for (labels, scores, weights) in izip!(
		labels.genrows(),
		predictions.genrows(),
		weights.genrows()
	) {
		if let Some(top_k) = selection.top_k {
			select_top_k(scores, top_k, &mut order, &mut kept);
		}
		for column in columns.clone() {
			let is_positive = labels[column] != 0.0;
			let weight = f64::from(weights[column]);
			for (threshold_index, &threshold) in thresholds.iter().enumerate() {
				let predicted_positive = kept[column] && scores[column] > threshold;
				match (predicted_positive, is_positive) {
					(true, true) => counts.true_positives[threshold_index] += weight,
					(true, false) => counts.false_positives[threshold_index] += weight,
					(false, true) => counts.false_negatives[threshold_index] += weight,
					(false, false) => {}
				}
			}
		}
	}
	Ok(counts)
}

/// Mark the `top_k` highest scores in `kept`. `sort_by` is stable, so of two equal scores the one with the lower index comes first.
fn select_top_k(scores: ArrayView1<f32>, top_k: usize, order: &mut Vec<usize>, kept: &mut [bool]) {
	order.clear();
	order.extend(0..scores.len());
	order.sort_by(|&a, &b| {
		scores[b]
			.partial_cmp(&scores[a])
			.unwrap_or(Ordering::Equal)
	});
	kept.iter_mut().for_each(|kept| *kept = false);
	for &index in order.iter().take(top_k) {
		kept[index] = true;
	}
}

#[cfg(test)]
fn count(
	thresholds: &[f32],
	selection: Selection,
	labels: ArrayD<f32>,
	predictions: ArrayD<f32>,
	sample_weight: Option<ArrayD<f32>>,
) -> Result<ConfusionCounts, FMeasureError> {
	confusion_counts(
		thresholds,
		selection,
		ConfusionInput {
			labels: labels.view(),
			predictions: predictions.view(),
			sample_weight: sample_weight.as_ref().map(|w| w.view()),
		},
	)
}

#[test]
fn test_thresholds() {
	let counts = count(
		&[0.3, 0.5, 0.7],
		Selection::default(),
		arr1(&[1.0, 1.0, 0.0, 0.0]).into_dyn(),
		arr1(&[0.9, 0.6, 0.4, 0.1]).into_dyn(),
		None,
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[2.0, 2.0, 1.0]));
	assert_eq!(counts.false_positives, arr1(&[1.0, 0.0, 0.0]));
	assert_eq!(counts.false_negatives, arr1(&[0.0, 0.0, 1.0]));
}

#[test]
fn test_threshold_is_strict() {
	let counts = count(
		&[0.5],
		Selection::default(),
		arr1(&[1.0, 0.0]).into_dyn(),
		arr1(&[0.5, 0.5]).into_dyn(),
		None,
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[0.0]));
	assert_eq!(counts.false_positives, arr1(&[0.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
}

#[test]
fn test_top_k() {
	let labels = arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]).into_dyn();
	let predictions = arr2(&[[0.1, 0.7, 0.2], [0.3, 0.3, 0.4]]).into_dyn();
	let counts = count(
		&[std::f32::NEG_INFINITY],
		Selection {
			top_k: Some(1),
			class_id: None,
		},
		labels.clone(),
		predictions.clone(),
		None,
	)
	.unwrap();
	// row 0 keeps class 1, row 1 keeps class 2
	assert_eq!(counts.true_positives, arr1(&[1.0]));
	assert_eq!(counts.false_positives, arr1(&[1.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
	// with k = 2 the tie in row 1 goes to class 0
	let counts = count(
		&[std::f32::NEG_INFINITY],
		Selection {
			top_k: Some(2),
			class_id: None,
		},
		labels,
		predictions,
		None,
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[2.0]));
	assert_eq!(counts.false_positives, arr1(&[2.0]));
	assert_eq!(counts.false_negatives, arr1(&[0.0]));
}

#[test]
fn test_top_k_and_thresholds_intersect() {
	let counts = count(
		&[0.5],
		Selection {
			top_k: Some(2),
			class_id: None,
		},
		arr2(&[[1.0, 1.0, 1.0]]).into_dyn(),
		arr2(&[[0.9, 0.4, 0.8]]).into_dyn(),
		None,
	)
	.unwrap();
	// 0.9 and 0.8 are in the top 2 and above 0.5, 0.4 is neither
	assert_eq!(counts.true_positives, arr1(&[2.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
	let counts = count(
		&[0.85],
		Selection {
			top_k: Some(2),
			class_id: None,
		},
		arr2(&[[1.0, 1.0, 1.0]]).into_dyn(),
		arr2(&[[0.9, 0.4, 0.8]]).into_dyn(),
		None,
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[1.0]));
	assert_eq!(counts.false_negatives, arr1(&[2.0]));
}

#[test]
fn test_class_id() {
	let labels = arr2(&[[0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]).into_dyn();
	let predictions = arr2(&[[0.2, 0.8], [0.9, 0.6], [0.7, 0.3]]).into_dyn();
	let counts = count(
		&[0.5],
		Selection {
			top_k: None,
			class_id: Some(1),
		},
		labels.clone(),
		predictions.clone(),
		None,
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[1.0]));
	assert_eq!(counts.false_positives, arr1(&[1.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
	// top_k is applied before the class is selected
	let counts = count(
		&[0.5],
		Selection {
			top_k: Some(1),
			class_id: Some(1),
		},
		labels,
		predictions,
		None,
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[1.0]));
	assert_eq!(counts.false_positives, arr1(&[0.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
}

#[test]
fn test_sample_weight() {
	let labels = arr1(&[1.0, 0.0, 1.0]).into_dyn();
	let predictions = arr1(&[0.9, 0.8, 0.1]).into_dyn();
	let counts = count(
		&[0.5],
		Selection::default(),
		labels.clone(),
		predictions.clone(),
		Some(arr1(&[2.0, 1.0, 1.0]).into_dyn()),
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[2.0]));
	assert_eq!(counts.false_positives, arr1(&[1.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
	let counts = count(
		&[0.5],
		Selection::default(),
		labels,
		predictions,
		Some(arr0(0.5).into_dyn()),
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[0.5]));
	assert_eq!(counts.false_positives, arr1(&[0.5]));
	assert_eq!(counts.false_negatives, arr1(&[0.5]));
}

#[test]
fn test_per_example_weight() {
	let labels = arr2(&[[1.0, 0.0], [0.0, 1.0]]).into_dyn();
	let predictions = arr2(&[[0.9, 0.8], [0.1, 0.2]]).into_dyn();
	let counts = count(
		&[0.5],
		Selection::default(),
		labels,
		predictions,
		Some(arr1(&[3.0, 1.0]).into_dyn()),
	)
	.unwrap();
	assert_eq!(counts.true_positives, arr1(&[3.0]));
	assert_eq!(counts.false_positives, arr1(&[3.0]));
	assert_eq!(counts.false_negatives, arr1(&[1.0]));
}

#[test]
fn test_shape_errors() {
	let error = count(
		&[0.5],
		Selection::default(),
		arr1(&[1.0, 0.0]).into_dyn(),
		arr1(&[0.9, 0.8, 0.1]).into_dyn(),
		None,
	)
	.unwrap_err();
	assert_eq!(
		error.to_string(),
		"incompatible shapes: labels have shape [2] but predictions have shape [3]"
	);
	let error = count(
		&[0.5],
		Selection::default(),
		arr2(&[[1.0, 0.0], [0.0, 1.0]]).into_dyn(),
		arr2(&[[0.9, 0.8], [0.1, 0.2]]).into_dyn(),
		Some(arr1(&[1.0, 1.0, 1.0]).into_dyn()),
	)
	.unwrap_err();
	assert_eq!(
		error.to_string(),
		"incompatible shapes: sample_weight with shape [3, 1] cannot be broadcast to shape [2, 2]"
	);
	let error = count(
		&[0.5],
		Selection {
			top_k: None,
			class_id: Some(2),
		},
		arr2(&[[1.0, 0.0]]).into_dyn(),
		arr2(&[[0.9, 0.8]]).into_dyn(),
		None,
	)
	.unwrap_err();
	assert!(matches!(error, FMeasureError::Shape(_)));
}

#[test]
fn test_invalid_values() {
	let error = count(
		&[0.5],
		Selection::default(),
		arr1(&[1.0, 0.0]).into_dyn(),
		arr1(&[1.5, 0.2]).into_dyn(),
		None,
	)
	.unwrap_err();
	assert_eq!(
		error,
		FMeasureError::InvalidInput("predictions must be in [0, 1]".to_owned())
	);
	let error = count(
		&[0.5],
		Selection::default(),
		arr1(&[1.0, 0.0]).into_dyn(),
		arr1(&[0.5, 0.2]).into_dyn(),
		Some(arr1(&[1.0, -1.0]).into_dyn()),
	)
	.unwrap_err();
	assert!(matches!(error, FMeasureError::InvalidInput(_)));
}
