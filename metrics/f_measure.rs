use super::{
	confusion_counts, ConfusionCounts, ConfusionInput, FMeasureError, FMeasureOptions, Selection,
	StreamingMetric,
};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::Float;

/**
`FMeasure` accumulates true positives, false positives and false negatives for each of its thresholds and computes the f-measure, the harmonic mean of precision and recall, from them.

```
use fmeasure_metrics::{FMeasure, FMeasureInput, FMeasureOptions, FMeasureOutput, StreamingMetric};
use ndarray::prelude::*;

let options = FMeasureOptions::default().with_thresholds(vec![0.3, 0.5, 0.7]);
let mut metric = FMeasure::new(options).unwrap();
let labels = arr1(&[1.0, 1.0, 0.0, 0.0]).into_dyn();
let predictions = arr1(&[0.9, 0.6, 0.4, 0.1]).into_dyn();
metric
	.update(FMeasureInput {
		labels: labels.view(),
		predictions: predictions.view(),
		sample_weight: None,
	})
	.unwrap();
assert_eq!(metric.result().values()[1], 1.0);
```
*/
#[derive(Debug, Clone)]
pub struct FMeasure {
	options: FMeasureOptions,
	thresholds: Vec<f32>,
	counts: ConfusionCounts,
}

/// The input to [FMeasure](struct.FMeasure.html). See [`confusion_counts`](fn.confusion_counts.html) for how the arrays are interpreted.
pub type FMeasureInput<'a> = ConfusionInput<'a>;

/// The output from [FMeasure](struct.FMeasure.html). A metric with a single threshold produces a `Scalar`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FMeasureOutput {
	Scalar(f32),
	PerThreshold(Vec<f32>),
}

impl FMeasureOutput {
	/// The f-measure for each threshold, in threshold order.
	pub fn values(&self) -> &[f32] {
		match self {
			FMeasureOutput::Scalar(value) => std::slice::from_ref(value),
			FMeasureOutput::PerThreshold(values) => values,
		}
	}
}

/// The checkpointable state of an [FMeasure](struct.FMeasure.html): the options it was constructed with and its counters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FMeasureState {
	pub options: FMeasureOptions,
	pub true_positives: Vec<f64>,
	pub false_positives: Vec<f64>,
	pub false_negatives: Vec<f64>,
}

impl Default for FMeasure {
	fn default() -> Self {
		Self {
			options: FMeasureOptions::default(),
			thresholds: vec![super::DEFAULT_THRESHOLD],
			counts: ConfusionCounts::zeros(1),
		}
	}
}

impl FMeasure {
	pub fn new(options: FMeasureOptions) -> Result<Self, FMeasureError> {
		let thresholds = options.resolve_thresholds()?;
		let counts = ConfusionCounts::zeros(thresholds.len());
		Ok(Self {
			options,
			thresholds,
			counts,
		})
	}

	/// Rebuild a metric from a state previously produced by [`state()`](#method.state).
	pub fn from_state(state: FMeasureState) -> Result<Self, FMeasureError> {
		let mut metric = Self::new(state.options.clone())?;
		metric.load_state(state)?;
		Ok(metric)
	}

	pub fn state(&self) -> FMeasureState {
		FMeasureState {
			options: self.options.clone(),
			true_positives: self.counts.true_positives.to_vec(),
			false_positives: self.counts.false_positives.to_vec(),
			false_negatives: self.counts.false_negatives.to_vec(),
		}
	}

	/// Restore the counters from `state`, which must have been produced by a metric with the same thresholds, `top_k` and `class_id`.
	pub fn load_state(&mut self, state: FMeasureState) -> Result<(), FMeasureError> {
		let FMeasureState {
			options,
			true_positives,
			false_positives,
			false_negatives,
		} = state;
		if options.resolve_thresholds()? != self.thresholds
			|| options.top_k != self.options.top_k
			|| options.class_id != self.options.class_id
		{
			return Err(FMeasureError::Configuration(
				"the state was produced by a metric with different options".to_owned(),
			));
		}
		let n_thresholds = self.thresholds.len();
		for (name, counter) in &[
			("true_positives", &true_positives),
			("false_positives", &false_positives),
			("false_negatives", &false_negatives),
		] {
			if counter.len() != n_thresholds {
				return Err(FMeasureError::Shape(format!(
					"{} has {} entries but the metric has {} thresholds",
					name,
					counter.len(),
					n_thresholds
				)));
			}
			if counter.iter().any(|c| !c.is_finite() || *c < 0.0) {
				return Err(FMeasureError::InvalidInput(format!(
					"{} must be finite and non-negative",
					name
				)));
			}
		}
		self.counts = ConfusionCounts {
			true_positives: Array1::from(true_positives),
			false_positives: Array1::from(false_positives),
			false_negatives: Array1::from(false_negatives),
		};
		Ok(())
	}

	pub fn options(&self) -> &FMeasureOptions {
		&self.options
	}

	pub fn name(&self) -> &str {
		self.options.name()
	}

	pub fn thresholds(&self) -> &[f32] {
		&self.thresholds
	}

	pub fn top_k(&self) -> Option<usize> {
		self.options.top_k
	}

	pub fn class_id(&self) -> Option<usize> {
		self.options.class_id
	}

	pub fn counts(&self) -> &ConfusionCounts {
		&self.counts
	}

	/// precision = tp / (tp + fp), or 0 when there are no predicted positives.
	pub fn precision(&self) -> Array1<f64> {
		self.counts
			.true_positives
			.iter()
			.zip(self.counts.false_positives.iter())
			.map(|(&tp, &fp)| div_no_nan(tp, tp + fp))
			.collect()
	}

	/// recall = tp / (tp + fn), or 0 when there are no positive labels.
	pub fn recall(&self) -> Array1<f64> {
		self.counts
			.true_positives
			.iter()
			.zip(self.counts.false_negatives.iter())
			.map(|(&tp, &fn_)| div_no_nan(tp, tp + fn_))
			.collect()
	}

	fn selection(&self) -> Selection {
		Selection {
			top_k: self.options.top_k,
			class_id: self.options.class_id,
		}
	}
}

impl<'a> StreamingMetric<'a> for FMeasure {
	type Input = FMeasureInput<'a>;
	type Output = FMeasureOutput;
	type Error = FMeasureError;

	fn update(&mut self, input: FMeasureInput<'a>) -> Result<(), FMeasureError> {
		let batch_shape = input.predictions.shape().to_owned();
		let counts = confusion_counts(&self.thresholds, self.selection(), input)?;
		log::debug!(
			"{}: counted batch with shape {:?}, tp {} fp {} fn {}",
			self.name(),
			batch_shape,
			counts.true_positives,
			counts.false_positives,
			counts.false_negatives,
		);
		self.counts.add(&counts);
		Ok(())
	}

	fn merge(&mut self, other: Self) -> Result<(), FMeasureError> {
		if other.thresholds != self.thresholds || other.selection() != self.selection() {
			return Err(FMeasureError::Configuration(
				"cannot merge f-measures with different thresholds, top_k or class_id".to_owned(),
			));
		}
		self.counts.add(&other.counts);
		Ok(())
	}

	fn result(&self) -> FMeasureOutput {
		let values: Vec<f32> = izip!(self.precision().iter(), self.recall().iter())
			.map(|(&precision, &recall)| {
				div_no_nan(2.0 * precision * recall, precision + recall) as f32
			})
			.collect();
		if values.len() == 1 {
			FMeasureOutput::Scalar(values[0])
		} else {
			FMeasureOutput::PerThreshold(values)
		}
	}

	fn reset(&mut self) {
		self.counts.clear();
	}
}

/// Divide `numerator` by `denominator`, producing 0 instead of NaN or infinity when the denominator is 0.
pub fn div_no_nan<T: Float>(numerator: T, denominator: T) -> T {
	if denominator.is_zero() {
		T::zero()
	} else {
		numerator / denominator
	}
}

#[cfg(test)]
fn metric_with_counts(true_positives: f64, false_positives: f64, false_negatives: f64) -> FMeasure {
	FMeasure::from_state(FMeasureState {
		options: FMeasureOptions::default(),
		true_positives: vec![true_positives],
		false_positives: vec![false_positives],
		false_negatives: vec![false_negatives],
	})
	.unwrap()
}

#[cfg(test)]
fn update(
	metric: &mut FMeasure,
	labels: &ArrayD<f32>,
	predictions: &ArrayD<f32>,
	sample_weight: Option<&ArrayD<f32>>,
) -> Result<(), FMeasureError> {
	metric.update(FMeasureInput {
		labels: labels.view(),
		predictions: predictions.view(),
		sample_weight: sample_weight.map(|w| w.view()),
	})
}

#[test]
fn test_injected_counts() {
	let metric = metric_with_counts(3.0, 1.0, 1.0);
	assert_eq!(metric.precision(), arr1(&[0.75]));
	assert_eq!(metric.recall(), arr1(&[0.75]));
	assert_eq!(metric.result(), FMeasureOutput::Scalar(0.75));
	let metric = metric_with_counts(2.0, 0.0, 2.0);
	assert_eq!(metric.precision(), arr1(&[1.0]));
	assert_eq!(metric.recall(), arr1(&[0.5]));
	assert!((metric.result().values()[0] - 2.0 / 3.0).abs() < 1e-6);
}

#[test]
fn test_zero_division() {
	let metric = metric_with_counts(0.0, 0.0, 0.0);
	assert_eq!(metric.precision(), arr1(&[0.0]));
	assert_eq!(metric.recall(), arr1(&[0.0]));
	assert_eq!(metric.result(), FMeasureOutput::Scalar(0.0));
	// precision and recall are both 0 without a zero denominator
	let metric = metric_with_counts(0.0, 4.0, 2.0);
	assert_eq!(metric.result(), FMeasureOutput::Scalar(0.0));
	let metric = FMeasure::default();
	assert_eq!(metric.result(), FMeasureOutput::Scalar(0.0));
	assert_eq!(div_no_nan(1.0f32, 0.0), 0.0);
}

#[test]
fn test_multiple_thresholds() {
	let mut metric =
		FMeasure::new(FMeasureOptions::default().with_thresholds(vec![0.3, 0.5, 0.7])).unwrap();
	let labels = arr1(&[1.0, 1.0, 0.0, 0.0]).into_dyn();
	let predictions = arr1(&[0.9, 0.6, 0.4, 0.1]).into_dyn();
	update(&mut metric, &labels, &predictions, None).unwrap();
	let values = match metric.result() {
		FMeasureOutput::PerThreshold(values) => values,
		output => panic!("expected one value per threshold, got {:?}", output),
	};
	assert_eq!(values.len(), 3);
	assert!((values[0] - 0.8).abs() < 1e-6);
	assert!((values[1] - 1.0).abs() < 1e-6);
	assert!((values[2] - 2.0 / 3.0).abs() < 1e-6);
	insta::assert_debug_snapshot!(metric.state(), @r###"
 FMeasureState {
     options: FMeasureOptions {
         thresholds: Some(
             Multiple(
                 [
                     0.3,
                     0.5,
                     0.7,
                 ],
             ),
         ),
         top_k: None,
         class_id: None,
         name: None,
     },
     true_positives: [
         2.0,
         2.0,
         1.0,
     ],
     false_positives: [
         1.0,
         0.0,
         0.0,
     ],
     false_negatives: [
         0.0,
         0.0,
         1.0,
     ],
 }
 "###);
}

#[test]
fn test_order_independence() {
	let labels = arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]).into_dyn();
	let predictions = arr2(&[[0.8, 0.3], [0.6, 0.4], [0.2, 0.9], [0.7, 0.1]]).into_dyn();
	let weights = arr1(&[1.0, 2.0, 0.5, 3.0]).into_dyn();
	let options = FMeasureOptions::default().with_thresholds(vec![0.25, 0.5, 0.75]);
	let mut whole = FMeasure::new(options.clone()).unwrap();
	update(&mut whole, &labels, &predictions, Some(&weights)).unwrap();
	for split in 0..=4 {
		let mut parts = FMeasure::new(options.clone()).unwrap();
		let (labels_a, labels_b) = labels.view().split_at(Axis(0), split);
		let (predictions_a, predictions_b) = predictions.view().split_at(Axis(0), split);
		let (weights_a, weights_b) = weights.view().split_at(Axis(0), split);
		parts
			.update(FMeasureInput {
				labels: labels_a,
				predictions: predictions_a,
				sample_weight: Some(weights_a),
			})
			.unwrap();
		parts
			.update(FMeasureInput {
				labels: labels_b,
				predictions: predictions_b,
				sample_weight: Some(weights_b),
			})
			.unwrap();
		assert_eq!(parts.counts(), whole.counts());
		assert_eq!(parts.result(), whole.result());
	}
}

#[test]
fn test_reset() {
	let mut metric = FMeasure::new(FMeasureOptions::default().with_thresholds(vec![0.2, 0.6]))
		.unwrap();
	let labels = arr1(&[1.0, 0.0, 1.0]).into_dyn();
	let predictions = arr1(&[0.9, 0.7, 0.3]).into_dyn();
	update(&mut metric, &labels, &predictions, None).unwrap();
	assert_ne!(metric.result(), FMeasureOutput::PerThreshold(vec![0.0, 0.0]));
	metric.reset();
	assert_eq!(metric.counts(), &ConfusionCounts::zeros(2));
	assert_eq!(metric.result(), FMeasureOutput::PerThreshold(vec![0.0, 0.0]));
	metric.reset();
	assert_eq!(metric.counts(), &ConfusionCounts::zeros(2));
	assert_eq!(metric.thresholds(), &[0.2, 0.6]);
}

#[test]
fn test_sample_weight_doubles_contribution() {
	let labels = arr1(&[1.0, 0.0, 1.0]).into_dyn();
	let predictions = arr1(&[0.9, 0.7, 0.3]).into_dyn();
	let mut unweighted = FMeasure::default();
	update(&mut unweighted, &labels, &predictions, None).unwrap();
	let mut weighted = FMeasure::default();
	let weights = arr1(&[1.0, 2.0, 1.0]).into_dyn();
	update(&mut weighted, &labels, &predictions, Some(&weights)).unwrap();
	assert_eq!(
		weighted.counts().true_positives,
		unweighted.counts().true_positives
	);
	assert_eq!(
		weighted.counts().false_positives,
		&unweighted.counts().false_positives * 2.0
	);
	assert_eq!(
		weighted.counts().false_negatives,
		unweighted.counts().false_negatives
	);
}

#[test]
fn test_idempotent_result() {
	let mut metric = FMeasure::default();
	let labels = arr2(&[[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).into_dyn();
	let predictions = arr2(&[[0.6, 0.3, 0.1], [0.5, 0.1, 0.4]]).into_dyn();
	update(&mut metric, &labels, &predictions, None).unwrap();
	let first = metric.result();
	let second = metric.result();
	assert_eq!(first, second);
	assert_eq!(metric.counts().true_positives, arr1(&[1.0]));
}

#[test]
fn test_top_k_default_threshold() {
	let mut metric = FMeasure::new(FMeasureOptions::default().with_top_k(1)).unwrap();
	assert_eq!(metric.thresholds(), &[std::f32::NEG_INFINITY]);
	let labels = arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]).into_dyn();
	let predictions = arr2(&[[0.1, 0.2, 0.05], [0.1, 0.2, 0.05]]).into_dyn();
	update(&mut metric, &labels, &predictions, None).unwrap();
	// every top scoring class is predicted positive, however low its score
	assert_eq!(metric.counts().true_positives, arr1(&[1.0]));
	assert_eq!(metric.counts().false_positives, arr1(&[1.0]));
	assert_eq!(metric.counts().false_negatives, arr1(&[1.0]));
	assert_eq!(metric.result(), FMeasureOutput::Scalar(0.5));
}

#[test]
fn test_failed_update_leaves_counters() {
	let mut metric = FMeasure::default();
	let labels = arr1(&[1.0, 0.0]).into_dyn();
	let predictions = arr1(&[0.9, 0.7]).into_dyn();
	update(&mut metric, &labels, &predictions, None).unwrap();
	let before = metric.state();
	let bad_predictions = arr1(&[0.9, 0.7, 0.1]).into_dyn();
	let error = update(&mut metric, &labels, &bad_predictions, None).unwrap_err();
	assert!(matches!(error, FMeasureError::Shape(_)));
	let bad_weights = arr1(&[1.0, 1.0, 1.0]).into_dyn();
	let error = update(&mut metric, &labels, &predictions, Some(&bad_weights)).unwrap_err();
	assert!(matches!(error, FMeasureError::Shape(_)));
	assert_eq!(metric.state(), before);
}

#[test]
fn test_merge() {
	let options = FMeasureOptions::default().with_thresholds(vec![0.4, 0.8]);
	let labels_a = arr1(&[1.0, 0.0, 1.0]).into_dyn();
	let predictions_a = arr1(&[0.9, 0.5, 0.3]).into_dyn();
	let labels_b = arr1(&[0.0, 1.0]).into_dyn();
	let predictions_b = arr1(&[0.85, 0.6]).into_dyn();
	let mut a = FMeasure::new(options.clone()).unwrap();
	update(&mut a, &labels_a, &predictions_a, None).unwrap();
	let mut b = FMeasure::new(options.clone()).unwrap();
	update(&mut b, &labels_b, &predictions_b, None).unwrap();
	let mut sequential = FMeasure::new(options).unwrap();
	update(&mut sequential, &labels_a, &predictions_a, None).unwrap();
	update(&mut sequential, &labels_b, &predictions_b, None).unwrap();
	a.merge(b).unwrap();
	assert_eq!(a.counts(), sequential.counts());
	let error = a.merge(FMeasure::default()).unwrap_err();
	assert_eq!(
		error.to_string(),
		"invalid configuration: cannot merge f-measures with different thresholds, top_k or class_id"
	);
}

#[test]
fn test_state_round_trip() {
	let options = FMeasureOptions::default()
		.with_thresholds(vec![0.3, 0.6])
		.with_class_id(1)
		.with_name("f1_class_1");
	let mut metric = FMeasure::new(options).unwrap();
	let labels = arr2(&[[0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]).into_dyn();
	let predictions = arr2(&[[0.2, 0.8], [0.9, 0.4], [0.7, 0.5]]).into_dyn();
	update(&mut metric, &labels, &predictions, None).unwrap();
	let json = serde_json::to_string(&metric.state()).unwrap();
	let state: FMeasureState = serde_json::from_str(&json).unwrap();
	let restored = FMeasure::from_state(state).unwrap();
	assert_eq!(restored.name(), "f1_class_1");
	assert_eq!(restored.class_id(), Some(1));
	assert_eq!(restored.counts(), metric.counts());
	assert_eq!(restored.result(), metric.result());
	let mut other = FMeasure::default();
	let error = other.load_state(metric.state()).unwrap_err();
	assert!(matches!(error, FMeasureError::Configuration(_)));
}

#[test]
fn test_invalid_state() {
	let mut state = metric_with_counts(1.0, 1.0, 1.0).state();
	state.false_negatives = vec![1.0, 2.0];
	assert_eq!(
		FMeasure::from_state(state.clone()).unwrap_err().to_string(),
		"incompatible shapes: false_negatives has 2 entries but the metric has 1 thresholds"
	);
	state.false_negatives = vec![-1.0];
	assert!(matches!(
		FMeasure::from_state(state).unwrap_err(),
		FMeasureError::InvalidInput(_)
	));
}
