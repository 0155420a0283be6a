/*!
This module defines the `FMeasureOptions` struct, which is used to configure an [`FMeasure`](../struct.FMeasure.html) when it is constructed.
*/

use super::FMeasureError;

/// The threshold used when neither thresholds nor `top_k` are given.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// The threshold used when `top_k` is given without thresholds. Every score kept by the top k selection exceeds it.
pub const NO_THRESHOLD: f32 = std::f32::NEG_INFINITY;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FMeasureOptions {
	pub thresholds: Option<Thresholds>,
	pub top_k: Option<usize>,
	pub class_id: Option<usize>,
	pub name: Option<String>,
}

/// Thresholds can be given either as a single number or as a list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Thresholds {
	Single(f32),
	Multiple(Vec<f32>),
}

impl From<f32> for Thresholds {
	fn from(value: f32) -> Self {
		Thresholds::Single(value)
	}
}

impl From<Vec<f32>> for Thresholds {
	fn from(value: Vec<f32>) -> Self {
		Thresholds::Multiple(value)
	}
}

impl FMeasureOptions {
	pub fn with_thresholds(mut self, thresholds: impl Into<Thresholds>) -> Self {
		self.thresholds = Some(thresholds.into());
		self
	}

	pub fn with_top_k(mut self, top_k: usize) -> Self {
		self.top_k = Some(top_k);
		self
	}

	pub fn with_class_id(mut self, class_id: usize) -> Self {
		self.class_id = Some(class_id);
		self
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn name(&self) -> &str {
		self.name.as_deref().unwrap_or("f_measure")
	}

	/**
	Validate the options and produce the list of thresholds the metric will count against.

	When no thresholds are given this is `[0.5]`, or `[-inf]` if `top_k` is set. Explicit thresholds must lie in `[0, 1]`.
	*/
	pub fn resolve_thresholds(&self) -> Result<Vec<f32>, FMeasureError> {
		if self.top_k == Some(0) {
			return Err(FMeasureError::Configuration(
				"top_k must be a positive integer".to_owned(),
			));
		}
		let thresholds = match &self.thresholds {
			None => {
				let default_threshold = if self.top_k.is_some() {
					NO_THRESHOLD
				} else {
					DEFAULT_THRESHOLD
				};
				return Ok(vec![default_threshold]);
			}
			Some(Thresholds::Single(threshold)) => vec![*threshold],
			Some(Thresholds::Multiple(thresholds)) => thresholds.clone(),
		};
		if thresholds.is_empty() {
			return Err(FMeasureError::Configuration(
				"thresholds must not be empty".to_owned(),
			));
		}
		if let Some(threshold) = thresholds.iter().find(|t| !(0.0..=1.0).contains(*t)) {
			return Err(FMeasureError::Configuration(format!(
				"threshold values must be in [0, 1], got {}",
				threshold
			)));
		}
		if let Some(top_k) = self.top_k {
			log::warn!(
				"both thresholds and top_k were given, scores must be in the top {} and exceed the threshold to count as positive",
				top_k,
			);
		}
		Ok(thresholds)
	}
}

#[test]
fn test_default_thresholds() {
	let thresholds = FMeasureOptions::default().resolve_thresholds().unwrap();
	assert_eq!(thresholds, vec![0.5]);
	let thresholds = FMeasureOptions::default()
		.with_top_k(2)
		.resolve_thresholds()
		.unwrap();
	assert_eq!(thresholds, vec![std::f32::NEG_INFINITY]);
}

#[test]
fn test_explicit_thresholds() {
	let thresholds = FMeasureOptions::default()
		.with_thresholds(0.25)
		.resolve_thresholds()
		.unwrap();
	assert_eq!(thresholds, vec![0.25]);
	let thresholds = FMeasureOptions::default()
		.with_thresholds(vec![0.3, 0.5, 0.7])
		.with_top_k(1)
		.resolve_thresholds()
		.unwrap();
	assert_eq!(thresholds, vec![0.3, 0.5, 0.7]);
}

#[test]
fn test_invalid_options() {
	let error = FMeasureOptions::default()
		.with_top_k(0)
		.resolve_thresholds()
		.unwrap_err();
	assert_eq!(
		error.to_string(),
		"invalid configuration: top_k must be a positive integer"
	);
	let error = FMeasureOptions::default()
		.with_thresholds(Vec::new())
		.resolve_thresholds()
		.unwrap_err();
	assert_eq!(
		error.to_string(),
		"invalid configuration: thresholds must not be empty"
	);
	let error = FMeasureOptions::default()
		.with_thresholds(vec![0.5, 1.5])
		.resolve_thresholds()
		.unwrap_err();
	assert_eq!(
		error.to_string(),
		"invalid configuration: threshold values must be in [0, 1], got 1.5"
	);
	let error = FMeasureOptions::default()
		.with_thresholds(std::f32::NAN)
		.resolve_thresholds()
		.unwrap_err();
	assert!(matches!(error, FMeasureError::Configuration(_)));
}

#[test]
fn test_deserialize() {
	let options: FMeasureOptions =
		serde_json::from_str(r#"{ "thresholds": [0.3, 0.7], "class_id": 2 }"#).unwrap();
	assert_eq!(
		options,
		FMeasureOptions::default()
			.with_thresholds(vec![0.3, 0.7])
			.with_class_id(2)
	);
	let options: FMeasureOptions =
		serde_json::from_str(r#"{ "thresholds": 0.25, "top_k": 3, "name": "f1" }"#).unwrap();
	assert_eq!(options.thresholds, Some(Thresholds::Single(0.25)));
	assert_eq!(options.top_k, Some(3));
	assert_eq!(options.name(), "f1");
	let options: FMeasureOptions = serde_json::from_str("{}").unwrap();
	assert_eq!(options, FMeasureOptions::default());
	assert_eq!(options.name(), "f_measure");
}
