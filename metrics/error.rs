use thiserror::Error;

/// The errors produced while configuring or updating a metric.
///
/// A zero denominator in precision, recall or the f-measure is not an error. Those values are defined to be 0.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FMeasureError {
	/// The constructor or merge parameters are contradictory or out of range.
	#[error("invalid configuration: {0}")]
	Configuration(String),
	/// The arrays passed to `update()` or restored from a state do not have compatible shapes.
	#[error("incompatible shapes: {0}")]
	Shape(String),
	/// A prediction, weight or counter value is outside its allowed range.
	#[error("invalid input: {0}")]
	InvalidInput(String),
}
