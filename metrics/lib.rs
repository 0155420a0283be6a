/*!
This crate defines the [`StreamingMetric`](trait.StreamingMetric.html) trait and the [`FMeasure`](struct.FMeasure.html) metric, which accumulates confusion counts over batches of predictions for one or more thresholds and computes the f-measure from them.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod confusion;
mod error;
mod f_measure;
mod options;

pub use self::confusion::{confusion_counts, ConfusionCounts, ConfusionInput, Selection};
pub use self::error::FMeasureError;
pub use self::f_measure::{div_no_nan, FMeasure, FMeasureInput, FMeasureOutput, FMeasureState};
pub use self::options::{FMeasureOptions, Thresholds, DEFAULT_THRESHOLD, NO_THRESHOLD};

/**
The `StreamingMetric` trait defines a common interface to metrics that are computed in a streaming manner, where the input is available in chunks, such as the f-measure of a classifier evaluated batch by batch.

After being initialized, a value of type `T` implementing the `StreamingMetric` trait can have `update()` called on it with values of the associated type `Input`. Multiple values of `T` can be merged together by calling `merge()`. This is useful when computing a metric across multiple threads. `result()` can be called at any point to produce the associated type `Output` from what has been aggregated so far, and `reset()` starts the aggregation over.

# Examples

Here is a basic example implementation of a `Max` metric, which takes `f32`s as input and produces an `f32` as output that is the maximum of all the inputs.

```
use fmeasure_metrics::StreamingMetric;

struct Max(f32);

impl StreamingMetric<'_> for Max {
	type Input = f32;
	type Output = f32;
	type Error = std::convert::Infallible;
	fn update(&mut self, input: Self::Input) -> Result<(), Self::Error> {
		self.0 = self.0.max(input);
		Ok(())
	}
	fn merge(&mut self, other: Self) -> Result<(), Self::Error> {
		self.0 = self.0.max(other.0);
		Ok(())
	}
	fn result(&self) -> Self::Output { self.0 }
	fn reset(&mut self) { self.0 = std::f32::NEG_INFINITY }
}
```

The seemingly unused generic lifetime `'a` exists here to allow `Input`s to borrow from their enclosing scope.
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `result()`.
	type Output;
	/// `Error` is returned when an input or another metric cannot be aggregated.
	type Error;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input) -> Result<(), Self::Error>;
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self) -> Result<(), Self::Error>;
	/// Produce an `Output` from everything aggregated since construction or the last `reset()`.
	fn result(&self) -> Self::Output;
	/// Discard everything aggregated so far.
	fn reset(&mut self);
}
