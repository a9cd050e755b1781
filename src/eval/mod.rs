//! Bootstrap evaluation with embedding-similarity annotation transfer
//!
//! ## Architecture
//!
//! - `bootstrap`: injectable [`Resampler`]s and NaN-aware reductions
//! - `transfer`: nearest-neighbor lookup, cutoff calibration, partitioning
//! - `evaluator`: [`Evaluator`] combining transfer, model predictions and resampling
//! - `report`: [`EvaluationResult`] and its `evaluation_<name>.{txt,json}` files
//!
//! ## Example
//!
//! ```ignore
//! use subloc::eval::{BootstrapResampler, Evaluator, EvaluatorOptions};
//!
//! let evaluator = Evaluator::new(EvaluatorOptions { n_draws: 100, ..Default::default() });
//! let result = evaluator.evaluate(model.as_mut(), &test_store, None, &mut BootstrapResampler::new(0))?;
//! println!("{result}");
//! ```

mod bootstrap;
mod evaluator;
mod report;
mod transfer;

pub use bootstrap::{nan_mean, nan_mean_std_columns, nan_std, BootstrapResampler, IdentityResampler, Resampler};
pub use evaluator::{Evaluator, EvaluatorOptions};
pub use report::{EvaluationResult, TransferSummary};
pub use transfer::{DistanceMetric, LookupIndex, Neighbor, TransferPartition, Transferred};
