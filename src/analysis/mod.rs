//! The analysis pipeline: model invocation per modality and normalization
//! of the raw model output into a typed report.

pub mod guidelines;
mod invoker;
mod normalizer;
mod report;
mod scrape;

pub use invoker::{InvokeError, ModelInvoker};
pub use normalizer::{NormalizeError, ResponseNormalizer};
pub use report::{AnalysisReport, ReviewStatus};
pub use scrape::normalize_url;
