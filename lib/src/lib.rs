//! Knowledge-graph completeness validation over remote SPARQL endpoints.
#![deny(clippy::all)]

pub mod assemble;
pub mod derive;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod report;
pub mod results;
pub mod shapes;
pub mod tabular;
pub mod types;

pub use endpoint::{Backoff, CancelToken, EndpointClient, QueryService, RetryPolicy};
pub use engine::{ConstraintEngine, MinCountEngine, ValidationOutcome};
pub use error::{CompletenessError, Result};
pub use fetch::WindowedFetcher;
pub use pipeline::{Pipeline, PipelineConfig};
pub use report::{aggregate, CompletenessMatrix};
pub use results::{BindingValue, ResultTable};
pub use shapes::{build_shape, ShapeDocument, ShapeTarget};
pub use types::{ConstraintViolation, EntityRef, Prefixes, PropertyConstraint, PropertyRef};
