pub mod error;
pub mod frequency;
pub mod graph;
pub mod handlers;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod provider;
pub mod rate_limit;
pub mod rules;
pub mod titles;

pub use error::DerivationError;
pub use graph::{RelationGraph, WordNetGraph, expand_closure};
pub use handlers::{AppState, router};
pub use model::{DerivationItem, DerivationsGrouped, Source, Titles, WordResponse};
pub use pipeline::{DerivationEngine, DerivationRequest, EngineSettings};
pub use provider::{GraphLoader, GraphProvider, WordNetLoader};
