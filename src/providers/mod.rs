//! Concrete provider adapters (spec.md §4.1). Wire-format fidelity to any
//! one upstream is explicitly out of scope; these are minimal, correct
//! translations into the normalized [`crate::domain`] model.

pub mod arxiv;
pub mod exa;
pub mod semantic_scholar;
pub mod tavily;
pub mod traits;

pub use arxiv::ArxivAdapter;
pub use exa::ExaAdapter;
pub use semantic_scholar::SemanticScholarAdapter;
pub use tavily::TavilyAdapter;
pub use traits::{ProviderAdapter, ProviderCapabilities, ProviderMetrics};
