//! LLM-backed collaborators for the practitioner ranking engine: the
//! provider abstraction, query understanding (§4.1), and the V6
//! fit-evaluator boundary (§4.5). Kept separate from `ranker-core` so
//! the core ranking algorithms have no dependency on an LLM client.

pub mod fit_evaluator;
pub mod provider;
pub mod query_understanding;
pub mod stub;

pub use fit_evaluator::LlmFitEvaluator;
pub use provider::{create_llm_provider_from_env, LlmProvider};
pub use query_understanding::understand_query;
