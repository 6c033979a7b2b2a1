//! kubebdd - Behaviour-driven assertions for Kubernetes
//!
//! kubebdd turns natural-language assertion steps from Gherkin scenarios into
//! typed predicates and evaluates them against live cluster objects, either
//! until they become true (eventually) or for as long as a window lasts
//! (consistently).
//!
//! # Example (Rust)
//!
//! ```no_run
//! use kubebdd::resolver::KubeResolver;
//! use kubebdd::scenario::Scenario;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     kubebdd::telemetry::init_logging();
//!
//!     let config = kubebdd::PollConfig::from_env()?;
//!     let resolver = Arc::new(KubeResolver::try_default().await?);
//!     let mut scenario = Scenario::new(resolver).with_config(config);
//!
//!     scenario.register_manifest("web", "
//! apiVersion: apps/v1
//! kind: Deployment
//! metadata:
//!   name: web
//!   namespace: default
//! ")?;
//!
//!     scenario
//!         .run_step("within 2m, web's '.status.readyReplicas' should be >= 3")
//!         .await?;
//!     scenario
//!         .run_step("for at least 30s, web's '.status.unavailableReplicas' should not be > 0")
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Step forms
//!
//! ```text
//! [within|in less than|in under|in no more than|at least] <duration>, <ref>'s '<path>' should [not] <phrase>
//! [for at least|for no less than] <duration>, <ref>'s '<path>' should [not] <phrase>
//! ```
//!
//! Phrases: `equal X`, `be an element of X Y ...`, `consist of X Y ...`,
//! `be <op> N` with op one of `== != = < <= > >= ~`, `be true`, `be false`,
//! `contain X`, `have prefix X`, `have suffix X`, `match regex X`,
//! `have length N`.

pub mod assertions;
pub mod config;
pub mod eventually;
pub mod extract;
pub mod grammar;
pub mod matcher;
pub mod registry;
pub mod resolver;
pub mod scenario;
pub mod step;
pub mod telemetry;
pub mod value;

// Re-export commonly used types
pub use assertions::{evaluate_assertion, AssertionError};
pub use config::{ConfigError, PollConfig};
pub use eventually::{
    evaluate, AssertionOutcome, ConditionError, Discipline, FetchError, PollFailure, PollSpec,
};
pub use extract::{ExtractError, Extractor, JsonPath};
pub use grammar::{CompileError, ComparatorKind, Grammar, GrammarError, NumericOp, Predicate};
pub use matcher::MatchError;
pub use registry::{ObjectRef, ObjectRegistry, RegistryError};
pub use resolver::{InMemoryResolver, KubeResolver, ResourceResolver};
pub use scenario::Scenario;
pub use step::{AssertionStep, StepError};
pub use telemetry::init_logging;
pub use value::{coerce, coerce_words, CoercionError, TypedValue};
