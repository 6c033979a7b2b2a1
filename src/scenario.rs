//! Scenario context for assertion steps
//!
//! A `Scenario` owns everything one Gherkin scenario needs to run its
//! assertion steps: the registry of named resources, the resolver that
//! fetches them, the extractor that narrows them to a field, the grammar,
//! poll defaults and the cancellation token that stops a running poll.
//!
//! # Example
//!
//! ```ignore
//! use kubebdd::resolver::KubeResolver;
//! use kubebdd::scenario::Scenario;
//! use std::sync::Arc;
//!
//! let mut scenario = Scenario::new(Arc::new(KubeResolver::try_default().await?));
//! scenario.register_manifest("foo", include_str!("pod.yaml"))?;
//!
//! scenario
//!     .run_step("within 1m, foo's '.status.phase' should equal Running")
//!     .await?;
//! scenario
//!     .run_step("for at least 10s, foo's '.status.containerStatuses[0].restartCount' should equal 0")
//!     .await?;
//! ```

use crate::assertions::AssertionError;
use crate::config::PollConfig;
use crate::eventually::{evaluate, AssertionOutcome, FetchError, PollSpec};
use crate::extract::{Extractor, JsonPath};
use crate::grammar::Grammar;
use crate::registry::{ObjectRef, ObjectRegistry, RegistryError};
use crate::resolver::ResourceResolver;
use crate::step::AssertionStep;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Per-scenario assertion context
pub struct Scenario {
    registry: ObjectRegistry,
    resolver: Arc<dyn ResourceResolver>,
    extractor: Arc<dyn Extractor>,
    grammar: Grammar,
    config: PollConfig,
    cancel: CancellationToken,
}

impl Scenario {
    /// Create a scenario with default poll settings and JSONPath extraction
    #[must_use]
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            resolver,
            extractor: Arc::new(JsonPath),
            grammar: Grammar::new(),
            config: PollConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the poll defaults
    #[must_use]
    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the path extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Use an externally owned cancellation token, e.g. a child of a
    /// run-wide token tied to Ctrl-C
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Register a reference under a logical name
    pub fn register(&mut self, name: impl Into<String>, object: ObjectRef) {
        self.registry.register(name, object);
    }

    /// Parse a manifest and register it under a logical name
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the manifest is invalid.
    pub fn register_manifest(
        &mut self,
        name: impl Into<String>,
        manifest: &str,
    ) -> Result<&ObjectRef, RegistryError> {
        self.registry.register_manifest(name, manifest)
    }

    /// A handle that stops any running assertion when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop any running assertion
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Assert on the field at `path` of the resource registered as `reference`
    ///
    /// The phrase is compiled and the reference looked up before the first
    /// poll. Each poll fetches the live object and extracts the field; a
    /// malformed path counts as a fetch error.
    ///
    /// # Errors
    ///
    /// See [`AssertionError`].
    pub async fn assert_object(
        &self,
        reference: &str,
        path: &str,
        phrase: &str,
        spec: &PollSpec,
    ) -> Result<AssertionOutcome, AssertionError> {
        let predicate = self.grammar.compile(phrase)?;
        let object = self
            .registry
            .get(reference)
            .ok_or_else(|| AssertionError::UnknownReference(reference.to_string()))?;

        let resolver = self.resolver.as_ref();
        let extractor = self.extractor.as_ref();
        let fetch = move || async move {
            let document = resolver.resolve(object).await?;
            extractor
                .extract(&document, path)
                .map_err(|e| FetchError::MalformedPath(e.to_string()))
        };

        let result = evaluate(fetch, &predicate, spec, &self.cancel).await;
        match &result {
            Ok(outcome) => info!(
                reference,
                path,
                phrase,
                polls = outcome.polls,
                elapsed = ?outcome.elapsed,
                "Assertion passed"
            ),
            Err(e) => info!(reference, path, phrase, error = %e, "Assertion failed"),
        }
        Ok(result?)
    }

    /// Parse and run one assertion step
    ///
    /// A step without a duration uses [`PollConfig::default_timeout`].
    ///
    /// # Errors
    ///
    /// Returns `AssertionError::NotAnAssertion` for unrecognised text,
    /// `AssertionError::Configuration` for a malformed duration, and
    /// otherwise whatever [`Scenario::assert_object`] returns.
    pub async fn run_step(&self, text: &str) -> Result<AssertionOutcome, AssertionError> {
        let step = AssertionStep::parse(text)?;
        let spec = PollSpec {
            timeout: step.timeout.unwrap_or(self.config.default_timeout),
            interval: self.config.interval,
            discipline: step.discipline,
            negate: step.negate,
        };
        self.assert_object(&step.reference, &step.path, &step.phrase, &spec)
            .await
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("registry", &self.registry)
            .field("grammar", &self.grammar)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
