//! Fetcher client: declaration and composition of named operations.
//!
//! # Design
//! `FetcherClient` binds a context schema, an optional header shape and a
//! transport. Fetchers are declared against it with `fetcher`, which fixes
//! their context type to the schema's output. `combine_fetchers` registers a
//! set of fetchers by name and returns a `Combined` factory; `create` turns
//! that factory plus options (fixed or produced per call) into a callable
//! `Fetchers` client.
//!
//! None of these types hold mutable state. Every `Fetchers::call` resolves
//! options, validates them, builds fresh executors and runs the fetcher,
//! deferring to the `on_error` hook when it fails.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::binder::{HeaderShape, SchemaBinder};
use crate::error::{FetchError, Result};
use crate::executor::ExecOptions;
use crate::fetcher::{AnyFetcher, Fetcher};
use crate::http::Transport;
use crate::options::{FailedCall, OptionsSource};
use crate::schema::Schema;

/// Entry point: owns the schema contract and the injected transport.
pub struct FetcherClient<S> {
    binder: Arc<SchemaBinder<S>>,
    transport: Arc<dyn Transport>,
}

impl<S> FetcherClient<S>
where
    S: Schema + 'static,
    S::Output: Send + Sync + 'static,
{
    /// Client whose fetchers receive no headers.
    pub fn new(ctx: S, transport: impl Transport + 'static) -> Self {
        Self::from_binder(SchemaBinder::new(ctx), Arc::new(transport))
    }

    /// Client whose options must carry headers matching `headers`.
    pub fn with_headers(ctx: S, headers: HeaderShape, transport: impl Transport + 'static) -> Self {
        Self::from_binder(SchemaBinder::with_headers(ctx, headers), Arc::new(transport))
    }

    pub fn from_binder(binder: SchemaBinder<S>, transport: Arc<dyn Transport>) -> Self {
        Self {
            binder: Arc::new(binder),
            transport,
        }
    }

    pub fn binder(&self) -> &SchemaBinder<S> {
        &self.binder
    }

    /// Declare a named fetcher taking a single input `I`.
    pub fn fetcher<I, O, F, Fut>(&self, name: impl Into<String>, definition: F) -> Fetcher<S::Output, I, O>
    where
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
        F: Fn(ExecOptions<S::Output>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Fetcher::new(name, definition)
    }

    /// Register fetchers by name. A repeated name keeps the last definition.
    pub fn combine_fetchers<D>(&self, definitions: D) -> Combined<S>
    where
        D: IntoIterator,
        D::Item: Into<AnyFetcher<S::Output>>,
    {
        let mut registry = BTreeMap::new();
        for definition in definitions {
            let definition: AnyFetcher<S::Output> = definition.into();
            let name = definition.name().to_string();
            if registry.insert(name.clone(), definition).is_some() {
                warn!(fetcher = %name, "fetcher registered twice; keeping the last definition");
            }
        }
        Combined {
            binder: Arc::clone(&self.binder),
            transport: Arc::clone(&self.transport),
            registry: Arc::new(registry),
        }
    }
}

impl<S> fmt::Debug for FetcherClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherClient").finish_non_exhaustive()
    }
}

/// Named fetchers waiting for options.
pub struct Combined<S: Schema> {
    binder: Arc<SchemaBinder<S>>,
    transport: Arc<dyn Transport>,
    registry: Arc<BTreeMap<String, AnyFetcher<S::Output>>>,
}

impl<S: Schema> Clone for Combined<S> {
    fn clone(&self) -> Self {
        Self {
            binder: Arc::clone(&self.binder),
            transport: Arc::clone(&self.transport),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: Schema> fmt::Debug for Combined<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combined")
            .field("fetchers", &self.registry.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<S> Combined<S>
where
    S: Schema + 'static,
    S::Output: Send + Sync + 'static,
{
    /// Bind options, either a `ClientOptions` value or
    /// `OptionsSource::dynamic(producer)`.
    pub fn create(&self, options: impl Into<OptionsSource<S::Output>>) -> Fetchers<S> {
        Fetchers {
            combined: self.clone(),
            options: options.into(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }
}

/// A composed client: registered fetchers bound to options.
pub struct Fetchers<S: Schema> {
    combined: Combined<S>,
    options: OptionsSource<S::Output>,
}

impl<S: Schema> Clone for Fetchers<S> {
    fn clone(&self) -> Self {
        Self {
            combined: self.combined.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: Schema> fmt::Debug for Fetchers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetchers")
            .field("combined", &self.combined)
            .field("options", &self.options)
            .finish()
    }
}

impl<S> Fetchers<S>
where
    S: Schema + 'static,
    S::Output: Send + Sync + 'static,
{
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.combined.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.combined.registry.contains_key(name)
    }

    /// Invoke a registered fetcher.
    ///
    /// Validation errors are returned before the fetcher runs and never reach
    /// the hook. Any error from the fetcher itself goes to the `on_error`
    /// hook of the resolved options when one is set, and to the caller
    /// otherwise.
    pub async fn call<I, O>(&self, fetcher: &Fetcher<S::Output, I, O>, input: I) -> Result<O>
    where
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        let name = fetcher.name();
        let registered = self
            .combined
            .registry
            .get(name)
            .filter(|registered| registered.is(fetcher))
            .ok_or_else(|| FetchError::UnknownFetcher(name.to_string()))?;

        let options = self.options.resolve();
        let binder = &self.combined.binder;
        let ctx = binder.validate_context(&options.ctx)?;
        let headers = binder.validate_headers(options.headers.as_ref())?;
        let exec = ExecOptions::new(ctx, headers, Arc::clone(&self.combined.transport));

        debug!(fetcher = %name, "invoking fetcher");
        let error = match fetcher.invoke(exec.clone(), input.clone()).await {
            Ok(output) => return Ok(output),
            Err(error) => error,
        };

        let Some(hook) = options.post_process.error_hook() else {
            debug!(fetcher = %name, error = %error, "fetcher failed without a recovery hook");
            return Err(error);
        };

        debug!(fetcher = %name, error = %error, "fetcher failed; invoking recovery hook");
        let failed = FailedCall {
            options: exec,
            input: Arc::new(input),
            error,
            fetcher: Arc::clone(&registered.inner),
        };
        let outcome = hook(failed).await.inspect_err(|error| {
            warn!(fetcher = %name, error = %error, "recovery hook rejected the call");
        })?;
        outcome
            .downcast::<O>()
            .map_err(|_| FetchError::RecoveryTypeMismatch {
                fetcher: name.to_string(),
            })
    }
}
