//! Composition options and the recovery hook.
//!
//! # Design
//! Options come either as a fixed value or from a producer closure. The
//! producer runs once per call and is never cached, so a long-lived composed
//! client picks up rotated credentials on its next call. Two concurrent calls
//! may therefore see different snapshots.
//!
//! The `on_error` hook is read from the resolved options of the failing call.
//! It receives a `FailedCall` carrying the failed attempt's options, the
//! original input, the error and the fetcher itself, and decides the call's
//! result. Re-invoking the fetcher from the hook is an ordinary call that the
//! engine does not count: a hook that retries must bound its own attempts.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{FetchError, Result};
use crate::executor::ExecOptions;
use crate::fetcher::{BoxFuture, ErasedInput, Operation};
use crate::http::Headers;

/// The value a recovery hook resolves a failed call with.
///
/// It must hold the failed fetcher's output type; the composed call
/// downcasts it and reports `FetchError::RecoveryTypeMismatch` otherwise.
pub struct Outcome(Box<dyn Any + Send>);

impl Outcome {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Outcome(Box::new(value))
    }

    pub fn downcast<T: 'static>(self) -> std::result::Result<T, Outcome> {
        self.0.downcast::<T>().map(|v| *v).map_err(Outcome)
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Outcome(..)")
    }
}

/// Context handed to the `on_error` hook.
pub struct FailedCall<C> {
    pub(crate) options: ExecOptions<C>,
    pub(crate) input: ErasedInput,
    pub(crate) error: FetchError,
    pub(crate) fetcher: Arc<dyn Operation<C>>,
}

impl<C> FailedCall<C> {
    /// The resolved options of the failed attempt.
    pub fn options(&self) -> &ExecOptions<C> {
        &self.options
    }

    pub fn error(&self) -> &FetchError {
        &self.error
    }

    /// Give up and rethrow the original error.
    pub fn into_error(self) -> FetchError {
        self.error
    }

    pub fn fetcher_name(&self) -> &str {
        self.fetcher.name()
    }

    /// The caller's original input, if it has type `I`.
    pub fn input<I: 'static>(&self) -> Option<&I> {
        self.input.downcast_ref::<I>()
    }

    /// Re-invoke the fetcher with the failed attempt's options and input.
    pub fn retry(&self) -> BoxFuture<'static, Result<Outcome>> {
        self.retry_with(self.options.clone())
    }

    /// Re-invoke the fetcher with the original input and new options, e.g.
    /// `failed.options().with_header("Authorization", fresh_token)`.
    pub fn retry_with(&self, options: ExecOptions<C>) -> BoxFuture<'static, Result<Outcome>> {
        self.fetcher.invoke_erased(options, &self.input)
    }
}

impl<C: fmt::Debug> fmt::Debug for FailedCall<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedCall")
            .field("fetcher", &self.fetcher_name())
            .field("options", &self.options)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

type ErrorHook<C> = dyn Fn(FailedCall<C>) -> BoxFuture<'static, Result<Outcome>> + Send + Sync;

/// Post-execution hooks.
pub struct PostProcess<C> {
    on_error: Option<Arc<ErrorHook<C>>>,
}

impl<C> PostProcess<C> {
    /// Install the recovery hook. Returning `Ok(outcome)` resolves the call,
    /// returning `Err` (for instance `failed.into_error()`) rejects it.
    pub fn on_error<F, Fut>(hook: F) -> Self
    where
        F: Fn(FailedCall<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        let hook: Arc<ErrorHook<C>> =
            Arc::new(move |failed: FailedCall<C>| -> BoxFuture<'static, Result<Outcome>> {
                Box::pin(hook(failed))
            });
        Self {
            on_error: Some(hook),
        }
    }

    pub(crate) fn error_hook(&self) -> Option<&Arc<ErrorHook<C>>> {
        self.on_error.as_ref()
    }
}

impl<C> Default for PostProcess<C> {
    fn default() -> Self {
        Self { on_error: None }
    }
}

impl<C> Clone for PostProcess<C> {
    fn clone(&self) -> Self {
        Self {
            on_error: self.on_error.clone(),
        }
    }
}

impl<C> fmt::Debug for PostProcess<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostProcess")
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Raw options supplied when creating a composed client.
///
/// `ctx` is unvalidated JSON; it goes through the client's context schema on
/// every call.
pub struct ClientOptions<C> {
    pub ctx: Value,
    pub headers: Option<Headers>,
    pub post_process: PostProcess<C>,
}

impl<C> ClientOptions<C> {
    pub fn new(ctx: impl Into<Value>) -> Self {
        Self {
            ctx: ctx.into(),
            headers: None,
            post_process: PostProcess::default(),
        }
    }

    pub fn headers(mut self, headers: impl Into<Headers>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        self
    }

    pub fn post_process(mut self, post_process: PostProcess<C>) -> Self {
        self.post_process = post_process;
        self
    }

    /// Shorthand for `post_process(PostProcess::on_error(hook))`.
    pub fn on_error<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(FailedCall<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        self.post_process(PostProcess::on_error(hook))
    }
}

impl<C> Clone for ClientOptions<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            headers: self.headers.clone(),
            post_process: self.post_process.clone(),
        }
    }
}

impl<C> fmt::Debug for ClientOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("ctx", &self.ctx)
            .field("headers", &self.headers)
            .field("post_process", &self.post_process)
            .finish()
    }
}

type Producer<C> = dyn Fn() -> ClientOptions<C> + Send + Sync;

/// Where a composed client gets its options from.
pub enum OptionsSource<C> {
    Static(ClientOptions<C>),
    /// Invoked on every call; never memoized.
    Dynamic(Arc<Producer<C>>),
}

impl<C> OptionsSource<C> {
    pub fn dynamic<F>(producer: F) -> Self
    where
        F: Fn() -> ClientOptions<C> + Send + Sync + 'static,
    {
        OptionsSource::Dynamic(Arc::new(producer))
    }

    pub fn resolve(&self) -> ClientOptions<C> {
        match self {
            OptionsSource::Static(options) => options.clone(),
            OptionsSource::Dynamic(producer) => producer(),
        }
    }
}

impl<C> Clone for OptionsSource<C> {
    fn clone(&self) -> Self {
        match self {
            OptionsSource::Static(options) => OptionsSource::Static(options.clone()),
            OptionsSource::Dynamic(producer) => OptionsSource::Dynamic(Arc::clone(producer)),
        }
    }
}

impl<C> From<ClientOptions<C>> for OptionsSource<C> {
    fn from(options: ClientOptions<C>) -> Self {
        OptionsSource::Static(options)
    }
}

impl<C> fmt::Debug for OptionsSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsSource::Static(options) => f.debug_tuple("Static").field(options).finish(),
            OptionsSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[test]
    fn outcome_downcasts_to_stored_type() {
        let outcome = Outcome::new(42u32);
        assert!(outcome.is::<u32>());
        let back = outcome.downcast::<String>().unwrap_err();
        assert_eq!(back.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn static_source_resolves_to_same_value() {
        let source: OptionsSource<()> = ClientOptions::new("https://example.com")
            .header("Authorization", "t")
            .into();
        let first = source.resolve();
        let second = source.resolve();
        assert_eq!(first.ctx, second.ctx);
        assert_eq!(first.headers, second.headers);
    }

    #[test]
    fn dynamic_source_runs_producer_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source: OptionsSource<()> = OptionsSource::dynamic(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            ClientOptions::new(json!({ "attempt": n }))
        });
        assert_eq!(source.resolve().ctx, json!({ "attempt": 0 }));
        assert_eq!(source.resolve().ctx, json!({ "attempt": 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn header_creates_header_set_on_demand() {
        let options: ClientOptions<()> = ClientOptions::new("x");
        assert!(options.headers.is_none());
        let options = options.header("Authorization", "t");
        assert_eq!(
            options.headers.as_ref().and_then(|h| h.get("authorization")),
            Some("t")
        );
    }

    #[test]
    fn post_process_defaults_to_no_hook() {
        let options: ClientOptions<()> = ClientOptions::new("x");
        assert!(options.post_process.error_hook().is_none());
        let options = options.on_error(|failed| async move { Err(failed.into_error()) });
        assert!(options.post_process.error_hook().is_some());
    }
}
