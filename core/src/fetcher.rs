//! Named operation definitions.
//!
//! A definition is an async function of `(ExecOptions<C>, I)`. The single
//! input type parameter is what limits a fetcher to one business input: a
//! fetcher without input takes `()`, several values travel as one tuple or
//! struct.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{FetchError, Result};
use crate::executor::ExecOptions;
use crate::options::Outcome;

/// Boxed future for definition and hook results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Definition<C, I, O> = dyn Fn(ExecOptions<C>, I) -> BoxFuture<'static, Result<O>> + Send + Sync;

/// Input of a failed call, kept so the recovery hook can re-invoke the
/// operation with it.
pub(crate) type ErasedInput = Arc<dyn Any + Send + Sync>;

/// A typed, named operation declared against a `FetcherClient`.
pub struct Fetcher<C, I, O> {
    name: Arc<str>,
    definition: Arc<Definition<C, I, O>>,
}

impl<C, I, O> Clone for Fetcher<C, I, O> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            definition: Arc::clone(&self.definition),
        }
    }
}

impl<C, I, O> fmt::Debug for Fetcher<C, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").field("name", &self.name).finish()
    }
}

impl<C, I, O> Fetcher<C, I, O>
where
    C: Send + Sync + 'static,
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    pub(crate) fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ExecOptions<C>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let name: String = name.into();
        let definition: Arc<Definition<C, I, O>> =
            Arc::new(move |exec: ExecOptions<C>, input: I| -> BoxFuture<'static, Result<O>> {
                Box::pin(f(exec, input))
            });
        Self {
            name: name.into(),
            definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn definition_addr(&self) -> *const () {
        Arc::as_ptr(&self.definition) as *const ()
    }

    /// Run the definition directly, bypassing options resolution and the
    /// recovery hook.
    pub async fn invoke(&self, exec: ExecOptions<C>, input: I) -> Result<O> {
        (self.definition)(exec, input).await
    }

    /// Type-erased registration for `FetcherClient::combine_fetchers`.
    pub fn erase(&self) -> AnyFetcher<C> {
        AnyFetcher {
            inner: Arc::new(self.clone()),
        }
    }
}

/// Object-safe view of a fetcher, used by the registry and the recovery hook.
pub(crate) trait Operation<C>: Send + Sync {
    fn name(&self) -> &str;

    /// Address of the underlying definition, identifying it across clones.
    fn definition_addr(&self) -> *const ();

    fn invoke_erased(&self, exec: ExecOptions<C>, input: &ErasedInput) -> BoxFuture<'static, Result<Outcome>>;
}

impl<C, I, O> Operation<C> for Fetcher<C, I, O>
where
    C: Send + Sync + 'static,
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn definition_addr(&self) -> *const () {
        Fetcher::definition_addr(self)
    }

    fn invoke_erased(&self, exec: ExecOptions<C>, input: &ErasedInput) -> BoxFuture<'static, Result<Outcome>> {
        let Some(input) = input.downcast_ref::<I>().cloned() else {
            let fetcher = self.name.to_string();
            return Box::pin(async move { Err(FetchError::RecoveryTypeMismatch { fetcher }) });
        };
        let fut = (self.definition)(exec, input);
        Box::pin(async move { fut.await.map(Outcome::new) })
    }
}

/// A fetcher with its input and output types erased.
pub struct AnyFetcher<C> {
    pub(crate) inner: Arc<dyn Operation<C>>,
}

impl<C> AnyFetcher<C> {
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// True when `fetcher` is this registration's definition (or a clone of
    /// its handle).
    pub fn is<I, O>(&self, fetcher: &Fetcher<C, I, O>) -> bool
    where
        C: Send + Sync + 'static,
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        self.inner.definition_addr() == fetcher.definition_addr()
    }
}

impl<C> Clone for AnyFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for AnyFetcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyFetcher").field("name", &self.name()).finish()
    }
}

impl<C, I, O> From<&Fetcher<C, I, O>> for AnyFetcher<C>
where
    C: Send + Sync + 'static,
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn from(fetcher: &Fetcher<C, I, O>) -> Self {
        fetcher.erase()
    }
}
