//! Typed, schema-validated HTTP fetchers sharing one context and one
//! recovery hook.
//!
//! # Overview
//! A `FetcherClient` is built from a context schema, an optional header
//! shape and an injected `Transport`. Named fetchers are declared against it
//! and combined into a factory; binding options to that factory yields a
//! `Fetchers` client whose calls validate the context and headers, run the
//! fetcher with fresh executors, and route failures to an optional
//! `on_error` hook that may recover by re-invoking the fetcher.
//!
//! ```ignore
//! let client = FetcherClient::with_headers(
//!     string(),
//!     HeaderShape::new().field("Authorization", string().non_empty()),
//!     transport,
//! );
//! let get_todo = client.fetcher("getTodo", |exec, id: u32| async move {
//!     exec.get(format!("{}/todos/{id}", exec.ctx()), json::<Todo>()).await
//! });
//! let api = client
//!     .combine_fetchers([get_todo.erase()])
//!     .create(ClientOptions::new("https://example.com").header("Authorization", token));
//! let todo = api.call(&get_todo, 1).await?.data;
//! ```
//!
//! # Design
//! - The core never performs I/O itself; the host supplies a `Transport`.
//! - Options may be a fixed value or a producer closure that runs on every
//!   call, so rotated credentials are picked up without rebuilding anything.
//! - Executors return `Envelope { data, response }` so callers keep the
//!   status code next to the validated payload.
//! - The recovery hook is unbounded: a hook that re-invokes the fetcher must
//!   count its own attempts.

pub mod binder;
pub mod client;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod http;
pub mod options;
pub mod schema;

pub use binder::{HeaderContract, HeaderShape, SchemaBinder};
pub use client::{Combined, FetcherClient, Fetchers};
pub use error::{BoxError, FetchError, Result, SchemaError};
pub use executor::{Envelope, ExecOptions, RequestBuilder, JSON_CONTENT_TYPE};
pub use fetcher::{AnyFetcher, BoxFuture, Fetcher};
pub use http::{
    CachePolicy, Headers, HttpMethod, HttpRequest, HttpResponse, ReferrerPolicy, RequestOptions,
    Transport,
};
pub use options::{ClientOptions, FailedCall, OptionsSource, Outcome, PostProcess};
pub use schema::{Either, Schema, SchemaExt};
