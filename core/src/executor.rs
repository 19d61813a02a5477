//! Request executors handed to every fetcher invocation.
//!
//! # Design
//! `ExecOptions` is rebuilt for each composed call from the options that were
//! current at that moment, so the executors it exposes always carry the
//! latest client headers. Each executor returns a `RequestBuilder` that can
//! be refined (`json`, `header`, `options`) and is then awaited.
//!
//! Header layering, lowest priority first:
//! 1. built-in defaults (`Content-Type` for body-carrying methods),
//! 2. validated client headers,
//! 3. call-site headers.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{FetchError, Result};
use crate::http::{
    CachePolicy, Headers, HttpMethod, HttpRequest, HttpResponse, RequestOptions, Transport,
};
use crate::schema::Schema;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Parsed payload together with the raw response it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
    pub response: HttpResponse,
}

impl<T> Envelope<T> {
    pub fn status(&self) -> u16 {
        self.response.status
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

/// Everything a fetcher receives: the validated context, the validated
/// headers and the five executors.
pub struct ExecOptions<C> {
    ctx: Arc<C>,
    headers: Option<Headers>,
    transport: Arc<dyn Transport>,
}

impl<C> Clone for ExecOptions<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            headers: self.headers.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for ExecOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("ctx", &self.ctx)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl<C> ExecOptions<C> {
    pub fn new(ctx: C, headers: Option<Headers>, transport: Arc<dyn Transport>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            headers,
            transport,
        }
    }

    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    /// Validated client headers; `None` when the client declares none.
    pub fn headers(&self) -> Option<&Headers> {
        self.headers.as_ref()
    }

    /// Copy of these options with one client header replaced or added.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        next
    }

    /// Copy of these options with the client header set replaced.
    pub fn with_headers(&self, headers: Option<Headers>) -> Self {
        let mut next = self.clone();
        next.headers = headers;
        next
    }

    pub fn with_ctx(&self, ctx: C) -> Self {
        let mut next = self.clone();
        next.ctx = Arc::new(ctx);
        next
    }

    pub fn get<S: Schema>(&self, url: impl Into<String>, schema: S) -> RequestBuilder<'_, C, S> {
        self.request(HttpMethod::Get, url, schema)
    }

    pub fn post<S: Schema>(&self, url: impl Into<String>, schema: S) -> RequestBuilder<'_, C, S> {
        self.request(HttpMethod::Post, url, schema)
    }

    pub fn put<S: Schema>(&self, url: impl Into<String>, schema: S) -> RequestBuilder<'_, C, S> {
        self.request(HttpMethod::Put, url, schema)
    }

    pub fn patch<S: Schema>(&self, url: impl Into<String>, schema: S) -> RequestBuilder<'_, C, S> {
        self.request(HttpMethod::Patch, url, schema)
    }

    pub fn delete<S: Schema>(&self, url: impl Into<String>, schema: S) -> RequestBuilder<'_, C, S> {
        self.request(HttpMethod::Delete, url, schema)
    }

    fn request<S: Schema>(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        schema: S,
    ) -> RequestBuilder<'_, C, S> {
        RequestBuilder {
            exec: self,
            method,
            url: url.into(),
            schema,
            body: None,
            options: RequestOptions::default(),
        }
    }
}

/// A pending executor call. Await it directly or call `send`.
pub struct RequestBuilder<'a, C, S> {
    exec: &'a ExecOptions<C>,
    method: HttpMethod,
    url: String,
    schema: S,
    body: Option<serde_json::Result<String>>,
    options: RequestOptions,
}

impl<'a, C, S> RequestBuilder<'a, C, S>
where
    C: Send + Sync + 'a,
    S: Schema + 'a,
    S::Output: Send,
{
    /// Serialize `body` as the JSON payload. Serialization errors surface
    /// when the request is sent.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(serde_json::to_string(body));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name, value);
        self
    }

    /// Layer a whole call-site options bag over what was set so far.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options.headers.merge(&options.headers);
        if options.cache.is_some() {
            self.options.cache = options.cache;
        }
        if options.referrer_policy.is_some() {
            self.options.referrer_policy = options.referrer_policy;
        }
        self
    }

    /// The request this builder will dispatch.
    pub fn build(&self) -> Result<HttpRequest> {
        let body = match &self.body {
            Some(Ok(body)) => Some(body.clone()),
            Some(Err(e)) => return Err(FetchError::Serialization(clone_json_error(e))),
            None => None,
        };
        Ok(build_request(
            self.method,
            &self.url,
            self.exec.headers(),
            &self.options,
            body,
        ))
    }

    pub async fn send(self) -> Result<Envelope<S::Output>> {
        let request = self.build()?;
        let method = request.method;
        let url = request.url.clone();

        debug!(%method, %url, "dispatching request");
        let response = self.exec.transport.fetch(request).await?;
        trace!(%method, %url, status = response.status, "response received");

        let raw = response.json().map_err(|source| FetchError::InvalidBody {
            url: url.clone(),
            status: response.status,
            source,
        })?;
        let data = self
            .schema
            .parse(&raw)
            .map_err(|source| FetchError::ResponseShape {
                method,
                url,
                status: response.status,
                source,
            })?;
        Ok(Envelope { data, response })
    }
}

impl<'a, C, S> IntoFuture for RequestBuilder<'a, C, S>
where
    C: Send + Sync + 'a,
    S: Schema + 'a,
    S::Output: Send,
{
    type Output = Result<Envelope<S::Output>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}

// serde_json::Error is not Clone; rebuild an equivalent one so `build` can
// stay `&self`.
fn clone_json_error(e: &serde_json::Error) -> serde_json::Error {
    <serde_json::Error as serde::ser::Error>::custom(e.to_string())
}

/// Assemble the request for one executor call.
pub fn build_request(
    method: HttpMethod,
    url: &str,
    client_headers: Option<&Headers>,
    options: &RequestOptions,
    body: Option<String>,
) -> HttpRequest {
    let mut headers = Headers::new();
    let mut cache = None;
    if method.sends_body() {
        headers.insert("Content-Type", JSON_CONTENT_TYPE);
        cache = Some(CachePolicy::NoCache);
    }
    if let Some(client) = client_headers {
        headers.merge(client);
    }
    headers.merge(&options.headers);

    HttpRequest {
        method,
        url: url.to_string(),
        headers,
        body,
        cache: options.cache.or(cache),
        referrer_policy: options.referrer_policy.unwrap_or_default(),
    }
}
