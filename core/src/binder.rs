//! Context and header contracts shared by every fetcher of a client.

use std::fmt;

use serde_json::Value;

use crate::error::{FetchError, Result};
use crate::http::Headers;
use crate::schema::Schema;

type HeaderField = Box<dyn Schema<Output = String>>;

/// Declared header fields, each validated by a string schema.
///
/// Behaves like an object schema: every declared field is required, and
/// headers that were not declared are dropped from the validated set.
#[derive(Default)]
pub struct HeaderShape {
    fields: Vec<(String, HeaderField)>,
}

impl HeaderShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<S>(mut self, name: impl Into<String>, schema: S) -> Self
    where
        S: Schema<Output = String> + 'static,
    {
        self.fields.push((name.into(), Box::new(schema)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    fn validate(&self, raw: &Headers) -> Result<Headers> {
        let mut validated = Headers::new();
        for (name, schema) in &self.fields {
            let value = match raw.get(name) {
                Some(v) => Value::String(v.to_string()),
                None => Value::Null,
            };
            let parsed = schema
                .parse(&value)
                .map_err(|e| FetchError::HeaderValidation(e.at_field(name)))?;
            validated.insert(name.clone(), parsed);
        }
        Ok(validated)
    }
}

impl fmt::Debug for HeaderShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Whether the client declared a header contract at all.
#[derive(Debug)]
pub enum HeaderContract {
    Undeclared,
    Declared(HeaderShape),
}

/// Owns the context schema and the header contract.
#[derive(Debug)]
pub struct SchemaBinder<S> {
    ctx: S,
    headers: HeaderContract,
}

impl<S: Schema> SchemaBinder<S> {
    pub fn new(ctx: S) -> Self {
        Self {
            ctx,
            headers: HeaderContract::Undeclared,
        }
    }

    pub fn with_headers(ctx: S, headers: HeaderShape) -> Self {
        Self {
            ctx,
            headers: HeaderContract::Declared(headers),
        }
    }

    pub fn header_contract(&self) -> &HeaderContract {
        &self.headers
    }

    pub fn validate_context(&self, raw: &Value) -> Result<S::Output> {
        self.ctx.parse(raw).map_err(FetchError::ContextValidation)
    }

    /// Validate raw headers against the declared shape.
    ///
    /// Returns `None` when no shape was declared. A declared shape with no
    /// header set is validated as an empty set, so required fields fail.
    pub fn validate_headers(&self, raw: Option<&Headers>) -> Result<Option<Headers>> {
        let HeaderContract::Declared(shape) = &self.headers else {
            return Ok(None);
        };
        match raw {
            Some(raw) => shape.validate(raw).map(Some),
            None => shape.validate(&Headers::new()).map(Some),
        }
    }
}
