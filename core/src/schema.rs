//! Parse-or-fail validators over JSON values.
//!
//! # Overview
//! A `Schema` turns a raw `serde_json::Value` into a typed output or a
//! `SchemaError`. Schemas compose: `array(string().non_empty())`,
//! `union(json::<Todo>(), json::<ApiFailure>())`, `optional(integer())`.
//! The output type is inferred from the schema, so an executor called with
//! `json::<Todo>()` hands back `Envelope<Todo>`.
//!
//! Object shapes are plain serde types through `json::<T>()`; add
//! field-level rules with `refine`.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SchemaError;

pub trait Schema: Send + Sync {
    type Output;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError>;
}

impl<S: Schema + ?Sized> Schema for &S {
    type Output = S::Output;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError> {
        (**self).parse(raw)
    }
}

impl<S: Schema + ?Sized> Schema for Box<S> {
    type Output = S::Output;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError> {
        (**self).parse(raw)
    }
}

impl<S: Schema + ?Sized> Schema for Arc<S> {
    type Output = S::Output;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError> {
        (**self).parse(raw)
    }
}

/// Combinators available on every schema.
pub trait SchemaExt: Schema + Sized {
    /// Reject outputs for which `check` returns false.
    fn refine<F>(self, check: F, message: impl Into<String>) -> Refine<Self, F>
    where
        F: Fn(&Self::Output) -> bool + Send + Sync,
    {
        Refine {
            inner: self,
            check,
            message: message.into(),
        }
    }

    /// Transform the output after a successful parse.
    fn map<F, T>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Output) -> T + Send + Sync,
    {
        Map { inner: self, f }
    }
}

impl<S: Schema> SchemaExt for S {}

fn kind(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(what: &str, raw: &Value) -> SchemaError {
    SchemaError::new(format!("expected {what}, received {}", kind(raw)))
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Accepts any value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySchema;

pub fn any() -> AnySchema {
    AnySchema
}

impl Schema for AnySchema {
    type Output = Value;

    fn parse(&self, raw: &Value) -> Result<Value, SchemaError> {
        Ok(raw.clone())
    }
}

/// String with optional length bounds, counted in characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSchema {
    min: Option<usize>,
    max: Option<usize>,
}

pub fn string() -> StringSchema {
    StringSchema::default()
}

impl StringSchema {
    pub fn min(mut self, len: usize) -> Self {
        self.min = Some(len);
        self
    }

    pub fn max(mut self, len: usize) -> Self {
        self.max = Some(len);
        self
    }

    pub fn non_empty(self) -> Self {
        self.min(1)
    }
}

impl Schema for StringSchema {
    type Output = String;

    fn parse(&self, raw: &Value) -> Result<String, SchemaError> {
        let s = raw.as_str().ok_or_else(|| expected("string", raw))?;
        let len = s.chars().count();
        if let Some(min) = self.min {
            if len < min {
                return Err(SchemaError::new(format!(
                    "string must contain at least {min} character(s)"
                )));
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return Err(SchemaError::new(format!(
                    "string must contain at most {max} character(s)"
                )));
            }
        }
        Ok(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerSchema;

pub fn integer() -> IntegerSchema {
    IntegerSchema
}

impl Schema for IntegerSchema {
    type Output = i64;

    fn parse(&self, raw: &Value) -> Result<i64, SchemaError> {
        raw.as_i64().ok_or_else(|| expected("integer", raw))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberSchema;

pub fn number() -> NumberSchema {
    NumberSchema
}

impl Schema for NumberSchema {
    type Output = f64;

    fn parse(&self, raw: &Value) -> Result<f64, SchemaError> {
        raw.as_f64().ok_or_else(|| expected("number", raw))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanSchema;

pub fn boolean() -> BooleanSchema {
    BooleanSchema
}

impl Schema for BooleanSchema {
    type Output = bool;

    fn parse(&self, raw: &Value) -> Result<bool, SchemaError> {
        raw.as_bool().ok_or_else(|| expected("boolean", raw))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSchema;

/// Accepts only `null`, which is also what an empty response body parses to.
pub fn null() -> NullSchema {
    NullSchema
}

impl Schema for NullSchema {
    type Output = ();

    fn parse(&self, raw: &Value) -> Result<(), SchemaError> {
        if raw.is_null() {
            Ok(())
        } else {
            Err(expected("null", raw))
        }
    }
}

/// One of a fixed set of string literals, e.g. `literals(["production", "staging"])`.
#[derive(Debug, Clone)]
pub struct LiteralsSchema {
    allowed: BTreeSet<String>,
}

pub fn literals<I, T>(allowed: I) -> LiteralsSchema
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    LiteralsSchema {
        allowed: allowed.into_iter().map(Into::into).collect(),
    }
}

impl Schema for LiteralsSchema {
    type Output = String;

    fn parse(&self, raw: &Value) -> Result<String, SchemaError> {
        let s = raw.as_str().ok_or_else(|| expected("string", raw))?;
        if self.allowed.contains(s) {
            Ok(s.to_string())
        } else {
            let options: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
            Err(SchemaError::new(format!(
                "expected one of [{}], received `{s}`",
                options.join(", ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Typed shapes
// ---------------------------------------------------------------------------

/// Deserializes into `T` with serde.
pub struct JsonSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

pub fn json<T: DeserializeOwned>() -> JsonSchema<T> {
    JsonSchema {
        _marker: PhantomData,
    }
}

impl<T> Clone for JsonSchema<T> {
    fn clone(&self) -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Copy for JsonSchema<T> {}

impl<T> fmt::Debug for JsonSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Schema for JsonSchema<T> {
    type Output = T;

    fn parse(&self, raw: &Value) -> Result<T, SchemaError> {
        T::deserialize(raw).map_err(|e| SchemaError::new(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ArraySchema<S> {
    item: S,
}

pub fn array<S: Schema>(item: S) -> ArraySchema<S> {
    ArraySchema { item }
}

impl<S: Schema> Schema for ArraySchema<S> {
    type Output = Vec<S::Output>;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError> {
        let items = raw.as_array().ok_or_else(|| expected("array", raw))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.item.parse(item).map_err(|e| e.at_index(i)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct OptionalSchema<S> {
    inner: S,
}

/// `null` parses to `None`, anything else must satisfy `inner`.
pub fn optional<S: Schema>(inner: S) -> OptionalSchema<S> {
    OptionalSchema { inner }
}

impl<S: Schema> Schema for OptionalSchema<S> {
    type Output = Option<S::Output>;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError> {
        if raw.is_null() {
            return Ok(None);
        }
        self.inner.parse(raw).map(Some)
    }
}

/// Output of a two-way `union`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    pub fn left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    pub fn right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnionSchema<A, B> {
    first: A,
    second: B,
}

/// Tries `first`, then `second`. Nest unions for more than two members.
pub fn union<A: Schema, B: Schema>(first: A, second: B) -> UnionSchema<A, B> {
    UnionSchema { first, second }
}

impl<A: Schema, B: Schema> Schema for UnionSchema<A, B> {
    type Output = Either<A::Output, B::Output>;

    fn parse(&self, raw: &Value) -> Result<Self::Output, SchemaError> {
        let first = match self.first.parse(raw) {
            Ok(v) => return Ok(Either::Left(v)),
            Err(e) => e,
        };
        match self.second.parse(raw) {
            Ok(v) => Ok(Either::Right(v)),
            Err(second) => Err(SchemaError::new(format!(
                "no union member matched ({first}; {second})"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

pub struct Refine<S, F> {
    inner: S,
    check: F,
    message: String,
}

impl<S, F> Schema for Refine<S, F>
where
    S: Schema,
    F: Fn(&S::Output) -> bool + Send + Sync,
{
    type Output = S::Output;

    fn parse(&self, raw: &Value) -> Result<S::Output, SchemaError> {
        let value = self.inner.parse(raw)?;
        if (self.check)(&value) {
            Ok(value)
        } else {
            Err(SchemaError::new(self.message.clone()))
        }
    }
}

pub struct Map<S, F> {
    inner: S,
    f: F,
}

impl<S, F, T> Schema for Map<S, F>
where
    S: Schema,
    F: Fn(S::Output) -> T + Send + Sync,
{
    type Output = T;

    fn parse(&self, raw: &Value) -> Result<T, SchemaError> {
        self.inner.parse(raw).map(&self.f)
    }
}
