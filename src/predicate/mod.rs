//! # Predicates
//!
//! A predicate is a vertex filter paired with a **canonical key**. The cache
//! treats two predicates as the same query exactly when their keys are equal;
//! it never inspects the filter itself. Keys are compared textually, which
//! is stricter than logical equivalence: `id > 11` and `11 < id` are two
//! cache entries.
//!
//! Predicates arrive in two forms, both funnelled through `PredicateSource`:
//!
//! - `Predicate::new` / `Predicate::fallible`: a closure plus a key chosen by
//!   the caller. The caller vouches that equal keys mean equal filters.
//! - `Expr`: an expression tree whose rendering is its key.

pub mod expr;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::Vertex;
use crate::Result;

pub use expr::{BinaryOp, Expr};

// ============================================================================
// PredicateKey
// ============================================================================

/// Canonical key under which a predicate's child graph is cached.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateKey(String);

impl PredicateKey {
    pub fn new(key: impl Into<String>) -> Self {
        PredicateKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PredicateKey {
    fn from(key: &str) -> Self {
        PredicateKey(key.to_owned())
    }
}

impl From<String> for PredicateKey {
    fn from(key: String) -> Self {
        PredicateKey(key)
    }
}

// ============================================================================
// Predicate
// ============================================================================

type Filter<V> = dyn Fn(&V) -> Result<bool> + Send + Sync;

/// A compiled, callable vertex filter with its canonical key.
///
/// Filters must be pure: no side effects, and in particular no attribute
/// writes on graph vertices (the graph's lock is held while they run).
pub struct Predicate<V> {
    key: PredicateKey,
    filter: Arc<Filter<V>>,
}

impl<V: Vertex> Predicate<V> {
    /// Infallible filter under a caller-assigned key.
    pub fn new<F>(key: impl Into<PredicateKey>, filter: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        Self { key: key.into(), filter: Arc::new(move |v: &V| Ok(filter(v))) }
    }

    /// Filter that may fail, e.g. when it inspects an attribute that is in
    /// an invalid state. Failures propagate to whichever graph operation
    /// triggered the evaluation.
    pub fn fallible<F>(key: impl Into<PredicateKey>, filter: F) -> Self
    where
        F: Fn(&V) -> Result<bool> + Send + Sync + 'static,
    {
        Self { key: key.into(), filter: Arc::new(filter) }
    }

    /// Compile an expression; its rendering becomes the key.
    pub fn from_expr(expr: Expr) -> Result<Self> {
        if let Some(name) = expr.params().into_iter().next() {
            return Err(crate::Error::UnboundParameter(name));
        }
        let key = PredicateKey::from(expr.to_string());
        Ok(Self { key, filter: Arc::new(move |v: &V| expr.matches(v)) })
    }

    pub fn key(&self) -> &PredicateKey {
        &self.key
    }

    pub fn evaluate(&self, vertex: &V) -> Result<bool> {
        (self.filter)(vertex)
    }
}

impl<V> Clone for Predicate<V> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), filter: Arc::clone(&self.filter) }
    }
}

impl<V> fmt::Debug for Predicate<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("key", &self.key).finish_non_exhaustive()
    }
}

// ============================================================================
// PredicateSource
// ============================================================================

/// Anything that can name a cached query and, on a cache miss, produce the
/// filter for it.
///
/// `canonical_key` is computed on every lookup; `into_predicate` runs only
/// when the key is not cached yet.
pub trait PredicateSource<V: Vertex> {
    fn canonical_key(&self) -> PredicateKey;

    fn into_predicate(self) -> Result<Predicate<V>>;
}

impl<V: Vertex> PredicateSource<V> for Predicate<V> {
    fn canonical_key(&self) -> PredicateKey {
        self.key.clone()
    }

    fn into_predicate(self) -> Result<Predicate<V>> {
        Ok(self)
    }
}

impl<V: Vertex> PredicateSource<V> for Expr {
    fn canonical_key(&self) -> PredicateKey {
        PredicateKey::from(self.to_string())
    }

    fn into_predicate(self) -> Result<Predicate<V>> {
        Predicate::from_expr(self)
    }
}

impl<V: Vertex> PredicateSource<V> for &Expr {
    fn canonical_key(&self) -> PredicateKey {
        PredicateKey::from(self.to_string())
    }

    fn into_predicate(self) -> Result<Predicate<V>> {
        Predicate::from_expr(self.clone())
    }
}
