//! The opaque data-transformation contract.
//!
//! The declarative mapping sublanguage used to transform payloads lives
//! outside this system; Iris consumes it only through the [`Mutator`]
//! trait. A mutator is bidirectional: `apply` runs the forward mapping
//! (data arriving from a service), `apply_rev` runs the reverse mapping
//! (data going to a service). Each direction has an `*_only_mapped`
//! variant restricted to explicitly-mapped fields, defaulting to the
//! unrestricted form for mutators without that distinction.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A boxed future, used to keep async contracts object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error produced by a mutator application.
#[derive(Debug, Error)]
pub enum MutateError {
    /// The mapping failed on the given value.
    #[error("Mutation failed: {0}")]
    Failed(String),
}

/// A bidirectional, possibly asynchronous data transformation.
///
/// Implementations must be pure with respect to the action pipeline:
/// they may suspend, but may not observe or modify pipeline state other
/// than the value handed to them.
pub trait Mutator: Send + Sync {
    /// Applies the forward mapping.
    fn apply<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>>;

    /// Applies the reverse mapping.
    fn apply_rev<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>>;

    /// Applies the forward mapping restricted to explicitly-mapped fields.
    fn apply_only_mapped<'a>(
        &'a self,
        value: Value,
    ) -> BoxFuture<'a, Result<Value, MutateError>> {
        self.apply(value)
    }

    /// Applies the reverse mapping restricted to explicitly-mapped fields.
    fn apply_rev_only_mapped<'a>(
        &'a self,
        value: Value,
    ) -> BoxFuture<'a, Result<Value, MutateError>> {
        self.apply_rev(value)
    }
}

/// A pipeline of mutators applied in sequence.
///
/// Forward application runs the mutators in order; reverse application
/// runs them in reverse order, so a round trip through the pipeline
/// returns to an equivalent value when every step does.
pub struct ComposedMutator {
    mutators: Vec<std::sync::Arc<dyn Mutator>>,
}

impl ComposedMutator {
    /// Creates a pipeline from the given mutators, in forward order.
    #[must_use]
    pub fn new(mutators: Vec<std::sync::Arc<dyn Mutator>>) -> Self {
        Self { mutators }
    }
}

impl Mutator for ComposedMutator {
    fn apply<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>> {
        Box::pin(async move {
            let mut value = value;
            for mutator in &self.mutators {
                value = mutator.apply(value).await?;
            }
            Ok(value)
        })
    }

    fn apply_rev<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>> {
        Box::pin(async move {
            let mut value = value;
            for mutator in self.mutators.iter().rev() {
                value = mutator.apply_rev(value).await?;
            }
            Ok(value)
        })
    }

    fn apply_only_mapped<'a>(
        &'a self,
        value: Value,
    ) -> BoxFuture<'a, Result<Value, MutateError>> {
        Box::pin(async move {
            let mut value = value;
            for mutator in &self.mutators {
                value = mutator.apply_only_mapped(value).await?;
            }
            Ok(value)
        })
    }

    fn apply_rev_only_mapped<'a>(
        &'a self,
        value: Value,
    ) -> BoxFuture<'a, Result<Value, MutateError>> {
        Box::pin(async move {
            let mut value = value;
            for mutator in self.mutators.iter().rev() {
                value = mutator.apply_rev_only_mapped(value).await?;
            }
            Ok(value)
        })
    }
}

/// The identity mutator. Both directions return the value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMutator;

impl Mutator for NoopMutator {
    fn apply<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>> {
        Box::pin(async move { Ok(value) })
    }

    fn apply_rev<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, MutateError>> {
        Box::pin(async move { Ok(value) })
    }
}
