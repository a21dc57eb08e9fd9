//! Core middleware trait and continuation chain.

use iris_core::{Action, BoxFuture, Response};
use std::sync::Arc;

/// The core middleware trait.
///
/// Middleware receive the action and a [`Next`] callback continuing the
/// chain. They may transform the action before running `next`, transform
/// the response after, or short-circuit by returning a response without
/// running `next` at all.
///
/// # Invariants
///
/// - Middleware MUST run `next` at most once (`Next` is consumed by
///   [`Next::run`], so the type system enforces this)
/// - Middleware MUST NOT discard an already-set terminal status on the
///   response they return
///
/// # Example
///
/// ```
/// use iris_core::{Action, BoxFuture, Response};
/// use iris_middleware::{Middleware, Next};
///
/// struct Tagging;
///
/// impl Middleware for Tagging {
///     fn name(&self) -> &'static str {
///         "tagging"
///     }
///
///     fn process<'a>(&'a self, action: Action, next: Next<'a>) -> BoxFuture<'a, Response> {
///         Box::pin(async move {
///             let mut response = next.run(action).await;
///             response.warning = Some("tagged".to_string());
///             response
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware, used for logging.
    fn name(&self) -> &'static str;

    /// Processes the action through this middleware.
    fn process<'a>(&'a self, action: Action, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// Callback continuing the middleware chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Terminal(Box<dyn FnOnce(Action) -> BoxFuture<'a, Response> + Send + 'a>),
}

impl<'a> Next<'a> {
    fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` invoking the innermost dispatch step.
    pub fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(Action) -> BoxFuture<'a, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// Invokes the next middleware or the terminal step.
    pub async fn run(self, action: Action) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(action, *next).await,
            NextInner::Terminal(terminal) => terminal(action).await,
        }
    }
}

/// An ordered middleware stack, composed once at construction.
///
/// The first middleware in the stack is outermost: it sees the action
/// first and the response last. Cloning the stack is cheap; the
/// middleware list is shared.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    middleware: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareStack {
    /// Creates a stack from the given middleware, in declaration order.
    #[must_use]
    pub fn new(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middleware: Arc::new(middleware),
        }
    }

    /// Creates an empty stack that runs the terminal step directly.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of middleware in the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns `true` when the stack holds no middleware.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Returns the middleware names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|mw| mw.name()).collect()
    }

    /// Runs the action through the stack and into the terminal step.
    pub async fn process<'a, F>(&'a self, action: Action, terminal: F) -> Response
    where
        F: FnOnce(Action) -> BoxFuture<'a, Response> + Send + 'a,
    {
        // Wrap back to front so the first-declared middleware is outermost
        let mut next = Next::terminal(terminal);
        for middleware in self.middleware.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next.run(action).await
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("names", &self.names())
            .finish()
    }
}
