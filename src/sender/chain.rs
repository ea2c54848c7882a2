//! Chain construction.
//!
//! A [`Chain`] records wrapper constructors in registration order and folds
//! them over the base sender once, in [`Chain::build`]. Each step sets
//! "new sender = wrapper(old sender)", so the last-registered wrapper ends up
//! outermost and runs first on every request.
//!
//! Two conventions feed the same fold:
//! - [`Chain::layer`] takes a `tower::Layer` that turns the next sender into a
//!   new one (nested convention)
//! - [`Chain::pipeline`] takes a group of [`Middleware`] values that run code
//!   both before and after calling their next sender (symmetric convention)

use std::sync::Arc;

use tower::Layer;

use crate::sender::{BoxSender, HttpSender, Middleware, Next, Sender};

type Wrap = Box<dyn FnOnce(BoxSender) -> BoxSender + Send>;

/// Ordered list of wrappers around a base sender.
#[derive(Default)]
pub struct Chain {
    base: Option<BoxSender>,
    wraps: Vec<Wrap>,
}

impl Chain {
    /// An empty chain over the default [`HttpSender`].
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty chain over `base`.
    pub fn with_base<S: Sender + 'static>(base: S) -> Self {
        Self {
            base: Some(Arc::new(base)),
            wraps: Vec::new(),
        }
    }

    /// Replace the base sender.
    pub fn base<S: Sender + 'static>(mut self, base: S) -> Self {
        self.base = Some(Arc::new(base));
        self
    }

    /// Wrap everything registered so far with `layer`.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxSender> + Send + 'static,
        L::Service: Sender + 'static,
    {
        self.wraps.push(Box::new(move |next| Arc::new(layer.layer(next)) as BoxSender));
        self
    }

    /// Wrap everything registered so far with each layer of `group`, in order,
    /// so the last one of the group is outermost.
    pub fn layers<I, L>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Layer<BoxSender> + Send + 'static,
        L::Service: Sender + 'static,
    {
        for layer in group {
            self = self.layer(layer);
        }
        self
    }

    /// Wrap everything registered so far with each middleware of `group`, in
    /// order, so the last one of the group is outermost.
    pub fn pipeline<I, M>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Middleware + 'static,
    {
        for middleware in group {
            self.wraps.push(Box::new(move |next| Arc::new(Next::new(middleware, next)) as BoxSender));
        }
        self
    }

    /// Number of registered wrappers.
    pub fn len(&self) -> usize {
        self.wraps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wraps.is_empty()
    }

    /// Resolve the chain into a single sender.
    pub fn build(self) -> BoxSender {
        let base = self.base.unwrap_or_else(|| Arc::new(HttpSender::new()));
        self.wraps.into_iter().fold(base, |next, wrap| wrap(next))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("has_base", &self.base.is_some())
            .field("wrappers", &self.wraps.len())
            .finish()
    }
}
