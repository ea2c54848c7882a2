//! Sender abstraction and composition.
//!
//! # Data Flow
//! ```text
//! caller
//!     → outermost wrapper (last registered)
//!     → ... (each wrapper sees only its next sender)
//!     → base sender (client.rs, or a caller-supplied one)
//!     → response travels back out through the same wrappers
//! ```
//!
//! # Design Decisions
//! - `Sender` is the degenerate "request in, response out" capability
//! - `Middleware` is the chained form that receives its next sender per call
//! - Closures satisfy both through `sender_fn` and `middleware_fn`
//! - Composition is resolved once in `Chain::build`

pub mod chain;
pub mod client;
pub mod replay;

use std::future::Future;
use std::sync::Arc;

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use crate::error::SendError;
use crate::Body;

pub use chain::Chain;
pub use client::HttpSender;

/// Shared, type-erased sender.
pub type BoxSender = Arc<dyn Sender>;

/// Executes a single request/response transaction.
pub trait Sender: Send + Sync {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>>;
}

impl<S: Sender + ?Sized> Sender for Arc<S> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        (**self).send(request)
    }
}

impl<S: Sender + ?Sized> Sender for Box<S> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        (**self).send(request)
    }
}

/// A wrapper that runs around the next sender in a chain.
pub trait Middleware: Send + Sync {
    fn send(&self, request: Request<Body>, next: BoxSender) -> BoxFuture<'_, Result<Response<Body>, SendError>>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn send(&self, request: Request<Body>, next: BoxSender) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        (**self).send(request, next)
    }
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn send(&self, request: Request<Body>, next: BoxSender) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        (**self).send(request, next)
    }
}

/// A middleware bound to the sender it delegates to.
pub struct Next<M> {
    middleware: M,
    next: BoxSender,
}

impl<M: Middleware> Next<M> {
    pub fn new(middleware: M, next: BoxSender) -> Self {
        Self { middleware, next }
    }
}

impl<M: Middleware> Sender for Next<M> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        self.middleware.send(request, Arc::clone(&self.next))
    }
}

/// Sender backed by a closure. See [`sender_fn`].
#[derive(Clone)]
pub struct SenderFn<F> {
    f: F,
}

/// Use a closure as a [`Sender`].
pub fn sender_fn<F, Fut>(f: F) -> SenderFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, SendError>> + Send + 'static,
{
    SenderFn { f }
}

impl<F, Fut> Sender for SenderFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, SendError>> + Send + 'static,
{
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        Box::pin((self.f)(request))
    }
}

/// Middleware backed by a closure. See [`middleware_fn`].
#[derive(Clone)]
pub struct MiddlewareFn<F> {
    f: F,
}

/// Use a closure as a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn<F>
where
    F: Fn(Request<Body>, BoxSender) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, SendError>> + Send + 'static,
{
    MiddlewareFn { f }
}

impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(Request<Body>, BoxSender) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, SendError>> + Send + 'static,
{
    fn send(&self, request: Request<Body>, next: BoxSender) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        Box::pin((self.f)(request, next))
    }
}
