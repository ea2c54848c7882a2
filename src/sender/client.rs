//! Default base sender backed by the hyper-util legacy client.

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::context::RequestContext;
use crate::error::{SendError, TransportError};
use crate::sender::Sender;
use crate::Body;

/// Failure reported by the hyper-util client.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ClientError(#[from] hyper_util::client::legacy::Error);

impl TransportError for ClientError {
    /// Connection establishment failures are transient; anything later in the
    /// exchange is not.
    fn is_temporary(&self) -> bool {
        self.0.is_connect()
    }
}

/// Plain HTTP sender. Used as the base of a [`Chain`](crate::Chain) when no
/// other base is supplied.
#[derive(Clone, Debug)]
pub struct HttpSender {
    client: Client<HttpConnector, Body>,
}

impl HttpSender {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpSender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender for HttpSender {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        Box::pin(async move {
            let cx = RequestContext::of(&request);
            let response: Response<Incoming> = cx
                .run(self.client.request(request))
                .await?
                .map_err(|e| SendError::transport(ClientError(e)))?;

            Ok(response.map(Body::new))
        })
    }
}
