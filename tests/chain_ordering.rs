//! Chain composition order.

use std::sync::{Arc, Mutex};

use axum::http::Request;
use resilient_sender::{middleware_fn, sender_fn, Body, BoxSender, Chain, Middleware, Sender};
use tower::layer::{layer_fn, Layer};

mod common;

type Log = Arc<Mutex<Vec<String>>>;

fn printing_layer(name: &'static str, log: Log) -> impl Layer<BoxSender, Service = impl Sender + 'static> + Send + 'static {
    layer_fn(move |next: BoxSender| {
        let log = log.clone();
        sender_fn(move |req| {
            log.lock().unwrap().push(name.to_string());
            let next = next.clone();
            async move { next.send(req).await }
        })
    })
}

fn symmetric(name: &'static str, log: Log) -> impl Middleware {
    middleware_fn(move |req, next: BoxSender| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(format!("{name}-entry"));
            let response = next.send(req).await;
            log.lock().unwrap().push(format!("{name}-exit"));
            response
        }
    })
}

#[tokio::test]
async fn nested_groups_run_last_registered_first() {
    let log: Log = Arc::default();
    let sender = Chain::with_base(common::ok_sender("response body"))
        .layers([printing_layer("A", log.clone()), printing_layer("B", log.clone())])
        .layers([printing_layer("C", log.clone())])
        .build();

    let response = sender.send(Request::new(Body::empty())).await.unwrap();
    log.lock().unwrap().push(common::body_string(response).await);

    assert_eq!(*log.lock().unwrap(), ["C", "B", "A", "response body"]);
}

#[tokio::test]
async fn symmetric_groups_unwind_in_reverse() {
    let log: Log = Arc::default();
    let sender = Chain::with_base(common::ok_sender("response body"))
        .pipeline([symmetric("A", log.clone()), symmetric("B", log.clone())])
        .pipeline([symmetric("C", log.clone())])
        .build();

    let response = sender.send(Request::new(Body::empty())).await.unwrap();
    log.lock().unwrap().push(common::body_string(response).await);

    assert_eq!(
        *log.lock().unwrap(),
        ["C-entry", "B-entry", "A-entry", "A-exit", "B-exit", "C-exit", "response body"]
    );
}

#[tokio::test]
async fn built_chain_is_reusable_across_tasks() {
    let log: Log = Arc::default();
    let sender = Chain::with_base(common::ok_sender("ok"))
        .pipeline([symmetric("A", log.clone())])
        .build();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let sender = sender.clone();
            tokio::spawn(async move { sender.send(Request::new(Body::empty())).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(log.lock().unwrap().len(), 8);
}
