//! Matches a request against the route table, binds path variables,
//! invokes the handler under a timeout, and encodes the reply (§4.4).
//! Transport-agnostic: the dispatcher only knows about [`Request`]/
//! [`Response`] values, never how they reached it.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;
use crate::protocol::{self, Op, Request, Response};
use crate::route::{HandlerCtx, OpResult, RouteTable};

/// Owns the compiled route table and the per-request timeout, and drives
/// requests to completion.
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, timeout: Duration) -> Self {
        Self { routes, timeout }
    }

    /// Spawns the request's handling and calls `reply` with the outcome.
    /// Spawning (rather than awaiting inline) is what lets a later request
    /// complete before an earlier, still-suspended one does (§5). On
    /// timeout, `reply` fires immediately with `ETIMEDOUT` and the spawned
    /// task is left to finish on its own; whatever it eventually produces
    /// is silently discarded (§5, "reply-and-forget").
    pub fn dispatch<F>(&self, request: Request, reply: F)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let routes = self.routes.clone();
        let timeout = self.timeout;
        let id = request.id;
        let op = request.op;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, handle(&routes, request)).await {
                Ok(response) => reply(response),
                Err(_) => {
                    warn!(request.id = id, ?op, "request timed out");
                    reply(Response::err(op, id, Error::Timeout.errno()));
                }
            }
        });
    }
}

#[tracing::instrument(skip_all, fields(request.id = request.id, request.op = ?request.op, request.path = %request.path))]
async fn handle(routes: &RouteTable, request: Request) -> Response {
    let op = request.op;
    let id = request.id;
    let path = request.path.clone();

    match handle_inner(routes, request).await {
        Ok(fields) => {
            debug!("request handled");
            Response::ok(op, id, fields)
        }
        Err(e) => {
            warn!(error = %e, path = %path, "request failed");
            Response::err(op, id, e.errno())
        }
    }
}

async fn handle_inner(
    routes: &RouteTable,
    request: Request,
) -> Result<serde_json::Map<String, Value>, Error> {
    if is_appledouble_companion(&request.path) {
        return Err(Error::Unsupported("AppleDouble companion file".to_string()));
    }

    let (entry, bindings) = routes
        .try_match(&request.path)
        .ok_or_else(|| Error::NoSuchEntry(request.path.clone()))?;

    let handler = entry
        .ops
        .get(&request.op)
        .ok_or_else(|| {
            Error::Unsupported(format!("{:?} not supported on {}", request.op, request.path))
        })?
        .clone();

    let ctx = HandlerCtx {
        path: request.path.clone(),
        bindings,
        request,
    };

    let result = handler(ctx).await?;
    Ok(encode_result(result))
}

fn encode_result(result: OpResult) -> serde_json::Map<String, Value> {
    match result {
        OpResult::Attr(attr) => attr.into_fields(),
        OpResult::Dir(children) => protocol::dir_entries(children),
        OpResult::Handle(fh) => {
            let mut m = serde_json::Map::new();
            m.insert("fh".to_string(), Value::from(fh));
            m
        }
        OpResult::Data(bytes) => {
            let mut m = serde_json::Map::new();
            m.insert("buf".to_string(), Value::String(STANDARD.encode(bytes)));
            m
        }
        OpResult::Written { size } => {
            let mut m = serde_json::Map::new();
            m.insert("size".to_string(), Value::from(size));
            m
        }
        OpResult::Unit => serde_json::Map::new(),
        OpResult::Link(target) => {
            let mut m = serde_json::Map::new();
            m.insert("target".to_string(), Value::from(target));
            m
        }
    }
}

/// macOS stashes per-file metadata (resource forks, Finder info) in a
/// sibling `._name` file; route authors never want to see these.
fn is_appledouble_companion(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .map(|segment| segment.starts_with("._"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteBuilder, RouteTable};
    use serde_json::Map;
    use tokio::sync::mpsc;

    fn req(path: &str, op: Op) -> Request {
        Request {
            id: 1,
            op,
            path: path.to_string(),
            fields: Map::new(),
        }
    }

    async fn run(dispatcher: &Dispatcher, request: Request) -> Response {
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.dispatch(request, move |response| {
            let _ = tx.send(response);
        });
        rx.recv().await.expect("dispatcher must reply")
    }

    #[tokio::test]
    async fn appledouble_companion_rejected_without_route_lookup() {
        let routes = Arc::new(RouteTable::build(vec![]));
        let dispatcher = Dispatcher::new(routes, Duration::from_secs(1));
        let response = run(&dispatcher, req("/any/._foo", Op::Getattr)).await;
        match response {
            Response::Err { errno, .. } => assert_eq!(errno, 45),
            _ => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn unmatched_path_reports_enoent() {
        let routes = Arc::new(RouteTable::build(vec![]));
        let dispatcher = Dispatcher::new(routes, Duration::from_secs(1));
        let response = run(&dispatcher, req("/nowhere", Op::Getattr)).await;
        match response {
            Response::Err { errno, .. } => assert_eq!(errno, libc::ENOENT),
            _ => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn op_not_declared_on_route_reports_enotsup() {
        let routes = Arc::new(RouteTable::build(vec![RouteBuilder::new("/f").op(
            Op::Read,
            Arc::new(|_ctx| Box::pin(async move { Ok(OpResult::Data(vec![])) })),
        )]));
        let dispatcher = Dispatcher::new(routes, Duration::from_secs(1));
        let response = run(&dispatcher, req("/f", Op::Write)).await;
        match response {
            Response::Err { errno, .. } => assert_eq!(errno, 45),
            _ => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let routes = Arc::new(RouteTable::build(vec![RouteBuilder::new("/slow").op(
            Op::Read,
            Arc::new(|_ctx| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(OpResult::Data(vec![]))
                })
            }),
        )]));
        let dispatcher = Dispatcher::new(routes, Duration::from_millis(10));
        let response = run(&dispatcher, req("/slow", Op::Read)).await;
        match response {
            Response::Err { errno, .. } => assert_eq!(errno, libc::ETIMEDOUT),
            _ => panic!("expected a timeout error"),
        }
    }

    #[tokio::test]
    async fn successful_read_echoes_op_and_id() {
        let routes = Arc::new(RouteTable::build(vec![RouteBuilder::new("/f").op(
            Op::Read,
            Arc::new(|_ctx| Box::pin(async move { Ok(OpResult::Data(b"hi".to_vec())) })),
        )]));
        let dispatcher = Dispatcher::new(routes, Duration::from_secs(1));
        let response = run(&dispatcher, req("/f", Op::Read)).await;
        match response {
            Response::Ok { op, id, fields } => {
                assert_eq!(op, Op::Read);
                assert_eq!(id, 1);
                assert_eq!(fields["buf"], Value::String(STANDARD.encode(b"hi")));
            }
            _ => panic!("expected a success response"),
        }
    }
}
