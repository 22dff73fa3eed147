//! Turns a whole-value `getData`/`setData` pair into the full POSIX
//! file-operation surface (§4.2): `getattr`, `open`, `read`, `write`,
//! `release`, `truncate`, with per-open buffered handles.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::handle_registry::HandleRegistry;
use crate::protocol::{mode, Attr, Op};
use crate::route::{Handler, HandlerCtx, OpResult};

/// A route's whole-value contents, accepted either as raw bytes (a
/// screenshot) or text (everything else) and normalized to bytes for
/// storage.
#[derive(Clone, Debug)]
pub enum Content {
    Bytes(Vec<u8>),
    Text(String),
}

impl Content {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Bytes(b) => b,
            Content::Text(s) => s.into_bytes(),
        }
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(value: Vec<u8>) -> Self {
        Content::Bytes(value)
    }
}

pub type GetData = Arc<dyn Fn(HandlerCtx) -> BoxFuture<'static, Result<Content, Error>> + Send + Sync>;
pub type SetData = Arc<dyn Fn(HandlerCtx, String) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

fn required_u64(ctx: &HandlerCtx, field: &str) -> Result<u64, Error> {
    ctx.request
        .get_u64(field)
        .ok_or_else(|| Error::InvalidBody(format!("{field} missing from request")))
}

/// Builds the handler set for a contents-adapter route. `set_data` absent
/// means the file is read-only: no `write`/`truncate` handler is installed,
/// and `getattr` omits the write bits, matching the mode formula in §4.2.
pub fn build(
    get_data: GetData,
    set_data: Option<SetData>,
    handles: Arc<Mutex<HandleRegistry>>,
) -> HashMap<Op, Handler> {
    let mut ops: HashMap<Op, Handler> = HashMap::new();
    let writable = set_data.is_some();

    ops.insert(Op::Getattr, {
        let get_data = get_data.clone();
        Arc::new(move |ctx: HandlerCtx| {
            let get_data = get_data.clone();
            Box::pin(async move {
                let size = get_data(ctx).await?.into_bytes().len() as u64;
                let st_mode = mode::S_IFREG | 0o444 | if writable { 0o222 } else { 0 };
                Ok(OpResult::Attr(Attr {
                    st_mode,
                    st_nlink: 1,
                    st_size: size,
                }))
            }) as BoxFuture<'static, _>
        })
    });

    ops.insert(Op::Open, {
        let get_data = get_data.clone();
        let handles = handles.clone();
        Arc::new(move |ctx: HandlerCtx| {
            let get_data = get_data.clone();
            let handles = handles.clone();
            Box::pin(async move {
                let path = ctx.path.clone();
                let buf = get_data(ctx).await?.into_bytes();
                let mut registry = handles.lock().await;
                Ok(OpResult::Handle(registry.insert(path, buf)))
            })
        })
    });

    ops.insert(Op::Read, {
        let handles = handles.clone();
        Arc::new(move |ctx: HandlerCtx| {
            let handles = handles.clone();
            Box::pin(async move {
                let fh = required_u64(&ctx, "fh")?;
                let offset = ctx.request.get_u64("offset").unwrap_or(0) as usize;
                let size = ctx.request.get_u64("size").unwrap_or(0) as usize;
                let registry = handles.lock().await;
                let entry = registry
                    .get(fh)
                    .ok_or_else(|| Error::UnknownIdentifier(format!("file handle {fh}")))?;
                let start = offset.min(entry.buf.len());
                let end = offset.saturating_add(size).min(entry.buf.len());
                Ok(OpResult::Data(entry.buf[start..end].to_vec()))
            })
        })
    });

    ops.insert(Op::Release, {
        let handles = handles.clone();
        Arc::new(move |ctx: HandlerCtx| {
            let handles = handles.clone();
            Box::pin(async move {
                let fh = required_u64(&ctx, "fh")?;
                handles.lock().await.remove(fh);
                Ok(OpResult::Unit)
            })
        })
    });

    if let Some(set_data) = set_data {
        ops.insert(Op::Write, {
            let handles = handles.clone();
            let set_data = set_data.clone();
            Arc::new(move |ctx: HandlerCtx| {
                let handles = handles.clone();
                let set_data = set_data.clone();
                Box::pin(async move {
                    let fh = required_u64(&ctx, "fh")?;
                    let offset = ctx.request.get_u64("offset").unwrap_or(0) as usize;
                    let buf = ctx.request.decoded_buf()?.unwrap_or_default();

                    let updated = {
                        let mut registry = handles.lock().await;
                        let entry = registry
                            .get_mut(fh)
                            .ok_or_else(|| Error::UnknownIdentifier(format!("file handle {fh}")))?;
                        let needed = offset + buf.len();
                        if entry.buf.len() < needed {
                            entry.buf.resize(needed, 0);
                        }
                        entry.buf[offset..offset + buf.len()].copy_from_slice(&buf);
                        entry.buf.clone()
                    };

                    set_data(ctx, String::from_utf8(updated)?).await?;
                    Ok(OpResult::Written { size: buf.len() as u64 })
                })
            })
        });

        ops.insert(Op::Truncate, {
            let get_data = get_data.clone();
            let handles = handles.clone();
            Arc::new(move |ctx: HandlerCtx| {
                let get_data = get_data.clone();
                let set_data = set_data.clone();
                let handles = handles.clone();
                Box::pin(async move {
                    let size = required_u64(&ctx, "size")? as usize;
                    let mut buf = get_data(ctx.clone()).await?.into_bytes();
                    buf.resize(size, 0);

                    {
                        let mut registry = handles.lock().await;
                        let open: Vec<u64> = registry.handles_for_path(&ctx.path).collect();
                        for fh in open {
                            if let Some(entry) = registry.get_mut(fh) {
                                entry.buf = buf.clone();
                            }
                        }
                    }

                    set_data(ctx, String::from_utf8(buf)?).await?;
                    Ok(OpResult::Unit)
                })
            })
        });
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle_registry::HandleRegistry;
    use crate::protocol::{Op, Request};
    use serde_json::{Map, Value};
    use tokio::sync::Mutex as TokioMutex;

    fn ctx_for(path: &str, op: Op, fields: Vec<(&str, Value)>) -> HandlerCtx {
        let mut map = Map::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        HandlerCtx {
            path: path.to_string(),
            bindings: Default::default(),
            request: Request {
                id: 1,
                op,
                path: path.to_string(),
                fields: map,
            },
        }
    }

    fn fixed_get_data(initial: &'static str) -> (GetData, Arc<TokioMutex<String>>) {
        let state = Arc::new(TokioMutex::new(initial.to_string()));
        let get_data: GetData = {
            let state = state.clone();
            Arc::new(move |_ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move { Ok(Content::Text(state.lock().await.clone())) })
            })
        };
        (get_data, state)
    }

    fn recording_set_data(state: Arc<TokioMutex<String>>) -> SetData {
        Arc::new(move |_ctx: HandlerCtx, text: String| {
            let state = state.clone();
            Box::pin(async move {
                *state.lock().await = text;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn open_then_read_returns_getdata_snapshot() {
        let (get_data, _state) = fixed_get_data("hello");
        let handles = Arc::new(Mutex::new(HandleRegistry::default()));
        let ops = build(get_data, None, handles);

        let open = ops.get(&Op::Open).unwrap();
        let fh = match open(ctx_for("/f", Op::Open, vec![])).await.unwrap() {
            OpResult::Handle(h) => h,
            _ => panic!("expected a handle"),
        };

        let read = ops.get(&Op::Read).unwrap();
        let ctx = ctx_for(
            "/f",
            Op::Read,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("size", Value::from(5))],
        );
        match read(ctx).await.unwrap() {
            OpResult::Data(data) => assert_eq!(data, b"hello"),
            _ => panic!("expected data"),
        }
    }

    #[tokio::test]
    async fn read_only_route_has_no_write_or_truncate() {
        let (get_data, _state) = fixed_get_data("x");
        let handles = Arc::new(Mutex::new(HandleRegistry::default()));
        let ops = build(get_data, None, handles);
        assert!(!ops.contains_key(&Op::Write));
        assert!(!ops.contains_key(&Op::Truncate));
    }

    #[tokio::test]
    async fn chunked_write_round_trips_through_setdata() {
        let (get_data, state) = fixed_get_data("");
        let set_data = recording_set_data(state.clone());
        let handles = Arc::new(Mutex::new(HandleRegistry::default()));
        let ops = build(get_data, Some(set_data), handles);

        let open = ops.get(&Op::Open).unwrap();
        let fh = match open(ctx_for("/f", Op::Open, vec![])).await.unwrap() {
            OpResult::Handle(h) => h,
            _ => panic!("expected a handle"),
        };

        let write = ops.get(&Op::Write).unwrap();
        let buf1 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"hello");
        let ctx1 = ctx_for(
            "/f",
            Op::Write,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("buf", Value::from(buf1))],
        );
        match write.clone()(ctx1).await.unwrap() {
            OpResult::Written { size } => assert_eq!(size, 5),
            _ => panic!("expected written"),
        }

        let buf2 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b" world");
        let ctx2 = ctx_for(
            "/f",
            Op::Write,
            vec![("fh", Value::from(fh)), ("offset", Value::from(5)), ("buf", Value::from(buf2))],
        );
        match write(ctx2).await.unwrap() {
            OpResult::Written { size } => assert_eq!(size, 6),
            _ => panic!("expected written"),
        }

        assert_eq!(*state.lock().await, "hello world");

        let read = ops.get(&Op::Read).unwrap();
        let ctx3 = ctx_for(
            "/f",
            Op::Read,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("size", Value::from(11))],
        );
        match read(ctx3).await.unwrap() {
            OpResult::Data(data) => assert_eq!(data, b"hello world"),
            _ => panic!("expected data"),
        }
    }

    #[tokio::test]
    async fn truncate_grows_with_zero_padding() {
        let (get_data, state) = fixed_get_data("abc");
        let set_data = recording_set_data(state.clone());
        let handles = Arc::new(Mutex::new(HandleRegistry::default()));
        let ops = build(get_data, Some(set_data), handles);

        let truncate = ops.get(&Op::Truncate).unwrap();
        let ctx = ctx_for("/f", Op::Truncate, vec![("size", Value::from(5))]);
        truncate(ctx).await.unwrap();

        let stored = state.lock().await.clone();
        assert_eq!(stored.as_bytes(), b"abc\0\0");
    }

    #[tokio::test]
    async fn release_frees_the_handle() {
        let (get_data, _state) = fixed_get_data("x");
        let handles = Arc::new(Mutex::new(HandleRegistry::default()));
        let ops = build(get_data, None, handles.clone());

        let open = ops.get(&Op::Open).unwrap();
        let fh = match open(ctx_for("/f", Op::Open, vec![])).await.unwrap() {
            OpResult::Handle(h) => h,
            _ => panic!("expected a handle"),
        };

        let release = ops.get(&Op::Release).unwrap();
        let ctx = ctx_for("/f", Op::Release, vec![("fh", Value::from(fh))]);
        release(ctx).await.unwrap();

        assert!(handles.lock().await.get(fh).is_none());
    }
}
