//! `/runtime/...` — the engine's own introspection surface: its source as
//! a hot-reloadable file, and a plain-text dump of the route table (§4.5,
//! §6, §9).

use std::sync::Arc;

use crate::contents::Content;
use crate::error::Error;
use crate::protocol::{mode, Attr};
use crate::route::{HandlerCtx, OpResult, RouteBuilder};

use super::CatalogState;

pub fn routes(state: &Arc<CatalogState>) -> Vec<RouteBuilder> {
    vec![background_js(state), routes_txt(state)]
}

async fn current_source(state: &CatalogState) -> String {
    state.background_source.lock().await.clone().unwrap_or_default()
}

fn background_js(state: &Arc<CatalogState>) -> RouteBuilder {
    let getattr_state = state.clone();
    let open_state = state.clone();
    let read_state = state.clone();
    let write_state = state.clone();
    let release_state = state.clone();
    let truncate_state = state.clone();

    RouteBuilder::new("/runtime/background.js")
        .usage("read-write; on release the new source is evaluated in the background page")
        .op(
            crate::protocol::Op::Getattr,
            Arc::new(move |_ctx: HandlerCtx| {
                let state = getattr_state.clone();
                Box::pin(async move {
                    let size = current_source(&state).await.into_bytes().len() as u64;
                    Ok(OpResult::Attr(Attr {
                        st_mode: mode::S_IFREG | 0o666,
                        st_nlink: 1,
                        st_size: size,
                    }))
                })
            }),
        )
        .op(
            crate::protocol::Op::Open,
            Arc::new(move |ctx: HandlerCtx| {
                let state = open_state.clone();
                Box::pin(async move {
                    let buf = current_source(&state).await.into_bytes();
                    let mut handles = state.handles.lock().await;
                    Ok(OpResult::Handle(handles.insert(ctx.path.clone(), buf)))
                })
            }),
        )
        .op(
            crate::protocol::Op::Read,
            Arc::new(move |ctx: HandlerCtx| {
                let state = read_state.clone();
                Box::pin(async move {
                    let fh = ctx
                        .request
                        .get_u64("fh")
                        .ok_or_else(|| Error::InvalidBody("read requires fh".to_string()))?;
                    let offset = ctx.request.get_u64("offset").unwrap_or(0) as usize;
                    let size = ctx.request.get_u64("size").unwrap_or(0) as usize;
                    let handles = state.handles.lock().await;
                    let entry = handles
                        .get(fh)
                        .ok_or_else(|| Error::UnknownIdentifier(format!("file handle {fh}")))?;
                    let start = offset.min(entry.buf.len());
                    let end = offset.saturating_add(size).min(entry.buf.len());
                    Ok(OpResult::Data(entry.buf[start..end].to_vec()))
                })
            }),
        )
        .op(
            crate::protocol::Op::Write,
            Arc::new(move |ctx: HandlerCtx| {
                let state = write_state.clone();
                Box::pin(async move {
                    let fh = ctx
                        .request
                        .get_u64("fh")
                        .ok_or_else(|| Error::InvalidBody("write requires fh".to_string()))?;
                    let offset = ctx.request.get_u64("offset").unwrap_or(0) as usize;
                    let buf = ctx.request.decoded_buf()?.unwrap_or_default();

                    let mut handles = state.handles.lock().await;
                    let entry = handles
                        .get_mut(fh)
                        .ok_or_else(|| Error::UnknownIdentifier(format!("file handle {fh}")))?;
                    let needed = offset + buf.len();
                    if entry.buf.len() < needed {
                        entry.buf.resize(needed, 0);
                    }
                    entry.buf[offset..offset + buf.len()].copy_from_slice(&buf);

                    Ok(OpResult::Written { size: buf.len() as u64 })
                })
            }),
        )
        .op(
            crate::protocol::Op::Release,
            Arc::new(move |ctx: HandlerCtx| {
                let state = release_state.clone();
                Box::pin(async move {
                    let fh = ctx
                        .request
                        .get_u64("fh")
                        .ok_or_else(|| Error::InvalidBody("release requires fh".to_string()))?;

                    let source = {
                        let mut handles = state.handles.lock().await;
                        let entry = handles
                            .remove(fh)
                            .ok_or_else(|| Error::UnknownIdentifier(format!("file handle {fh}")))?;
                        String::from_utf8(entry.buf)?
                    };

                    *state.background_source.lock().await = Some(source.clone());
                    state.browser.execute_background_script(&source).await?;
                    Ok(OpResult::Unit)
                })
            }),
        )
        .op(
            crate::protocol::Op::Truncate,
            Arc::new(move |ctx: HandlerCtx| {
                let state = truncate_state.clone();
                Box::pin(async move {
                    let size = ctx
                        .request
                        .get_u64("size")
                        .ok_or_else(|| Error::InvalidBody("truncate requires size".to_string()))?
                        as usize;

                    let mut buf = current_source(&state).await.into_bytes();
                    buf.resize(size, 0);

                    {
                        let mut handles = state.handles.lock().await;
                        let open: Vec<u64> = handles.handles_for_path(&ctx.path).collect();
                        for fh in open {
                            if let Some(entry) = handles.get_mut(fh) {
                                entry.buf = buf.clone();
                            }
                        }
                    }

                    *state.background_source.lock().await = Some(String::from_utf8(buf)?);
                    Ok(OpResult::Unit)
                })
            }),
        )
}

fn routes_txt(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    RouteBuilder::new("/runtime/routes.txt")
        .usage("read-only; pattern and usage hint per declared route")
        .ops(crate::contents::build(
            Arc::new(move |_ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let mut out = String::new();
                    if let Some(table) = state.routes.get() {
                        for entry in table.declared_routes() {
                            out.push_str(&entry.pattern);
                            for hint in &entry.usage {
                                out.push_str(" -- ");
                                out.push_str(hint);
                            }
                            out.push('\n');
                        }
                    }
                    Ok(Content::Text(out))
                })
            }),
            None,
            state.handles.clone(),
        ))
}
