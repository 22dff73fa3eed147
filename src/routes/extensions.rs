//! `/extensions/...` — read-only name/version and read-write enabled
//! state over the extension management API (§4.5).

use std::sync::Arc;

use crate::contents::{self, Content};
use crate::error::Error;
use crate::route::{HandlerCtx, OpResult, RouteBuilder};

use super::CatalogState;

pub fn routes(state: &Arc<CatalogState>) -> Vec<RouteBuilder> {
    vec![list_by_id(state), name_file(state), version_file(state), enabled_file(state)]
}

fn list_by_id(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/extensions/by-id")
        .usage("installed extension ids")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |_ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let extensions = state.browser.list_extensions().await?;
                    Ok(OpResult::Dir(extensions.into_iter().map(|e| e.id).collect()))
                })
            }),
        )
}

fn name_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    RouteBuilder::new("/extensions/by-id/:EXTENSION_ID/name.txt")
        .usage("read-only")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let id = ctx.string("extensionId")?.to_string();
                    Ok(Content::Text(state.browser.get_extension(&id).await?.name))
                })
            }),
            None,
            state.handles.clone(),
        ))
}

fn version_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    RouteBuilder::new("/extensions/by-id/:EXTENSION_ID/version.txt")
        .usage("read-only")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let id = ctx.string("extensionId")?.to_string();
                    Ok(Content::Text(state.browser.get_extension(&id).await?.version))
                })
            }),
            None,
            state.handles.clone(),
        ))
}

fn enabled_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    let set_state = state.clone();
    RouteBuilder::new("/extensions/by-id/:EXTENSION_ID/enabled.txt")
        .usage("read-write boolean, \"true\" or \"false\"")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let id = ctx.string("extensionId")?.to_string();
                    Ok(Content::Text(state.browser.get_extension(&id).await?.enabled.to_string()))
                })
            }),
            Some(Arc::new(move |ctx: HandlerCtx, text: String| {
                let state = set_state.clone();
                Box::pin(async move {
                    let id = ctx.string("extensionId")?.to_string();
                    let enabled: bool = text
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidBody(format!("not a bool: {text:?}")))?;
                    state.browser.set_extension_enabled(&id, enabled).await
                })
            })),
            state.handles.clone(),
        ))
}
