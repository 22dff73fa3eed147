//! `/windows/...` — scalar geometry/focus files over a window, plus the
//! tab-id listing for each window (§4.5).

use std::sync::Arc;

use crate::browser::WindowUpdate;
use crate::contents::{self, Content};
use crate::error::Error;
use crate::route::{HandlerCtx, OpResult, RouteBuilder};

use super::CatalogState;

pub fn routes(state: &Arc<CatalogState>) -> Vec<RouteBuilder> {
    vec![
        list_by_id(state),
        scalar_bool(state, "focused.txt", |w| w.focused, |u, v| u.focused = Some(v)),
        scalar_int(state, "top.txt", |w| w.top, |u, v| u.top = Some(v)),
        scalar_int(state, "left.txt", |w| w.left, |u, v| u.left = Some(v)),
        scalar_int(state, "width.txt", |w| w.width, |u, v| u.width = Some(v)),
        scalar_int(state, "height.txt", |w| w.height, |u, v| u.height = Some(v)),
        scalar_state(state),
        tabs_listing(state),
    ]
}

fn list_by_id(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/windows/by-id")
        .usage("live window ids")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |_ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let windows = state.browser.list_windows().await?;
                    Ok(OpResult::Dir(windows.iter().map(|w| w.id.to_string()).collect()))
                })
            }),
        )
}

fn scalar_bool(
    state: &Arc<CatalogState>,
    filename: &'static str,
    get: fn(&crate::browser::WindowInfo) -> bool,
    set: fn(&mut WindowUpdate, bool),
) -> RouteBuilder {
    let get_state = state.clone();
    let set_state = state.clone();
    RouteBuilder::new(format!("/windows/by-id/#WINDOW_ID/{filename}"))
        .usage("read-write boolean, \"true\" or \"false\"")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    let window = state.browser.get_window(id).await?;
                    Ok(Content::Text(get(&window).to_string()))
                })
            }),
            Some(Arc::new(move |ctx: HandlerCtx, text: String| {
                let state = set_state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    let value: bool = text
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidBody(format!("not a bool: {text:?}")))?;
                    let mut update = WindowUpdate::default();
                    set(&mut update, value);
                    state.browser.update_window(id, update).await
                })
            })),
            state.handles.clone(),
        ))
}

fn scalar_int(
    state: &Arc<CatalogState>,
    filename: &'static str,
    get: fn(&crate::browser::WindowInfo) -> i32,
    set: fn(&mut WindowUpdate, i32),
) -> RouteBuilder {
    let get_state = state.clone();
    let set_state = state.clone();
    RouteBuilder::new(format!("/windows/by-id/#WINDOW_ID/{filename}"))
        .usage("read-write decimal integer")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    let window = state.browser.get_window(id).await?;
                    Ok(Content::Text(get(&window).to_string()))
                })
            }),
            Some(Arc::new(move |ctx: HandlerCtx, text: String| {
                let state = set_state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    let value: i32 = text
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidBody(format!("not an integer: {text:?}")))?;
                    let mut update = WindowUpdate::default();
                    set(&mut update, value);
                    state.browser.update_window(id, update).await
                })
            })),
            state.handles.clone(),
        ))
}

fn scalar_state(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    let set_state = state.clone();
    RouteBuilder::new("/windows/by-id/#WINDOW_ID/state.txt")
        .usage("read-write, e.g. \"normal\" | \"minimized\" | \"maximized\" | \"fullscreen\"")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    Ok(Content::Text(state.browser.get_window(id).await?.state))
                })
            }),
            Some(Arc::new(move |ctx: HandlerCtx, text: String| {
                let state = set_state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    state
                        .browser
                        .update_window(
                            id,
                            WindowUpdate {
                                state: Some(text.trim().to_string()),
                                ..Default::default()
                            },
                        )
                        .await
                })
            })),
            state.handles.clone(),
        ))
}

fn tabs_listing(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/windows/by-id/#WINDOW_ID/tabs")
        .usage("read-only listing of this window's tab ids")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let id = ctx.int("windowId")?;
                    let tabs = state.browser.tabs_in_window(id).await?;
                    Ok(OpResult::Dir(tabs.into_iter().map(|t| t.to_string()).collect()))
                })
            }),
        )
}
