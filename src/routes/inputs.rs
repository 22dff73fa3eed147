//! `/tabs/by-id/<id>/inputs/<inputId>.txt` — reads and writes a DOM
//! element's `.value` by id via injected script (§4.5).

use std::sync::Arc;

use crate::contents::{self, Content};
use crate::route::{HandlerCtx, OpResult, RouteBuilder};

use super::CatalogState;

pub fn routes(state: &Arc<CatalogState>) -> Vec<RouteBuilder> {
    vec![list_by_tab(state), input_value_file(state)]
}

fn input_id(filename: &str) -> &str {
    filename.strip_suffix(".txt").unwrap_or(filename)
}

/// Lists the inputs this tab has actually had a value read or set for.
/// Ancestor synthesis can't do this on its own: its only declared child
/// is the wildcard pattern `:INPUT_FILENAME`, not a real filename.
fn list_by_tab(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/inputs")
        .usage("ids of inputs this tab has read or written")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let ids = state.browser.list_input_ids(tab_id).await?;
                    Ok(OpResult::Dir(ids.into_iter().map(|id| format!("{id}.txt")).collect()))
                })
            }),
        )
}

fn input_value_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    let set_state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/inputs/:INPUT_FILENAME")
        .usage("read-write the named input element's .value")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let input_id = input_id(ctx.string("inputFilename")?).to_string();
                    Ok(Content::Text(state.browser.get_input_value(tab_id, &input_id).await?))
                })
            }),
            Some(Arc::new(move |ctx: HandlerCtx, text: String| {
                let state = set_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let input_id = input_id(ctx.string("inputFilename")?).to_string();
                    state.browser.set_input_value(tab_id, &input_id, &text).await
                })
            })),
            state.handles.clone(),
        ))
}
