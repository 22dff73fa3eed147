//! `/tabs/by-id/<id>/debugger/scripts/...` — reads/writes script source
//! via the debug protocol, backed by a per-tab script map populated from
//! debug-protocol events (§4.5, §5).

use std::sync::Arc;

use crate::route::{HandlerCtx, OpResult, RouteBuilder};

use super::CatalogState;

pub fn routes(state: &Arc<CatalogState>) -> Vec<RouteBuilder> {
    vec![scripts_listing(state), script_entry(state)]
}

/// `<scriptId>_<sanitizedUrl>` -> the script id, trusting the first `_`.
fn parse_script_id(entry: &str) -> &str {
    entry.split('_').next().unwrap_or(entry)
}

fn scripts_listing(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/debugger/scripts")
        .usage("known scripts, named <scriptId>_<sanitizedUrl>")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    state.browser.attach_debugger(tab_id).await?;
                    let scripts = state.scripts.lock().await;
                    let names = scripts
                        .get(&tab_id)
                        .into_iter()
                        .flat_map(|m| m.values())
                        .map(|s| format!("{}_{}", s.script_id, crate::sanitize::sanitize(&s.url)))
                        .collect();
                    Ok(OpResult::Dir(names))
                })
            }),
        )
}

fn script_entry(state: &Arc<CatalogState>) -> RouteBuilder {
    let read_state = state.clone();
    let write_state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/debugger/scripts/:SCRIPT_ENTRY")
        .usage("read fetches source via the debug protocol; write pushes updated source")
        .op(
            crate::protocol::Op::Read,
            Arc::new(move |ctx: HandlerCtx| {
                let state = read_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let entry = ctx.string("scriptEntry")?;
                    let script_id = parse_script_id(entry);
                    state.browser.attach_debugger(tab_id).await?;
                    let source = state.browser.debugger_get_script_source(tab_id, script_id).await?;
                    Ok(OpResult::Data(source.into_bytes()))
                })
            }),
        )
        .op(
            crate::protocol::Op::Write,
            Arc::new(move |ctx: HandlerCtx| {
                let state = write_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let entry = ctx.string("scriptEntry")?.to_string();
                    let script_id = parse_script_id(&entry).to_string();
                    let buf = ctx.request.decoded_buf()?.unwrap_or_default();
                    let source = String::from_utf8(buf.clone())?;
                    state.browser.attach_debugger(tab_id).await?;
                    state
                        .browser
                        .debugger_set_script_source(tab_id, &script_id, &source)
                        .await?;
                    Ok(OpResult::Written { size: buf.len() as u64 })
                })
            }),
        )
}
