//! `/tabs/...` — the tab-facing half of the catalog (§4.5).

use std::sync::Arc;

use serde_json::Value;

use crate::browser::TabUpdate;
use crate::contents::{self, Content};
use crate::error::Error;
use crate::route::{HandlerCtx, OpResult, RouteBuilder};
use crate::sanitize::sanitize;

use super::{CatalogState, EvalEntry};

pub fn routes(state: &Arc<CatalogState>) -> Vec<RouteBuilder> {
    vec![
        list_by_id(state),
        list_by_title(state),
        by_title_entry(state),
        url_file(state),
        title_file(state),
        screenshot_file(state),
        evals_listing(state),
        evals_entry(state),
        watches_listing(state),
        watches_entry(state),
    ]
}

fn list_by_id(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/tabs/by-id")
        .usage("live tab ids")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |_ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let tabs = state.browser.list_tabs().await?;
                    Ok(OpResult::Dir(tabs.iter().map(|t| t.id.to_string()).collect()))
                })
            }),
        )
}

fn list_by_title(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/tabs/by-title")
        .usage("symlinks named <sanitized-title>.<id> -> ../by-id/<id>")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |_ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let tabs = state.browser.list_tabs().await?;
                    Ok(OpResult::Dir(
                        tabs.iter()
                            .map(|t| format!("{}.{}", sanitize(&t.title), t.id))
                            .collect(),
                    ))
                })
            }),
        )
}

/// Splits a `by-title` entry name into its tab id, trusting the trailing
/// `.<id>` appended when the symlink was listed.
fn parse_by_title_id(filename: &str) -> Result<u64, Error> {
    filename
        .rsplit_once('.')
        .and_then(|(_title, id)| id.parse().ok())
        .ok_or_else(|| Error::UnknownIdentifier(filename.to_string()))
}

fn by_title_entry(state: &Arc<CatalogState>) -> RouteBuilder {
    let unlink_state = state.clone();
    RouteBuilder::new("/tabs/by-title/:FILENAME")
        .usage("readlink -> ../by-id/<id>; unlink closes the tab")
        .op(
            crate::protocol::Op::Readlink,
            Arc::new(move |ctx: HandlerCtx| {
                Box::pin(async move {
                    let filename = ctx.string("filename")?;
                    let id = parse_by_title_id(filename)?;
                    Ok(OpResult::Link(format!("../by-id/{id}")))
                })
            }),
        )
        .op(
            crate::protocol::Op::Unlink,
            Arc::new(move |ctx: HandlerCtx| {
                let state = unlink_state.clone();
                Box::pin(async move {
                    let filename = ctx.string("filename")?;
                    let id = parse_by_title_id(filename)?;
                    state.browser.close_tab(id).await?;
                    Ok(OpResult::Unit)
                })
            }),
        )
}

fn url_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    let set_state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/url.txt")
        .usage("read-write: navigating writes update the tab's location")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    Ok(Content::Text(state.browser.get_tab(tab_id).await?.url))
                })
            }),
            Some(Arc::new(move |ctx: HandlerCtx, text: String| {
                let state = set_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    state
                        .browser
                        .update_tab(tab_id, TabUpdate { url: Some(text) })
                        .await
                })
            })),
            state.handles.clone(),
        ))
}

fn title_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/title.txt")
        .usage("read-only")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    Ok(Content::Text(state.browser.get_tab(tab_id).await?.title))
                })
            }),
            None,
            state.handles.clone(),
        ))
}

fn screenshot_file(state: &Arc<CatalogState>) -> RouteBuilder {
    let get_state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/screenshot.png")
        .usage("read-only")
        .ops(contents::build(
            Arc::new(move |ctx: HandlerCtx| {
                let state = get_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    Ok(Content::Bytes(state.browser.capture_tab(tab_id).await?))
                })
            }),
            None,
            state.handles.clone(),
        ))
}

fn eval_key(filename: &str) -> (&str, bool) {
    match filename.strip_suffix(".result") {
        Some(base) => (base, true),
        None => (filename, false),
    }
}

/// Lists the evaluations `mknod`'d against this tab, plus each one's
/// `.result` sibling once it has run. Ancestor synthesis can't do this on
/// its own: its only declared child is the wildcard pattern `:FILENAME`,
/// not a real eval name.
fn evals_listing(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/evals")
        .usage("names of evals created via mknod, plus <name>.result once run")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(move |ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let evals = state.evals.lock().await;
                    let mut names = Vec::new();
                    for ((id, base), entry) in evals.iter() {
                        if *id != tab_id {
                            continue;
                        }
                        names.push(base.clone());
                        if entry.result.is_some() {
                            names.push(format!("{base}.result"));
                        }
                    }
                    Ok(OpResult::Dir(names))
                })
            }),
        )
}

fn evals_entry(state: &Arc<CatalogState>) -> RouteBuilder {
    let mknod_state = state.clone();
    let write_state = state.clone();
    let read_state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/evals/:FILENAME")
        .usage("mknod creates an eval; write executes it; read <name>.result for the last result")
        .op(
            crate::protocol::Op::Mknod,
            Arc::new(move |ctx: HandlerCtx| {
                let state = mknod_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let filename = ctx.string("filename")?;
                    let (base, is_result) = eval_key(filename);
                    if is_result {
                        return Err(Error::NotPermitted(
                            "the .result file is computed, not created".to_string(),
                        ));
                    }
                    state
                        .evals
                        .lock()
                        .await
                        .insert((tab_id, base.to_string()), EvalEntry::default());
                    Ok(OpResult::Unit)
                })
            }),
        )
        .op(
            crate::protocol::Op::Write,
            Arc::new(move |ctx: HandlerCtx| {
                let state = write_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let filename = ctx.string("filename")?.to_string();
                    let (base, is_result) = eval_key(&filename);
                    if is_result {
                        return Err(Error::Unsupported(
                            "cannot write to a computed result file".to_string(),
                        ));
                    }
                    let buf = ctx.request.decoded_buf()?.unwrap_or_default();
                    let code = String::from_utf8(buf.clone())?;

                    let outcome = state.browser.execute_script(tab_id, &code).await?;
                    let result = serde_json::to_string(&outcome)?;

                    state
                        .evals
                        .lock()
                        .await
                        .insert((tab_id, base.to_string()), EvalEntry { code, result: Some(result) });

                    Ok(OpResult::Written { size: buf.len() as u64 })
                })
            }),
        )
        .op(
            crate::protocol::Op::Read,
            Arc::new(move |ctx: HandlerCtx| {
                let state = read_state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let filename = ctx.string("filename")?;
                    let (base, is_result) = eval_key(filename);
                    let evals = state.evals.lock().await;
                    let entry = evals
                        .get(&(tab_id, base.to_string()))
                        .ok_or_else(|| Error::UnknownIdentifier(filename.to_string()))?;
                    let text = if is_result {
                        entry.result.clone().unwrap_or_default()
                    } else {
                        entry.code.clone()
                    };
                    Ok(OpResult::Data(text.into_bytes()))
                })
            }),
        )
}

/// Watches are computed on demand, not kept in any backing table, so
/// there are never any real names to list; an empty directory is
/// correct here. Declared explicitly anyway so ancestor synthesis never
/// gets a chance to list the literal wildcard pattern as a bogus entry.
fn watches_listing(_state: &Arc<CatalogState>) -> RouteBuilder {
    RouteBuilder::new("/tabs/by-id/#TAB_ID/watches")
        .usage("empty; watch files are created by the host, not discoverable here")
        .op(
            crate::protocol::Op::Readdir,
            Arc::new(|_ctx: HandlerCtx| Box::pin(async move { Ok(OpResult::Dir(Vec::new())) })),
        )
}

fn watches_entry(state: &Arc<CatalogState>) -> RouteBuilder {
    let state = state.clone();
    RouteBuilder::new("/tabs/by-id/#TAB_ID/watches/:EXPR")
        .usage("each read re-evaluates the expression against the tab")
        .op(
            crate::protocol::Op::Read,
            Arc::new(move |ctx: HandlerCtx| {
                let state = state.clone();
                Box::pin(async move {
                    let tab_id = ctx.int("tabId")?;
                    let expr = ctx.string("expr")?;
                    let outcome: Value = state.browser.execute_script(tab_id, expr).await?;
                    Ok(OpResult::Data(serde_json::to_vec(&outcome)?))
                })
            }),
        )
}
