//! The route table: author-declared routes, ancestor-directory synthesis,
//! and default-handler injection (§4.3).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Error;
use crate::pattern::{Binding, Bindings, Matcher};
use crate::protocol::{mode, Attr, Op, Request};

/// Everything a handler needs: the concrete path that matched, the typed
/// variables bound out of it, and the raw request (for scalar fields like
/// `offset`/`size`/`buf`).
#[derive(Clone, Debug)]
pub struct HandlerCtx {
    pub path: String,
    pub bindings: Bindings,
    pub request: Request,
}

impl HandlerCtx {
    pub fn int(&self, name: &str) -> Result<u64, Error> {
        self.bindings
            .get(name)
            .and_then(Binding::as_int)
            .ok_or_else(|| Error::UnknownIdentifier(name.to_string()))
    }

    pub fn string(&self, name: &str) -> Result<&str, Error> {
        self.bindings
            .get(name)
            .map(Binding::as_str)
            .ok_or_else(|| Error::UnknownIdentifier(name.to_string()))
    }
}

/// What a handler produced, before the dispatcher turns it into wire
/// fields. One variant per shape of result a POSIX op can return.
#[derive(Clone, Debug)]
pub enum OpResult {
    Attr(Attr),
    /// Child names, *not* including `.`/`..` — the dispatcher adds those.
    Dir(Vec<String>),
    Handle(u64),
    Data(Vec<u8>),
    Written { size: u64 },
    Unit,
    Link(String),
}

pub type Handler = Arc<dyn Fn(HandlerCtx) -> BoxFuture<'static, Result<OpResult, Error>> + Send + Sync>;

/// A compiled, immutable route: its matcher, an optional usage hint for
/// self-documentation, and the operations it answers.
pub struct RouteEntry {
    pub pattern: String,
    pub matcher: Matcher,
    pub usage: Vec<String>,
    pub ops: HashMap<Op, Handler>,
    pub synthetic: bool,
}

/// Builds up a [`RouteEntry`] before the table compiles it. Used by the
/// route catalog (§4.5) to declare routes in source order.
pub struct RouteBuilder {
    pattern: String,
    usage: Vec<String>,
    ops: HashMap<Op, Handler>,
}

impl RouteBuilder {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            usage: Vec::new(),
            ops: HashMap::new(),
        }
    }

    pub fn usage(mut self, hint: impl Into<String>) -> Self {
        self.usage.push(hint.into());
        self
    }

    pub fn op(mut self, op: Op, handler: Handler) -> Self {
        self.ops.insert(op, handler);
        self
    }

    /// Merges in a pre-built set of operations, e.g. from the contents
    /// adapter (§4.2). Handlers passed explicitly via [`Self::op`] always
    /// take priority if called afterwards; callers that want the contents
    /// adapter's handlers to win should call this last.
    pub fn ops(mut self, ops: HashMap<Op, Handler>) -> Self {
        self.ops.extend(ops);
        self
    }
}

/// Holds the ordered set of route entries and answers path lookups.
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Runs all three construction phases (§4.3) over the catalog's
    /// author-declared routes and returns the finished table. The
    /// dispatcher never observes an intermediate state.
    pub fn build(declared: Vec<RouteBuilder>) -> Self {
        let mut entries: Vec<RouteEntry> = declared
            .into_iter()
            .map(|b| RouteEntry {
                matcher: Matcher::compile(&b.pattern),
                pattern: b.pattern,
                usage: b.usage,
                ops: b.ops,
                synthetic: false,
            })
            .collect();

        synthesize_ancestors(&mut entries);

        for entry in &mut entries {
            inject_defaults(entry);
        }

        Self { entries }
    }

    /// First matching route wins, per insertion order (§4.4). Declared
    /// routes come before any synthetic ancestor routes.
    pub fn try_match(&self, path: &str) -> Option<(&RouteEntry, Bindings)> {
        for entry in &self.entries {
            if let Some(bindings) = entry.matcher.try_match(path) {
                return Some((entry, bindings));
            }
        }
        None
    }

    /// Author-declared routes only, for the introspection views (§6) —
    /// synthetic ancestor routes are suppressed.
    pub fn declared_routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter().filter(|e| !e.synthetic)
    }
}

fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() <= 1 {
        Some("/".to_string())
    } else {
        Some(format!("/{}", segments[..segments.len() - 1].join("/")))
    }
}

/// The unique first-hop segment of every key under `prefix` in `existing`.
fn direct_children(prefix: &str, existing: &BTreeSet<String>) -> Vec<String> {
    let prefix_with_slash = if prefix == "/" {
        "/".to_string()
    } else {
        format!("{prefix}/")
    };
    let mut children = BTreeSet::new();
    for key in existing {
        if let Some(rest) = key.strip_prefix(prefix_with_slash.as_str()) {
            if let Some(first) = rest.split('/').next() {
                if !first.is_empty() {
                    children.insert(first.to_string());
                }
            }
        }
    }
    children.into_iter().collect()
}

/// Phase B: fills in a synthetic `readdir`-only route for every ancestor
/// prefix that isn't already a key in the table.
fn synthesize_ancestors(entries: &mut Vec<RouteEntry>) {
    let mut existing: BTreeSet<String> = entries.iter().map(|e| e.pattern.clone()).collect();

    let mut declared: Vec<String> = entries.iter().map(|e| e.pattern.clone()).collect();
    declared.sort_by_key(|p| std::cmp::Reverse(depth(p)));

    for leaf in declared {
        let mut current = leaf;
        while let Some(parent) = parent_of(&current) {
            if !existing.contains(&parent) {
                let children = direct_children(&parent, &existing);
                entries.push(RouteEntry {
                    matcher: Matcher::compile(&parent),
                    pattern: parent.clone(),
                    usage: Vec::new(),
                    ops: readdir_only(children),
                    synthetic: true,
                });
                existing.insert(parent.clone());
            }
            current = parent;
        }
    }
}

fn readdir_only(children: Vec<String>) -> HashMap<Op, Handler> {
    let children = Arc::new(children);
    let mut ops = HashMap::new();
    ops.insert(Op::Readdir, {
        let children = children.clone();
        Arc::new(move |_ctx: HandlerCtx| {
            let children = children.clone();
            Box::pin(async move { Ok(OpResult::Dir((*children).clone())) }) as BoxFuture<'static, _>
        }) as Handler
    });
    ops
}

/// Phase C: fills in `getattr`/`opendir`/`releasedir`/`open`/`release`
/// defaults based on which operations an entry already declares.
fn inject_defaults(entry: &mut RouteEntry) {
    if entry.ops.contains_key(&Op::Readdir) {
        entry
            .ops
            .entry(Op::Getattr)
            .or_insert_with(default_dir_getattr);
        entry.ops.entry(Op::Opendir).or_insert_with(default_fixed_handle);
        entry.ops.entry(Op::Releasedir).or_insert_with(default_unit);
    } else if let Some(readlink) = entry.ops.get(&Op::Readlink).cloned() {
        entry
            .ops
            .entry(Op::Getattr)
            .or_insert_with(|| default_symlink_getattr(readlink));
    } else if entry.ops.contains_key(&Op::Read) || entry.ops.contains_key(&Op::Write) {
        let readable = entry.ops.contains_key(&Op::Read);
        let writable = entry.ops.contains_key(&Op::Write);
        entry
            .ops
            .entry(Op::Getattr)
            .or_insert_with(move || default_file_getattr(readable, writable));
        entry.ops.entry(Op::Open).or_insert_with(default_fixed_handle);
        entry.ops.entry(Op::Release).or_insert_with(default_unit);
    }
}

fn default_dir_getattr() -> Handler {
    Arc::new(|_ctx: HandlerCtx| {
        Box::pin(async move {
            Ok(OpResult::Attr(Attr {
                st_mode: mode::S_IFDIR | 0o755,
                st_nlink: 3,
                st_size: 0,
            }))
        })
    })
}

fn default_fixed_handle() -> Handler {
    Arc::new(|_ctx: HandlerCtx| Box::pin(async move { Ok(OpResult::Handle(1)) }))
}

fn default_unit() -> Handler {
    Arc::new(|_ctx: HandlerCtx| Box::pin(async move { Ok(OpResult::Unit) }))
}

fn default_symlink_getattr(readlink: Handler) -> Handler {
    Arc::new(move |ctx: HandlerCtx| {
        let readlink = readlink.clone();
        Box::pin(async move {
            match readlink(ctx).await? {
                OpResult::Link(target) => Ok(OpResult::Attr(Attr {
                    st_mode: mode::S_IFLNK | 0o444,
                    st_nlink: 1,
                    st_size: target.len() as u64 + 1,
                })),
                _ => unreachable!("a readlink handler must return OpResult::Link"),
            }
        })
    })
}

/// Placeholder size (100) matches the teacher's own admission that this is
/// a lie to the OS — clients trusting it will over- or under-read (§9).
fn default_file_getattr(readable: bool, writable: bool) -> Handler {
    let mode_bits = mode::S_IFREG
        | if readable { 0o444 } else { 0 }
        | if writable { 0o222 } else { 0 };
    Arc::new(move |_ctx: HandlerCtx| {
        Box::pin(async move {
            Ok(OpResult::Attr(Attr {
                st_mode: mode_bits,
                st_nlink: 1,
                st_size: 100,
            }))
        })
    })
}
