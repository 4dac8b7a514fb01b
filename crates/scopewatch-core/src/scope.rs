//! Scope nodes and the handles returned to callers.
//!
//! A [`Scope`] owns the right to close its node and does so on drop. A
//! [`ScopeHandle`] is a cheap clone that can open children, collect and read
//! timings, but never closes anything when dropped.
//!
//! Closing a node stops its timer, cascade-closes descendants left open on
//! its stack, then merges its aggregation map and its own elapsed time into
//! the parent. Every step after the first `close` is a no-op.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::Level;

use crate::clock::ElapsedTimer;
use crate::flow::{Attachment, FlowId, FlowStack, Unwind};
use crate::metric::{AggregationMap, MetricLabel};
use crate::report;
use crate::snapshot::Snapshot;
use crate::tracer::Shared;

static NEXT_ANON: AtomicU64 = AtomicU64::new(1);

/// What a handle stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// A scope created by normal nesting (or a root).
    Normal,
    /// An alias of an existing scope returned instead of a new child; closing
    /// it does nothing.
    Ignored,
    /// A scope attached directly under the outermost ancestor.
    Fixed,
}

/// Child creation arguments. Blank names count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeRequest<'a> {
    pub name: Option<&'a str>,
    pub caller: Option<&'a str>,
    pub ignore_nested: bool,
}

impl<'a> ScopeRequest<'a> {
    pub fn named(name: &'a str) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn from_caller(caller: &'a str) -> Self {
        Self {
            caller: Some(caller),
            ..Self::default()
        }
    }

    /// Mark the new scope so that its own children are suppressed.
    pub fn ignore_nested(mut self, yes: bool) -> Self {
        self.ignore_nested = yes;
        self
    }

    fn chosen_name(&self) -> String {
        non_blank(self.name)
            .or_else(|| non_blank(self.caller))
            .map(str::to_owned)
            .unwrap_or_else(unique_token)
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn unique_token() -> String {
    format!("anon-{}", NEXT_ANON.fetch_add(1, Ordering::Relaxed))
}

pub(crate) struct ScopeNode {
    label: String,
    depth: u32,
    flow: FlowId,
    created_at: u64,
    ignore_nested: bool,
    timer: ElapsedTimer,
    parent: Option<Weak<ScopeNode>>,
    stack: Arc<FlowStack>,
    aggregation: AggregationMap,
    closed: AtomicBool,
    shared: Arc<Shared>,
}

impl ScopeNode {
    /// Build a node, start its timer and push it onto `stack`.
    pub(crate) fn open(
        shared: Arc<Shared>,
        label: String,
        parent: Option<&Arc<ScopeNode>>,
        stack: Arc<FlowStack>,
        ignore_nested: bool,
    ) -> Arc<ScopeNode> {
        let timer = ElapsedTimer::start(Arc::clone(&shared.clock));
        let created_at = u64::try_from(timer.started().as_nanos()).unwrap_or(u64::MAX);

        let node = Arc::new(ScopeNode {
            label,
            depth: parent.map_or(1, |p| p.depth + 1),
            flow: FlowId::current(),
            created_at,
            ignore_nested,
            timer,
            parent: parent.map(Arc::downgrade),
            stack: Arc::clone(&stack),
            aggregation: AggregationMap::new(),
            closed: AtomicBool::new(false),
            shared,
        });
        stack.push(Arc::clone(&node));

        node.shared.log(
            Level::TRACE,
            &format!(
                "scope opened: {} (depth={}, flow={})",
                node.label, node.depth, node.flow
            ),
        );
        node
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn metric_label(&self) -> MetricLabel {
        MetricLabel::new(self.flow, self.label.clone(), self.depth, self.created_at)
    }

    /// Outermost ancestor still alive (`self` for a root).
    fn outermost(self: &Arc<Self>) -> Arc<ScopeNode> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent.as_ref().and_then(Weak::upgrade) {
            current = parent;
        }
        current
    }

    fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.timer.stop();
        self.unwind();
        self.flush();

        self.shared.log(
            Level::TRACE,
            &format!(
                "scope closed: {} ({} ms)",
                self.label,
                self.timer.milliseconds()
            ),
        );
    }

    /// Pop this node off its stack, closing deeper nodes left above it.
    fn unwind(self: &Arc<Self>) {
        loop {
            match self.stack.unwind_step(self) {
                Unwind::Orphan(orphan) => {
                    self.shared.log(
                        Level::DEBUG,
                        &format!(
                            "cascade-closing {} left open under {}",
                            orphan.label, self.label
                        ),
                    );
                    orphan.close();
                }
                Unwind::Reached | Unwind::Stop => break,
            }
        }
        if self.stack.is_empty() {
            self.shared.registry.release(&self.stack);
        }
    }

    fn flush(&self) {
        let own = self.metric_label();
        let ms = self.timer.milliseconds();
        match &self.parent {
            Some(weak) => {
                // a parent that is already gone ends the chain
                if let Some(parent) = weak.upgrade() {
                    parent.aggregation.merge_from(&self.aggregation);
                    parent.aggregation.merge(own, ms);
                }
            }
            // roots keep their own row so the top-level report includes it
            None => self.aggregation.merge(own, ms),
        }
    }
}

/// Cloneable, non-closing reference to a scope.
#[derive(Clone)]
pub struct ScopeHandle {
    node: Arc<ScopeNode>,
    mode: ScopeMode,
}

impl ScopeHandle {
    pub fn label(&self) -> &str {
        &self.node.label
    }

    /// `1` for a root.
    pub fn depth(&self) -> u32 {
        self.node.depth
    }

    /// Flow that created the scope.
    pub fn flow(&self) -> FlowId {
        self.node.flow
    }

    /// Clock reading at creation, in nanoseconds.
    pub fn created_at(&self) -> u64 {
        self.node.created_at
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn ignores_nested(&self) -> bool {
        self.node.ignore_nested
    }

    pub fn is_closed(&self) -> bool {
        self.node.is_closed()
    }

    /// Running elapsed time; frozen once closed.
    pub fn elapsed(&self) -> Duration {
        self.node.timer.elapsed()
    }

    pub fn milliseconds(&self) -> u64 {
        self.node.timer.milliseconds()
    }

    /// The key this scope's time is aggregated under in its parent.
    pub fn metric_label(&self) -> MetricLabel {
        self.node.metric_label()
    }

    /// Whether both handles refer to the same scope.
    pub fn same_scope(&self, other: &ScopeHandle) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Label of the parent scope, if it is still alive.
    pub fn parent_label(&self) -> Option<String> {
        self.node
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|p| p.label.clone())
    }

    /// Open a named child scope.
    pub fn scope(&self, name: &str) -> Scope {
        self.scope_with(ScopeRequest::named(name))
    }

    /// Open a child scope named by a generated unique token.
    pub fn scope_unnamed(&self) -> Scope {
        self.scope_with(ScopeRequest::default())
    }

    /// Open a child scope.
    ///
    /// The parent is the open scope on top of this scope's own stack when
    /// that stack belongs to the current flow, else the open scope on top of
    /// the current flow's stack, else this scope (the flow then starts its
    /// own stack). A parent that ignores nesting, or one
    /// that is already closed, is handed back as an [`ScopeMode::Ignored`]
    /// alias and nothing new is created.
    pub fn scope_with(&self, req: ScopeRequest<'_>) -> Scope {
        let registry = &self.node.shared.registry;
        let (parent, stack) = match self.own_stack_top() {
            Some((top, stack)) => (top, Some(stack)),
            None => match registry.attachment() {
                Attachment::Current { stack, top } => (top, Some(stack)),
                Attachment::Adopt => (Arc::clone(&self.node), None),
            },
        };

        if parent.ignore_nested {
            return Scope::new(parent, ScopeMode::Ignored);
        }
        if parent.is_closed() {
            parent.shared.log(
                Level::WARN,
                &format!("child scope requested under closed scope {}", parent.label),
            );
            return Scope::new(parent, ScopeMode::Ignored);
        }

        let stack = stack.unwrap_or_else(|| registry.stack_for(FlowId::current()));
        let label = format!(
            "{}{}{}",
            parent.label,
            parent.shared.options.key_separator,
            req.chosen_name()
        );
        let node = ScopeNode::open(
            Arc::clone(&parent.shared),
            label,
            Some(&parent),
            Arc::clone(&stack),
            req.ignore_nested,
        );
        registry.reinstate(&stack);
        Scope::new(node, ScopeMode::Normal)
    }

    /// Open top of the stack this scope lives on, when that stack belongs to
    /// the current flow. Keeps children of a fixed scope inside its subtree.
    fn own_stack_top(&self) -> Option<(Arc<ScopeNode>, Arc<FlowStack>)> {
        let stack = &self.node.stack;
        if stack.flow() != FlowId::current() {
            return None;
        }
        stack.top_open().map(|top| (top, Arc::clone(stack)))
    }

    /// Open a scope directly under the outermost ancestor, on a stack of its
    /// own, regardless of how deep this scope is.
    pub fn fixed(&self, name: &str) -> Scope {
        let root = self.node.outermost();
        if root.is_closed() {
            root.shared.log(
                Level::WARN,
                &format!("fixed scope requested under closed scope {}", root.label),
            );
            return Scope::new(root, ScopeMode::Ignored);
        }

        let label = format!(
            "{}{}{}",
            root.label,
            root.shared.options.key_separator,
            ScopeRequest::named(name).chosen_name()
        );
        let stack = Arc::new(FlowStack::detached(FlowId::current()));
        let node = ScopeNode::open(Arc::clone(&root.shared), label, Some(&root), stack, false);
        Scope::new(node, ScopeMode::Fixed)
    }

    /// Close the scope. Idempotent; a no-op on ignored aliases.
    pub fn close(&self) {
        if self.mode != ScopeMode::Ignored {
            self.node.close();
        }
    }

    /// Immutable copy of the aggregation map as of now.
    pub fn collect(&self) -> Snapshot {
        Snapshot::from_entries(self.node.aggregation.entries())
    }

    /// Send a line to the tracer's sink under its logger category.
    pub fn log(&self, level: Level, message: &str) {
        self.node.shared.log(level, message);
    }

    /// Render the collected snapshot as a table and log it at `level`.
    /// Nothing is logged when there is nothing collected.
    pub fn collect_all(&self, level: Level) {
        let table = report::render_table(&self.collect());
        if !table.is_empty() {
            self.log(level, &table);
        }
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("label", &self.node.label)
            .field("depth", &self.node.depth)
            .field("flow", &self.node.flow)
            .field("mode", &self.mode)
            .field("milliseconds", &self.milliseconds())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ms)", self.node.label, self.milliseconds())
    }
}

/// Owning scope guard: closes on drop.
#[derive(Debug)]
pub struct Scope {
    handle: ScopeHandle,
}

impl Scope {
    pub(crate) fn new(node: Arc<ScopeNode>, mode: ScopeMode) -> Self {
        Self {
            handle: ScopeHandle { node, mode },
        }
    }

    /// A non-closing handle to share with other code (request extensions,
    /// spawned tasks).
    pub fn handle(&self) -> ScopeHandle {
        self.handle.clone()
    }
}

impl Deref for Scope {
    type Target = ScopeHandle;

    fn deref(&self) -> &ScopeHandle {
        &self.handle
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.handle.close();
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle, f)
    }
}
