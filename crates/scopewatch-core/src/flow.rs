//! Logical flows and the registry of their scope stacks.
//!
//! A flow is a thread, or a tokio task entered through [`in_new_flow`] /
//! [`spawn`]. Each flow owns at most one registered [`FlowStack`]. Ids come
//! from a process-wide counter and are never reused, so a recycled worker
//! thread can not inherit a stale stack.
//!
//! Child work that runs on a flow with no open scope (a spawned task, a pool
//! thread) nests under the scope it was requested from, and that flow starts
//! a stack of its own. Stacks are only pushed by the flow they belong to.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use dashmap::DashMap;
use serde::Serialize;

use crate::scope::ScopeNode;

static NEXT_FLOW: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_FLOW: FlowId = FlowId::next();
}

tokio::task_local! {
    static TASK_FLOW: FlowId;
}

/// Identifier of one logical flow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FlowId(u64);

impl FlowId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        FlowId(NEXT_FLOW.fetch_add(1, Ordering::Relaxed))
    }

    /// The enclosing task flow if there is one, else this thread's flow.
    pub fn current() -> Self {
        TASK_FLOW
            .try_with(|id| *id)
            .unwrap_or_else(|_| THREAD_FLOW.with(|id| *id))
    }

    pub fn from_raw(raw: u64) -> Self {
        FlowId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run `fut` as a new logical flow.
pub fn in_new_flow<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    TASK_FLOW.scope(FlowId::next(), fut)
}

/// Run a synchronous closure as a new logical flow.
pub fn run_in_new_flow<R>(f: impl FnOnce() -> R) -> R {
    TASK_FLOW.sync_scope(FlowId::next(), f)
}

/// `tokio::spawn` the future as a new logical flow.
pub fn spawn<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(in_new_flow(fut))
}

/// Result of one cascade-close step on a stack.
pub(crate) enum Unwind {
    /// The closing node was on top and has been popped.
    Reached,
    /// A deeper node was on top; it has been popped and must be closed.
    Orphan(Arc<ScopeNode>),
    /// Empty stack, or a node that is not deeper: leave the stack alone.
    Stop,
}

/// LIFO of open scopes for one flow.
pub struct FlowStack {
    flow: FlowId,
    detached: bool,
    entries: Mutex<Vec<Arc<ScopeNode>>>,
}

impl FlowStack {
    pub(crate) fn new(flow: FlowId) -> Self {
        Self {
            flow,
            detached: false,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Stack that is never registered under its flow (fixed scopes).
    pub(crate) fn detached(flow: FlowId) -> Self {
        Self {
            detached: true,
            ..Self::new(flow)
        }
    }

    /// Flow this stack was created for.
    pub fn flow(&self) -> FlowId {
        self.flow
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn push(&self, node: Arc<ScopeNode>) {
        self.lock().push(node);
    }

    /// Top node that is still open. Closed nodes left on top are discarded.
    pub(crate) fn top_open(&self) -> Option<Arc<ScopeNode>> {
        let mut entries = self.lock();
        while let Some(top) = entries.last() {
            if !top.is_closed() {
                return Some(Arc::clone(top));
            }
            entries.pop();
        }
        None
    }

    pub(crate) fn unwind_step(&self, closing: &Arc<ScopeNode>) -> Unwind {
        let mut entries = self.lock();
        let Some(top) = entries.last() else {
            return Unwind::Stop;
        };
        if Arc::ptr_eq(top, closing) {
            entries.pop();
            return Unwind::Reached;
        }
        if top.depth() > closing.depth() {
            return entries.pop().map_or(Unwind::Stop, Unwind::Orphan);
        }
        Unwind::Stop
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ScopeNode>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for FlowStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowStack")
            .field("flow", &self.flow)
            .field("len", &self.len())
            .finish()
    }
}

/// Registry: `flow -> stack of open scopes`.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    stacks: DashMap<FlowId, Arc<FlowStack>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            stacks: DashMap::new(),
        }
    }

    /// Process-wide registry used by tracers that are not given their own.
    pub fn global() -> Arc<FlowRegistry> {
        static GLOBAL: OnceLock<Arc<FlowRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(FlowRegistry::new())))
    }

    /// Stack registered for `flow`, created empty on first use.
    pub fn stack_for(&self, flow: FlowId) -> Arc<FlowStack> {
        self.stacks
            .entry(flow)
            .or_insert_with(|| Arc::new(FlowStack::new(flow)))
            .value()
            .clone()
    }

    /// Install a fresh, empty stack for `flow`, dropping any previous one.
    pub fn reset(&self, flow: FlowId) -> Arc<FlowStack> {
        let stack = Arc::new(FlowStack::new(flow));
        self.stacks.insert(flow, Arc::clone(&stack));
        stack
    }

    /// Unregister `stack` if it is still the one registered for its flow and
    /// it holds nothing.
    pub fn release(&self, stack: &Arc<FlowStack>) {
        self.stacks
            .remove_if(&stack.flow(), |_, s| Arc::ptr_eq(s, stack) && s.is_empty());
    }

    /// Register `stack` again after a push if a concurrent `release` removed
    /// it while it was momentarily empty.
    pub(crate) fn reinstate(&self, stack: &Arc<FlowStack>) {
        if stack.detached || stack.is_empty() {
            return;
        }
        self.stacks
            .entry(stack.flow())
            .or_insert_with(|| Arc::clone(stack));
    }

    /// Number of flows with a registered stack.
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Resolve where a child scope requested on the current flow goes.
    ///
    /// The current flow's stack wins when it has an open scope on top.
    /// Otherwise the flow adopts the requesting scope as the parent, so work
    /// launched onto another flow stays nested under the chain that launched
    /// it.
    pub(crate) fn attachment(&self) -> Attachment {
        let current = self
            .stacks
            .get(&FlowId::current())
            .map(|r| Arc::clone(r.value()));

        match current.and_then(|stack| stack.top_open().map(|top| (stack, top))) {
            Some((stack, top)) => Attachment::Current { stack, top },
            None => Attachment::Adopt,
        }
    }
}

/// Where a new child scope attaches.
pub(crate) enum Attachment {
    /// Under the open scope on top of the current flow's stack.
    Current {
        stack: Arc<FlowStack>,
        top: Arc<ScopeNode>,
    },
    /// Nothing open on the current flow: under the creating scope, on the
    /// current flow's own stack.
    Adopt,
}
