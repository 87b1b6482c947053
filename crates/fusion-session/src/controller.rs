//! RecomputeController: keeps combinator tables in step with the graph.
//!
//! Each combinator node runs a small state machine:
//! `Idle -> Dirty -> Materializing -> Idle`, with `Error` terminal for
//! the attempt (the node stays live and is retried on the next dirtying
//! event) and `NotConfigured` as the quiescent no-input/no-keys state.
//!
//! A refresh derives the node's input queries from the graph, plans the
//! matching job, and compares the plan against the last applied one --
//! query-text equality is the no-op signal, which is why derivation must
//! be byte-deterministic. Planning rules:
//! - either required input empty -> clear the backing table (an edge
//!   removal must never leave previously combined rows visible);
//! - join with an empty key-column set -> `NotConfigured`, no job at all
//!   (distinct from materialize-to-empty);
//! - otherwise materialize from the kind-specific SELECT.
//!
//! A port's active query is either derived from topology or explicitly
//! overridden by the user; switching modes is an explicit action, not a
//! reconciliation between the two.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;

use fusion_core::graph::PipelineGraph;
use fusion_core::id::NodeId;
use fusion_core::node::NodeKind;
use fusion_core::query::{derive_input_query, join_select, union_select};
use fusion_core::InputPort;

use crate::events::{EventSink, SessionEvent};
use crate::job::{Job, JobAction, JobError};
use crate::queue::{JobHandle, MutationQueue};

/// Observable recomputation state of a combinator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecomputeState {
    /// Backing table matches the last applied plan.
    Idle,
    /// Inputs changed; a job is about to be planned.
    Dirty,
    /// A materialize/clear job is queued or running.
    Materializing,
    /// Missing input or join keys; nothing to do until configured.
    NotConfigured,
    /// The last attempt failed; retried on the next dirtying event.
    Error,
}

/// What a refresh decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Clear,
    Materialize(String),
}

#[derive(Debug)]
struct NodeRuntime {
    /// Guards against a settle task writing into a node that reused this
    /// `NodeId` after the original was removed (the graph arena recycles
    /// slots).
    generation: u64,
    state: RecomputeState,
    /// The last plan that was enqueued; equality with the next plan is
    /// the no-op signal.
    applied: Option<Plan>,
    override_a: Option<String>,
    override_b: Option<String>,
}

impl NodeRuntime {
    fn new(generation: u64) -> Self {
        NodeRuntime {
            generation,
            state: RecomputeState::NotConfigured,
            applied: None,
            override_a: None,
            override_b: None,
        }
    }
}

struct ControllerInner {
    nodes: DashMap<NodeId, NodeRuntime>,
    /// Settle tasks still in flight; drained by `flush`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_generation: AtomicU64,
    events: EventSink,
}

impl ControllerInner {
    fn fresh_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }
}

/// Watches combinator inputs and re-issues materialize jobs through the
/// mutation queue.
#[derive(Clone)]
pub struct RecomputeController {
    inner: Arc<ControllerInner>,
}

impl RecomputeController {
    pub fn new(events: EventSink) -> Self {
        RecomputeController {
            inner: Arc::new(ControllerInner {
                nodes: DashMap::new(),
                tasks: Mutex::new(Vec::new()),
                next_generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Starts tracking a newly created combinator.
    pub fn track(&self, id: NodeId) {
        let generation = self.inner.fresh_generation();
        self.inner.nodes.insert(id, NodeRuntime::new(generation));
    }

    /// Stops tracking a removed node and drops its runtime state.
    pub fn forget(&self, id: NodeId) {
        self.inner.nodes.remove(&id);
    }

    /// Current state of a tracked combinator.
    pub fn state(&self, id: NodeId) -> Option<RecomputeState> {
        self.inner.nodes.get(&id).map(|rt| rt.state)
    }

    /// Sets a port's query override. Takes effect on the next refresh.
    pub fn set_override(&self, id: NodeId, port: InputPort, text: String) {
        if let Some(mut rt) = self.inner.nodes.get_mut(&id) {
            match port {
                InputPort::A => rt.override_a = Some(text),
                InputPort::B => rt.override_b = Some(text),
            }
        }
    }

    /// Reverts a port to the graph-derived query.
    pub fn clear_override(&self, id: NodeId, port: InputPort) {
        if let Some(mut rt) = self.inner.nodes.get_mut(&id) {
            match port {
                InputPort::A => rt.override_a = None,
                InputPort::B => rt.override_b = None,
            }
        }
    }

    /// The query text currently active for `(id, port)`: the user's
    /// override if one is set, otherwise derived from topology.
    pub fn active_query(&self, graph: &PipelineGraph, id: NodeId, port: InputPort) -> String {
        let overridden = self.inner.nodes.get(&id).and_then(|rt| match port {
            InputPort::A => rt.override_a.clone(),
            InputPort::B => rt.override_b.clone(),
        });
        overridden.unwrap_or_else(|| derive_input_query(graph, id, port))
    }

    /// Re-plans a combinator after its inputs (possibly) changed.
    ///
    /// `force` bypasses the no-op check; the manual "update table"
    /// action uses it to retry an unchanged plan.
    pub fn refresh(
        &self,
        graph: &PipelineGraph,
        queue: &MutationQueue,
        id: NodeId,
        force: bool,
    ) {
        let Some(node) = graph.get_node(id) else {
            return;
        };
        if !node.is_combinator() {
            return;
        }
        let label = node.label.clone();

        let query_a = self.active_query(graph, id, InputPort::A);
        let query_b = self.active_query(graph, id, InputPort::B);

        let plan = if query_a.is_empty() || query_b.is_empty() {
            Some(Plan::Clear)
        } else {
            match &node.kind {
                NodeKind::Union => Some(Plan::Materialize(union_select(&query_a, &query_b))),
                NodeKind::Join { columns } => {
                    if columns.is_empty() {
                        None
                    } else {
                        Some(Plan::Materialize(join_select(&query_a, &query_b, columns)))
                    }
                }
                NodeKind::Source { .. } => unreachable!("sources are not combinators"),
            }
        };

        let mut rt = self
            .inner
            .nodes
            .entry(id)
            .or_insert_with(|| NodeRuntime::new(self.inner.fresh_generation()));
        let Some(plan) = plan else {
            tracing::debug!(%label, "combinator not configured, skipping");
            rt.state = RecomputeState::NotConfigured;
            rt.applied = None;
            // Outcomes of jobs planned before this point no longer apply.
            rt.generation = self.inner.fresh_generation();
            return;
        };

        // Query-text equality is the no-op signal -- but only while the
        // plan is applied or in flight. A failed attempt is retried even
        // on unchanged text.
        let unchanged = rt.applied.as_ref() == Some(&plan);
        let healthy = matches!(
            rt.state,
            RecomputeState::Idle | RecomputeState::Materializing
        );
        if !force && unchanged && healthy {
            return;
        }

        rt.state = RecomputeState::Dirty;
        let cleared = matches!(plan, Plan::Clear);
        let action = match &plan {
            Plan::Clear => JobAction::Clear,
            Plan::Materialize(select_sql) => JobAction::Materialize {
                select_sql: select_sql.clone(),
            },
        };
        rt.applied = Some(plan);
        rt.state = RecomputeState::Materializing;
        let generation = rt.generation;
        drop(rt);

        tracing::debug!(%label, cleared, "combinator recompute enqueued");
        let handle = queue.enqueue(Job::new(label, action));
        self.settle(id, generation, cleared, handle);
    }

    /// Spawns a task that waits for the job and records the outcome.
    ///
    /// The outcome only touches runtime state if the node still carries
    /// the generation the job was planned for.
    fn settle(&self, id: NodeId, generation: u64, cleared: bool, handle: JobHandle) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let label = handle.label().to_string();
            match handle.wait().await {
                Ok(_) => {
                    if let Some(mut rt) = inner.nodes.get_mut(&id) {
                        if rt.generation == generation {
                            rt.state = RecomputeState::Idle;
                        }
                    }
                    inner.events.emit(if cleared {
                        SessionEvent::NodeCleared { label }
                    } else {
                        SessionEvent::NodeMaterialized { label }
                    });
                }
                Err(err) => {
                    if let Some(mut rt) = inner.nodes.get_mut(&id) {
                        if rt.generation == generation {
                            rt.state = RecomputeState::Error;
                        }
                    }
                    let message = match err {
                        JobError::Failed { message, .. } => message,
                        JobError::Cancelled { .. } => "cancelled".to_string(),
                    };
                    inner.events.emit(SessionEvent::JobFailed { label, message });
                }
            }
        });
        self.inner.tasks.lock().unwrap().push(task);
    }

    /// Registers an externally spawned background task so `flush` waits
    /// for it (used for fire-and-forget drop/clear watchers).
    pub(crate) fn register_task(&self, task: JoinHandle<()>) {
        self.inner.tasks.lock().unwrap().push(task);
    }

    /// Awaits every outstanding settle task. Settling never enqueues new
    /// work, so one pass suffices once the queue is idle.
    pub async fn flush(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.inner.tasks.lock().unwrap();
            guard.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}
