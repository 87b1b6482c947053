//! Session: the in-process facade the presentation layer consumes.
//!
//! A [`Session`] owns the pipeline graph, the mutation queue (which in
//! turn owns the write-side store), the recomputation controller, and a
//! read-side store for ad hoc queries. Graph mutations are synchronous
//! and immediately consistent; backing-table effects flow through the
//! queue in submission order.
//!
//! Reads bypass the queue entirely: `run_query` uses its own connection
//! and may observe a table an in-flight recomputation is about to
//! replace. That window is an accepted, documented inconsistency, not a
//! bug -- WAL keeps readers and the single writer from corrupting each
//! other.
//!
//! The graph lives only in this session. Nothing about topology is
//! persisted; the backing database may outlive the process, which is
//! why freshly created combinators clear any leftover table under their
//! label.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc::UnboundedReceiver;

use fusion_core::format::FileFormat;
use fusion_core::graph::PipelineGraph;
use fusion_core::id::{EdgeId, NodeId};
use fusion_core::label::LabelAllocator;
use fusion_core::node::{NodeKind, TableNode};
use fusion_core::InputPort;
use fusion_store::{QueryOutput, TableStore};

use crate::controller::{RecomputeController, RecomputeState};
use crate::error::SessionError;
use crate::events::{EventSink, SessionEvent};
use crate::ingest::{self, FileUpload, UploadReport};
use crate::job::{Job, JobAction};
use crate::queue::{JobHandle, MutationQueue};

/// Which combinator to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorKind {
    Union,
    Join,
}

/// One user's live pipeline-editing session.
pub struct Session {
    graph: PipelineGraph,
    queue: MutationQueue,
    controller: RecomputeController,
    alloc: LabelAllocator,
    /// Read-side store; never used for writes.
    reader: TableStore,
    events: EventSink,
    event_rx: Option<UnboundedReceiver<SessionEvent>>,
    db_path: PathBuf,
}

impl Session {
    /// Opens a session against the database at `path`.
    ///
    /// Two connections are opened: the write side moves into the queue's
    /// worker task, the read side stays here. Must be called within a
    /// tokio runtime.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let db_path = path.as_ref().to_path_buf();
        let writer = TableStore::open(&db_path)?;
        let reader = TableStore::open(&db_path)?;
        let (events, event_rx) = EventSink::channel();
        let queue = MutationQueue::spawn(writer);
        let controller = RecomputeController::new(events.clone());

        Ok(Session {
            graph: PipelineGraph::new(),
            queue,
            controller,
            alloc: LabelAllocator::new(),
            reader,
            events,
            event_rx: Some(event_rx),
            db_path,
        })
    }

    /// Opens a session against a fresh temporary database (for tests).
    pub fn ephemeral() -> Result<Self, SessionError> {
        let path = std::env::temp_dir().join(format!("fusion_{}.db", uuid::Uuid::new_v4()));
        Self::open(path)
    }

    /// Takes the event receiver. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// The graph, read-only. All mutations go through session methods.
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Imports a batch of files, creating one source node per success.
    ///
    /// Settles every file before returning; progress and per-file
    /// outcomes are also emitted as events while the batch runs. If the
    /// returned future is dropped mid-batch (dialog closed), queued
    /// imports keep running unless [`Session::reset_pending`] is called.
    pub async fn upload(&mut self, files: Vec<FileUpload>) -> UploadReport {
        ingest::run_batch(
            &mut self.graph,
            &mut self.alloc,
            &self.queue,
            &self.events,
            files,
        )
        .await
    }

    /// Imports a single file and returns the new source node's label.
    pub async fn add_source_from_file(
        &mut self,
        path: impl Into<PathBuf>,
        mime: Option<&str>,
    ) -> Result<String, SessionError> {
        let upload = match mime {
            Some(mime) => FileUpload::with_mime(path, mime),
            None => FileUpload::new(path),
        };
        let file_name = upload.path.display().to_string();
        let mut report = self.upload(vec![upload]).await;
        match report.labels.pop() {
            Some(label) => Ok(label),
            None => {
                let (file, message) = report
                    .failures
                    .pop()
                    .unwrap_or((file_name, "import produced no result".to_string()));
                Err(SessionError::JobFailed {
                    label: file,
                    message,
                })
            }
        }
    }

    /// Cancels every queued-but-not-started job. The active job, if
    /// any, runs to completion. Used when upload progress is dismissed.
    pub fn reset_pending(&self) -> usize {
        self.queue.reset()
    }

    // -----------------------------------------------------------------------
    // Graph editing
    // -----------------------------------------------------------------------

    /// Creates a combinator node with a fresh label and an empty backing
    /// table.
    pub fn add_combinator(&mut self, kind: CombinatorKind) -> Result<(NodeId, String), SessionError> {
        let label = match kind {
            CombinatorKind::Union => self.alloc.allocate("tbl_union"),
            CombinatorKind::Join => self.alloc.allocate("tbl_join"),
        };
        let node = match kind {
            CombinatorKind::Union => TableNode::union(&label),
            CombinatorKind::Join => TableNode::join(&label),
        };
        let id = self.graph.add_node(node)?;
        self.controller.track(id);
        // A previous process may have left a table under this label.
        let handle = self
            .queue
            .enqueue(Job::new(&label, JobAction::Clear));
        self.watch_background(handle);
        tracing::info!(%label, ?kind, "combinator created");
        Ok((id, label))
    }

    /// Connects `source`'s output into `(target, port)`. An edge already
    /// occupying the port is replaced.
    pub fn connect(
        &mut self,
        source: NodeId,
        target: NodeId,
        port: InputPort,
    ) -> Result<EdgeId, SessionError> {
        let edge = self.graph.add_edge(source, target, port)?;
        self.refresh(target, false);
        Ok(edge)
    }

    /// Removes an edge and re-plans the combinator it fed.
    pub fn disconnect(&mut self, edge: EdgeId) -> Result<(), SessionError> {
        let (_, target, _) = self.graph.remove_edge(edge)?;
        self.refresh(target, false);
        Ok(())
    }

    /// Replaces a join node's key columns and re-plans it.
    pub fn set_join_columns(
        &mut self,
        id: NodeId,
        columns: Vec<String>,
    ) -> Result<(), SessionError> {
        let set: indexmap::IndexSet<String> = columns.into_iter().collect();
        self.graph.set_join_columns(id, set)?;
        self.refresh(id, false);
        Ok(())
    }

    /// Manual re-materialization, bypassing the unchanged-query no-op
    /// check. Also the retry action for a node in `Error`.
    pub fn update_node(&mut self, id: NodeId) -> Result<(), SessionError> {
        if self.graph.get_node(id).is_none() {
            return Err(fusion_core::CoreError::NodeNotFound { id }.into());
        }
        self.refresh(id, true);
        Ok(())
    }

    /// Removes a node from the graph and schedules its backing-table
    /// drop. Downstream combinators are re-planned; their jobs queue
    /// after the drop, so none of them can end up reading the dropped
    /// table out of order.
    pub fn remove_node(&mut self, id: NodeId) -> Result<TableNode, SessionError> {
        let dependents = self.graph.dependents_of(id);
        let node = self.graph.remove_node(id)?;
        self.controller.forget(id);

        // Source and combinator tables drop the same way; the store does
        // not distinguish file-backed tables from materialized ones.
        let handle = self
            .queue
            .enqueue(Job::new(&node.label, JobAction::Drop));
        self.watch_background(handle);
        tracing::info!(label = %node.label, "node removed, drop enqueued");

        for dependent in dependents {
            if self.graph.get_node(dependent).is_some() {
                self.refresh(dependent, false);
            }
        }
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Query overrides
    // -----------------------------------------------------------------------

    /// Replaces the derived query of `(id, port)` with user-edited text.
    ///
    /// The text is validated against the engine first; invalid SQL is
    /// rejected here, at the editing boundary, and never enqueued.
    pub fn set_query_override(
        &mut self,
        id: NodeId,
        port: InputPort,
        text: String,
    ) -> Result<(), SessionError> {
        if self.graph.get_node(id).is_none() {
            return Err(fusion_core::CoreError::NodeNotFound { id }.into());
        }
        self.reader.validate_query(&text)?;
        self.controller.set_override(id, port, text);
        self.refresh(id, false);
        Ok(())
    }

    /// Reverts `(id, port)` to its graph-derived query.
    pub fn clear_query_override(&mut self, id: NodeId, port: InputPort) -> Result<(), SessionError> {
        if self.graph.get_node(id).is_none() {
            return Err(fusion_core::CoreError::NodeNotFound { id }.into());
        }
        self.controller.clear_override(id, port);
        self.refresh(id, false);
        Ok(())
    }

    /// The query text currently feeding `(id, port)`.
    pub fn input_query(&self, id: NodeId, port: InputPort) -> String {
        self.controller.active_query(&self.graph, id, port)
    }

    // -----------------------------------------------------------------------
    // Reads and exports
    // -----------------------------------------------------------------------

    /// Exports a node's table as bytes. `format` defaults to the source
    /// node's original format, or CSV for combinator outputs.
    pub async fn export_table(
        &self,
        label: &str,
        format: Option<FileFormat>,
    ) -> Result<Vec<u8>, SessionError> {
        let (_, node) = self
            .graph
            .node_by_label(label)
            .ok_or_else(|| SessionError::UnknownLabel {
                label: label.to_string(),
            })?;
        let format = format.unwrap_or(match &node.kind {
            NodeKind::Source { file } => file.format,
            _ => FileFormat::Csv,
        });

        // Through the queue: the export observes every mutation enqueued
        // before it, including a recomputation still in flight.
        let handle = self
            .queue
            .enqueue(Job::new(label, JobAction::Export { format }));
        match handle.wait().await? {
            crate::job::JobOutput::Bytes(bytes) => Ok(bytes),
            other => Err(SessionError::JobFailed {
                label: label.to_string(),
                message: format!("unexpected export output: {other:?}"),
            }),
        }
    }

    /// Runs an ad hoc query on the read-side connection, bypassing the
    /// queue.
    pub fn run_query(&self, sql: &str) -> Result<QueryOutput, SessionError> {
        Ok(self.reader.query(sql)?)
    }

    /// Recomputation state of a combinator, for previews and badges.
    pub fn node_state(&self, id: NodeId) -> Option<RecomputeState> {
        self.controller.state(id)
    }

    /// Resolves when every queued job has settled and every outcome has
    /// been recorded. Gates UI state such as re-enabling upload while a
    /// deletion drains.
    pub async fn on_idle(&self) {
        self.queue.on_idle().await;
        self.controller.flush().await;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn refresh(&mut self, id: NodeId, force: bool) {
        self.controller.refresh(&self.graph, &self.queue, id, force);
    }

    /// Reports a fire-and-forget job's failure as an event; success is
    /// silent.
    fn watch_background(&self, handle: JobHandle) {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let label = handle.label().to_string();
            if let Err(err) = handle.wait().await {
                events.emit(SessionEvent::JobFailed {
                    label,
                    message: err.to_string(),
                });
            }
        });
        self.controller.register_task(task);
    }
}

