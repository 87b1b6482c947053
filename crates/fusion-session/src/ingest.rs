//! Batch ingestion: files in, source nodes out.
//!
//! Each file gets a collision-free label, an import job on the mutation
//! queue, and -- on success -- a source node in the graph bound to that
//! label and the original file reference. Files are independent: one
//! failure is reported and the batch continues. Progress is recomputed
//! as jobs settle and emitted as events, with a completion event once
//! every job of the batch has settled.

use std::path::PathBuf;

use fusion_core::format::FileFormat;
use fusion_core::graph::PipelineGraph;
use fusion_core::label::LabelAllocator;
use fusion_core::node::TableNode;

use crate::events::{EventSink, SessionEvent};
use crate::job::{Job, JobAction};
use crate::queue::MutationQueue;

/// One file selected or dropped by the user.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub path: PathBuf,
    /// MIME type as reported by the picker/drop source, if any. Falls
    /// back to extension detection when absent or unrecognized.
    pub mime: Option<String>,
}

impl FileUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileUpload {
            path: path.into(),
            mime: None,
        }
    }

    pub fn with_mime(path: impl Into<PathBuf>, mime: impl Into<String>) -> Self {
        FileUpload {
            path: path.into(),
            mime: Some(mime.into()),
        }
    }

    fn format(&self) -> FileFormat {
        match self.mime.as_deref().map(FileFormat::from_mime) {
            Some(FileFormat::Unknown) | None => FileFormat::from_path(&self.path),
            Some(format) => format,
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Outcome of a settled ingestion batch.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Labels of the source nodes created, in file order.
    pub labels: Vec<String>,
    /// Per-file failures: (file name, message). Does not abort the batch.
    pub failures: Vec<(String, String)>,
}

impl UploadReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs a batch through the queue and settles it in file order.
pub(crate) async fn run_batch(
    graph: &mut PipelineGraph,
    alloc: &mut LabelAllocator,
    queue: &MutationQueue,
    events: &EventSink,
    files: Vec<FileUpload>,
) -> UploadReport {
    let total = files.len();

    // Enqueue everything up front; the worker drains while we settle in
    // submission order.
    let mut queued = Vec::with_capacity(total);
    for upload in files {
        let format = upload.format();
        let file_name = upload.file_name();
        let label = alloc.allocate_for_file(&file_name);
        tracing::info!(%label, file = %file_name, "import enqueued");
        let handle = queue.enqueue(Job::new(
            &label,
            JobAction::Import {
                path: upload.path.clone(),
                format,
            },
        ));
        queued.push((label, file_name, format, handle));
    }

    let mut report = UploadReport::default();
    let mut processed = 0usize;
    for (label, file_name, format, handle) in queued {
        match handle.wait().await {
            Ok(_) => {
                let node = TableNode::source(&label, &file_name, format);
                match graph.add_node(node) {
                    Ok(_) => {
                        events.emit(SessionEvent::ImportFinished {
                            label: label.clone(),
                            file: file_name,
                        });
                        report.labels.push(label);
                    }
                    Err(err) => {
                        // Allocator labels are unique, so this only
                        // happens if a caller mixed in its own labels.
                        tracing::warn!(%label, error = %err, "imported table has no node");
                        events.emit(SessionEvent::ImportFailed {
                            file: file_name.clone(),
                            message: err.to_string(),
                        });
                        report.failures.push((file_name, err.to_string()));
                    }
                }
            }
            Err(err) => {
                tracing::warn!(file = %file_name, error = %err, "import failed");
                events.emit(SessionEvent::ImportFailed {
                    file: file_name.clone(),
                    message: err.to_string(),
                });
                report.failures.push((file_name, err.to_string()));
            }
        }
        processed += 1;
        events.emit(SessionEvent::BatchProgress { processed, total });
    }

    events.emit(SessionEvent::BatchFinished { total });
    report
}
