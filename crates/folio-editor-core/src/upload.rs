//! Image upload pipeline.
//!
//! Each file selection becomes an independent `UploadTask`:
//!
//! ```text
//! Pending ──validate──> Rejected
//!    │
//!    └──> Uploading ──> Succeeded (image inserted)
//!              │
//!              └──> Failed ──retry──> Uploading
//! ```
//!
//! The pipeline never awaits anything itself. `begin` hands back a
//! `PendingUpload` future which the host drives however it likes; its
//! `UploadOutcome` is fed back through `complete`. Outcomes from a closed
//! pipeline, or from another session, are discarded.

use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use futures_util::future::{FutureExt, LocalBoxFuture};
use mime_sniffer::MimeTypeSniffer;
use smol_str::SmolStr;

use crate::error::UploadError;
use crate::types::Position;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

const OCTET_STREAM: &str = "application/octet-stream";

/// Succeeded and rejected tasks kept for display once newer ones arrive.
pub const SETTLED_TASKS_KEPT: usize = 32;

/// A file chosen by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    /// Declared MIME type. May be empty.
    pub mime_type: String,
    pub data: Bytes,
    /// Alt text for the inserted image.
    pub alt: Option<SmolStr>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
            alt: None,
        }
    }

    pub fn with_alt(mut self, alt: impl Into<SmolStr>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    /// The MIME type used for validation.
    ///
    /// A missing or generic declared type is replaced by one sniffed from the
    /// file contents.
    pub fn effective_mime(&self) -> String {
        let declared = self.mime_type.trim().to_ascii_lowercase();
        if !declared.is_empty() && declared != OCTET_STREAM {
            return declared;
        }
        self.data
            .sniff_mime_type()
            .unwrap_or(OCTET_STREAM)
            .to_string()
    }

    /// Inline `data:` URL for the file contents.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.effective_mime(),
            STANDARD.encode(&self.data)
        )
    }
}

/// Identifies a task within its pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UploadId(u64);

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    /// Created, not yet validated.
    Pending,
    Uploading,
    Succeeded,
    Failed,
    /// MIME type not allowed. Terminal.
    Rejected,
}

/// One file selection and its progress.
#[derive(Clone, Debug)]
pub struct UploadTask {
    pub id: UploadId,
    pub file: ImageFile,
    pub status: UploadStatus,
    pub result_url: Option<String>,
    pub error: Option<UploadError>,
    /// User-facing explanation for a rejection.
    pub message: Option<String>,
    /// Caret position captured when the file was chosen.
    pub position: Position,
}

pub type UploadFuture = LocalBoxFuture<'static, Result<String, UploadError>>;

/// Where image bytes go.
#[derive(Clone, Default)]
pub enum UploadStrategy {
    /// Caller-supplied async uploader returning the image URL.
    External(Rc<dyn Fn(ImageFile) -> UploadFuture>),
    /// Encode the file inline as a `data:` URL.
    #[default]
    DataUrl,
}

impl UploadStrategy {
    pub fn external<F, Fut>(upload: F) -> Self
    where
        F: Fn(ImageFile) -> Fut + 'static,
        Fut: Future<Output = Result<String, UploadError>> + 'static,
    {
        Self::External(Rc::new(move |file| upload(file).boxed_local()))
    }

    fn start(&self, file: ImageFile) -> UploadFuture {
        match self {
            Self::External(upload) => upload(file),
            Self::DataUrl => std::future::ready(Ok(file.to_data_url())).boxed_local(),
        }
    }
}

impl fmt::Debug for UploadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External(_) => f.write_str("External(..)"),
            Self::DataUrl => f.write_str("DataUrl"),
        }
    }
}

/// An upload in flight. Await `resolve` and hand the outcome back to the
/// pipeline (or editor) that started it.
pub struct PendingUpload {
    id: UploadId,
    session: u64,
    future: UploadFuture,
}

impl PendingUpload {
    pub fn id(&self) -> UploadId {
        self.id
    }

    pub async fn resolve(self) -> UploadOutcome {
        UploadOutcome {
            id: self.id,
            session: self.session,
            result: self.future.await,
        }
    }
}

impl fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingUpload")
            .field("id", &self.id)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// The settled result of a `PendingUpload`.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub id: UploadId,
    session: u64,
    pub result: Result<String, UploadError>,
}

/// What `begin` did with a file.
#[derive(Debug)]
pub enum UploadTicket {
    Rejected { id: UploadId, message: String },
    Started(PendingUpload),
}

impl UploadTicket {
    pub fn id(&self) -> UploadId {
        match self {
            Self::Rejected { id, .. } => *id,
            Self::Started(pending) => pending.id(),
        }
    }

    pub fn into_pending(self) -> Option<PendingUpload> {
        match self {
            Self::Started(pending) => Some(pending),
            Self::Rejected { .. } => None,
        }
    }
}

/// An image ready to be placed into the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInsertion {
    pub id: UploadId,
    pub position: Position,
    pub src: SmolStr,
    pub alt: Option<SmolStr>,
}

/// Tracks every upload of one editing session.
#[derive(Debug)]
pub struct UploadPipeline {
    session: u64,
    closed: bool,
    next_id: u64,
    allowed_types: Vec<String>,
    strategy: UploadStrategy,
    tasks: Vec<UploadTask>,
}

impl UploadPipeline {
    pub fn new(allowed_types: impl IntoIterator<Item = impl Into<String>>, strategy: UploadStrategy) -> Self {
        Self {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            closed: false,
            next_id: 0,
            allowed_types: allowed_types
                .into_iter()
                .map(|t| Into::<String>::into(t).trim().to_ascii_lowercase())
                .collect(),
            strategy,
            tasks: Vec::new(),
        }
    }

    pub fn set_strategy(&mut self, strategy: UploadStrategy) {
        self.strategy = strategy;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn task(&self, id: UploadId) -> Option<&UploadTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn task_mut(&mut self, id: UploadId) -> Option<&mut UploadTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Whether a MIME type passes the allow-list.
    pub fn accepts(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.allowed_types.iter().any(|t| *t == mime)
    }

    /// Validate a selected file and start uploading it.
    ///
    /// `position` is where the image will go once the upload succeeds.
    pub fn begin(&mut self, file: ImageFile, position: Position) -> UploadTicket {
        self.next_id += 1;
        let id = UploadId(self.next_id);
        let mime = file.effective_mime();
        self.tasks.push(UploadTask {
            id,
            file: file.clone(),
            status: UploadStatus::Pending,
            result_url: None,
            error: None,
            message: None,
            position,
        });

        let rejection = if self.closed {
            Some("The editor is closed.".to_string())
        } else if !self.accepts(&mime) {
            Some(format!(
                "Unsupported image type {mime}. Use PNG, JPEG or WebP."
            ))
        } else {
            None
        };
        if let Some(message) = rejection {
            tracing::debug!(target: "folio::upload", %id, %mime, "upload rejected");
            if let Some(task) = self.task_mut(id) {
                task.status = UploadStatus::Rejected;
                task.message = Some(message.clone());
            }
            self.prune();
            return UploadTicket::Rejected { id, message };
        }

        if let Some(task) = self.task_mut(id) {
            task.status = UploadStatus::Uploading;
        }
        tracing::debug!(target: "folio::upload", %id, %mime, name = %file.name, "upload started");
        UploadTicket::Started(PendingUpload {
            id,
            session: self.session,
            future: self.strategy.start(file),
        })
    }

    /// Record a settled upload.
    ///
    /// Returns the image to insert on success. Outcomes for another session,
    /// a closed pipeline, or a task that is not uploading are dropped.
    pub fn complete(&mut self, outcome: UploadOutcome) -> Option<ImageInsertion> {
        let UploadOutcome { id, session, result } = outcome;
        if session != self.session || self.closed {
            tracing::warn!(target: "folio::upload", %id, "discarding upload result for closed session");
            return None;
        }
        let task = self.task_mut(id)?;
        if task.status != UploadStatus::Uploading {
            tracing::warn!(target: "folio::upload", %id, status = ?task.status, "discarding unexpected upload result");
            return None;
        }

        let result = result.and_then(|url| {
            let url = url.trim();
            if url.is_empty() {
                Err(UploadError::EmptyUrl)
            } else {
                Ok(SmolStr::new(url))
            }
        });
        match result {
            Ok(src) => {
                task.status = UploadStatus::Succeeded;
                task.result_url = Some(src.to_string());
                tracing::debug!(target: "folio::upload", %id, "upload succeeded");
                let insertion = ImageInsertion {
                    id,
                    position: task.position.clone(),
                    src,
                    alt: task.file.alt.clone(),
                };
                self.prune();
                Some(insertion)
            }
            Err(error) => {
                tracing::debug!(target: "folio::upload", %id, %error, "upload failed");
                task.status = UploadStatus::Failed;
                task.error = Some(error);
                None
            }
        }
    }

    /// Rewrite the captured position of every task that may still insert an
    /// image.
    pub fn remap_positions(&mut self, mut map: impl FnMut(&Position) -> Position) {
        for task in &mut self.tasks {
            if matches!(
                task.status,
                UploadStatus::Pending | UploadStatus::Uploading | UploadStatus::Failed
            ) {
                task.position = map(&task.position);
            }
        }
    }

    /// Drop the oldest settled tasks beyond `SETTLED_TASKS_KEPT`. Failed
    /// tasks stay so they can be retried.
    fn prune(&mut self) {
        let settled = |t: &UploadTask| {
            matches!(t.status, UploadStatus::Succeeded | UploadStatus::Rejected)
        };
        let mut excess = self
            .tasks
            .iter()
            .filter(|t| settled(t))
            .count()
            .saturating_sub(SETTLED_TASKS_KEPT);
        if excess == 0 {
            return;
        }
        self.tasks.retain(|t| {
            if excess > 0 && settled(t) {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }

    /// Start a failed task again with the same file and position.
    pub fn retry(&mut self, id: UploadId) -> Option<PendingUpload> {
        if self.closed {
            return None;
        }
        let session = self.session;
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        if task.status != UploadStatus::Failed {
            return None;
        }
        task.status = UploadStatus::Uploading;
        task.error = None;
        let file = task.file.clone();
        tracing::debug!(target: "folio::upload", %id, "upload retried");
        Some(PendingUpload {
            id,
            session,
            future: self.strategy.start(file),
        })
    }

    /// End the session. Uploads still in flight fail and their results will
    /// be discarded.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut abandoned = 0;
        for task in &mut self.tasks {
            if matches!(task.status, UploadStatus::Pending | UploadStatus::Uploading) {
                task.status = UploadStatus::Failed;
                task.error = Some(UploadError::SessionClosed);
                abandoned += 1;
            }
        }
        tracing::debug!(target: "folio::upload", abandoned, "upload pipeline closed");
    }
}
