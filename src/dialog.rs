use tokio_util::sync::CancellationToken;

use crate::api::RemoteCollection;
use crate::error::RequestError;
use crate::models::{Author, Draft, EntityId, Notice, Record, Submission};
use crate::store::EntityStore;
use crate::tags::{remove_tag, TagInput};
use crate::validate::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogMode {
    Create,
    /// Editing keeps the record's original author snapshot.
    Edit { id: EntityId, author: Author },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Closed,
    Open,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved,
    Invalid,
    Busy,
    NotOpen,
    Unauthenticated,
    Failed(String),
    /// The request was cancelled; nothing was reconciled.
    Discarded,
}

/// How a confirmed mutation is mirrored into the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation<D> {
    Append(Record<D>),
    Replace { id: EntityId, record: Record<D> },
}

impl<D> Reconciliation<D> {
    pub fn apply(self, store: &mut EntityStore<Record<D>>) {
        match self {
            Reconciliation::Append(record) => store.append(record),
            Reconciliation::Replace { id, record } => {
                if !store.replace(&id, record) {
                    log::debug!("updated id {} is no longer listed", id);
                }
            }
        }
    }
}

/// A validated submission that has moved the dialog into `Submitting`.
#[derive(Debug)]
pub struct PendingSubmit<D> {
    mode: DialogMode,
    author: Author,
    draft: D,
}

impl<D: Draft> PendingSubmit<D> {
    pub async fn send<C: RemoteCollection<D>>(
        &self,
        remote: &C,
        cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError> {
        let body = Submission {
            author: &self.author,
            draft: &self.draft,
        };
        match &self.mode {
            DialogMode::Create => remote.create(&body, cancel).await,
            DialogMode::Edit { id, .. } => remote.update(id, &body, cancel).await,
        }
    }
}

/// Create/edit form bound to one resource family.
///
/// `Closed -> Open -> Submitting -> Closed | Open`. Validation failures keep
/// the dialog open without touching the network; while `Submitting`, further
/// submissions are rejected as `Busy`.
#[derive(Debug)]
pub struct CrudDialog<D> {
    state: DialogState,
    mode: DialogMode,
    pub draft: D,
    pub tag_input: TagInput,
    errors: ValidationErrors,
    notice: Option<Notice>,
}

impl<D: Draft> Default for CrudDialog<D> {
    fn default() -> Self {
        CrudDialog {
            state: DialogState::Closed,
            mode: DialogMode::Create,
            draft: D::default(),
            tag_input: TagInput::default(),
            errors: ValidationErrors::default(),
            notice: None,
        }
    }
}

impl<D: Draft> CrudDialog<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != DialogState::Closed
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, DialogMode::Edit { .. })
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn reset(&mut self, mode: DialogMode, draft: D) {
        self.mode = mode;
        self.draft = draft;
        self.tag_input.clear();
        self.errors = ValidationErrors::default();
        self.notice = None;
    }

    pub fn open_create(&mut self) {
        let mut draft = D::default();
        draft.prepare_create();
        self.reset(DialogMode::Create, draft);
        self.state = DialogState::Open;
    }

    /// Opens prefilled with the record's current values.
    pub fn open_edit(&mut self, record: &Record<D>) {
        self.reset(
            DialogMode::Edit {
                id: record.id.clone(),
                author: record.author.clone(),
            },
            record.fields.clone(),
        );
        self.state = DialogState::Open;
    }

    /// Closes unless a request is in flight.
    pub fn close(&mut self) -> bool {
        if self.state == DialogState::Submitting {
            return false;
        }
        self.reset(DialogMode::Create, D::default());
        self.state = DialogState::Closed;
        true
    }

    /// Commits the staged tag text into the draft's tag list, if it has one.
    pub fn add_tag(&mut self) -> bool {
        match self.draft.tags_mut() {
            Some(tags) => self.tag_input.commit(tags),
            None => false,
        }
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.draft
            .tags_mut()
            .map(|tags| remove_tag(tags, tag))
            .unwrap_or(false)
    }

    /// Validates and moves to `Submitting`. `author` is the session's
    /// snapshot and is only needed when creating.
    pub fn begin_submit(
        &mut self,
        author: Option<&Author>,
    ) -> Result<PendingSubmit<D>, SubmitOutcome> {
        match self.state {
            DialogState::Closed => return Err(SubmitOutcome::NotOpen),
            DialogState::Submitting => return Err(SubmitOutcome::Busy),
            DialogState::Open => {}
        }

        if let Err(errors) = self.draft.validate() {
            self.errors = errors;
            return Err(SubmitOutcome::Invalid);
        }
        self.errors = ValidationErrors::default();

        let author = match &self.mode {
            DialogMode::Edit { author, .. } => author.clone(),
            DialogMode::Create => match author {
                Some(author) => author.clone(),
                None => {
                    self.notice = Some(Notice::error(format!(
                        "Please log in to create a {}.",
                        D::NOUN
                    )));
                    return Err(SubmitOutcome::Unauthenticated);
                }
            },
        };

        self.notice = None;
        self.state = DialogState::Submitting;
        Ok(PendingSubmit {
            mode: self.mode.clone(),
            author,
            draft: self.draft.clone(),
        })
    }

    /// Applies the remote result. Success closes the dialog and clears the
    /// transient input; failure reopens it with an error notice.
    pub fn settle(
        &mut self,
        pending: PendingSubmit<D>,
        result: Result<Record<D>, RequestError>,
    ) -> Result<Reconciliation<D>, SubmitOutcome> {
        let verb = match pending.mode {
            DialogMode::Create => "create",
            DialogMode::Edit { .. } => "update",
        };
        match result {
            Ok(record) => {
                let reconciliation = match pending.mode {
                    DialogMode::Create => Reconciliation::Append(record),
                    DialogMode::Edit { id, .. } => Reconciliation::Replace { id, record },
                };
                self.reset(DialogMode::Create, D::default());
                self.state = DialogState::Closed;
                Ok(reconciliation)
            }
            Err(RequestError::Cancelled) => {
                self.state = DialogState::Open;
                Err(SubmitOutcome::Discarded)
            }
            Err(e) => {
                log::warn!("failed to {} {}: {}", verb, D::NOUN, e);
                let message = format!("Failed to {} {}. Please try again.", verb, D::NOUN);
                self.notice = Some(Notice::error(message.clone()));
                self.state = DialogState::Open;
                Err(SubmitOutcome::Failed(message))
            }
        }
    }

    /// Full submit cycle. `reconcile` runs only after the server confirmed.
    pub async fn submit<C: RemoteCollection<D>>(
        &mut self,
        remote: &C,
        author: Option<&Author>,
        cancel: &CancellationToken,
        reconcile: impl FnOnce(Reconciliation<D>),
    ) -> SubmitOutcome {
        let pending = match self.begin_submit(author) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };
        let result = pending.send(remote, cancel).await;
        match self.settle(pending, result) {
            Ok(reconciliation) => {
                reconcile(reconciliation);
                SubmitOutcome::Saved
            }
            Err(outcome) => outcome,
        }
    }
}
