use tokio_util::sync::CancellationToken;

use crate::api::RemoteCollection;
use crate::dialog::{CrudDialog, SubmitOutcome};
use crate::models::{Draft, EntityId, Notice, Record};
use crate::ownership::is_owner;
use crate::session::Session;
use crate::store::EntityStore;

pub fn capitalize(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One resource family's view: the local store, its dialog, and the
/// mount token every remote call is raced against.
///
/// After a call settles the token is checked again, so responses that
/// arrive after `unmount` are dropped instead of reconciled.
pub struct CollectionPage<D: Draft> {
    pub store: EntityStore<Record<D>>,
    pub dialog: CrudDialog<D>,
    mounted: CancellationToken,
    notice: Option<Notice>,
}

impl<D: Draft> Default for CollectionPage<D> {
    fn default() -> Self {
        CollectionPage {
            store: EntityStore::new(),
            dialog: CrudDialog::new(),
            mounted: CancellationToken::new(),
            notice: None,
        }
    }
}

impl<D: Draft> CollectionPage<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh mount if the previous one was cancelled.
    pub fn mount(&mut self) {
        if self.mounted.is_cancelled() {
            self.mounted = CancellationToken::new();
        }
    }

    /// Cancels in-flight calls and stops any pending reconciliation.
    pub fn unmount(&mut self) {
        self.mounted.cancel();
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.mounted.clone()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn can_modify(&self, record: &Record<D>, session: &Session) -> bool {
        is_owner(record, session.viewer())
    }

    /// Replaces the store with the server's list.
    pub async fn load<C: RemoteCollection<D>>(&mut self, remote: &C) -> bool {
        let token = self.token();
        match remote.list(&token).await {
            Ok(_) if token.is_cancelled() => false,
            Ok(records) => {
                log::debug!("loaded {} {} record(s)", records.len(), D::RESOURCE);
                self.store.load(records);
                true
            }
            Err(e) if e.is_cancelled() => false,
            Err(e) => {
                log::warn!("failed to load {}: {}", D::RESOURCE, e);
                self.notice = Some(Notice::error(format!(
                    "Failed to load {}s. Please reload.",
                    D::NOUN
                )));
                false
            }
        }
    }

    pub fn open_create(&mut self) {
        self.dialog.open_create();
    }

    /// Whether `session` may modify `id`. Records a notice naming `action`
    /// when it may not.
    pub fn ensure_owner(&mut self, id: &EntityId, session: &Session, action: &str) -> bool {
        let Some(record) = self.store.get(id) else {
            return false;
        };
        if self.can_modify(record, session) {
            return true;
        }
        self.notice = Some(Notice::error(format!(
            "You can only {} your own {}s.",
            action,
            D::NOUN
        )));
        false
    }

    /// Opens the edit dialog for `id` if the session owns it.
    pub fn open_edit(&mut self, id: &EntityId, session: &Session) -> bool {
        if !self.ensure_owner(id, session, "edit") {
            return false;
        }
        match self.store.get(id) {
            Some(record) => {
                self.dialog.open_edit(record);
                true
            }
            None => false,
        }
    }

    /// Submits the open dialog and reconciles the store on confirmation.
    pub async fn submit<C: RemoteCollection<D>>(
        &mut self,
        remote: &C,
        session: &Session,
    ) -> SubmitOutcome {
        let token = self.token();
        let verb = if self.dialog.is_editing() {
            "updated"
        } else {
            "created"
        };
        let author = session.author();
        let store = &mut self.store;
        let mut discarded = false;
        let outcome = self
            .dialog
            .submit(remote, author.as_ref(), &token, |reconciliation| {
                if token.is_cancelled() {
                    log::debug!("page unmounted; dropping {} reconciliation", D::NOUN);
                    discarded = true;
                    return;
                }
                reconciliation.apply(store);
            })
            .await;
        if discarded {
            return SubmitOutcome::Discarded;
        }

        if outcome == SubmitOutcome::Saved && self.is_mounted() {
            self.notice = Some(Notice::success(format!(
                "{} {} successfully!",
                capitalize(D::NOUN),
                verb
            )));
        }
        outcome
    }

    /// Deletes `id` remotely and, once confirmed, locally.
    pub async fn delete<C: RemoteCollection<D>>(
        &mut self,
        remote: &C,
        id: &EntityId,
        session: &Session,
    ) -> bool {
        if !self.ensure_owner(id, session, "delete") {
            return false;
        }

        let token = self.token();
        match remote.delete(id, &token).await {
            Ok(()) if token.is_cancelled() => false,
            Ok(()) => {
                self.store.remove(id);
                self.notice = Some(Notice::success(format!(
                    "{} deleted.",
                    capitalize(D::NOUN)
                )));
                true
            }
            Err(e) if e.is_cancelled() => false,
            Err(e) => {
                log::warn!("failed to delete {} {}: {}", D::NOUN, id, e);
                self.notice = Some(Notice::error(format!(
                    "Failed to delete {}. Please try again.",
                    D::NOUN
                )));
                false
            }
        }
    }
}
