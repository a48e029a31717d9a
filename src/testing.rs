//! In-memory stand-in for the REST collections.

use std::cell::{Cell, RefCell};

use tokio_util::sync::CancellationToken;

use crate::api::RemoteCollection;
use crate::error::RequestError;
use crate::models::{Author, Draft, EntityId, Identity, Record, Submission};

pub const CREATED_AT: &str = "2024-06-01T12:00:00Z";

pub fn identity() -> Identity {
    Identity {
        status: "Authenticated".into(),
        name: "Alex Johnson".into(),
        email: "alex@example.com".into(),
        picture: None,
    }
}

pub fn author() -> Author {
    Author::from_identity(&identity())
}

pub struct FakeCollection<D> {
    records: RefCell<Vec<Record<D>>>,
    next_id: Cell<u32>,
    calls: Cell<usize>,
    fail_status: Cell<Option<u16>>,
    on_call: RefCell<Option<Box<dyn Fn()>>>,
}

impl<D: Draft> FakeCollection<D> {
    pub fn new() -> Self {
        FakeCollection {
            records: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            calls: Cell::new(0),
            fail_status: Cell::new(None),
            on_call: RefCell::new(None),
        }
    }

    fn assign_id(&self) -> EntityId {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        EntityId::new(format!("srv-{n}"))
    }

    /// Stores a record server-side without counting as a call.
    pub fn seed(&self, fields: D, author: Author) -> Record<D> {
        let record = Record {
            id: self.assign_id(),
            author,
            created_at: CREATED_AT.into(),
            fields,
        };
        self.records.borrow_mut().push(record.clone());
        record
    }

    pub fn records(&self) -> Vec<Record<D>> {
        self.records.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// The next call fails with `status`.
    pub fn fail_next(&self, status: u16) {
        self.fail_status.set(Some(status));
    }

    /// Runs `hook` at the start of every call, e.g. to cancel a token mid-flight.
    pub fn on_call(&self, hook: impl Fn() + 'static) {
        *self.on_call.borrow_mut() = Some(Box::new(hook));
    }

    fn enter(&self) -> Result<(), RequestError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(hook) = self.on_call.borrow().as_ref() {
            hook();
        }
        if let Some(status) = self.fail_status.take() {
            return Err(RequestError::Status {
                status,
                body: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn not_found(id: &EntityId) -> RequestError {
        RequestError::Status {
            status: 404,
            body: format!("no record {id}"),
        }
    }
}

impl<D: Draft> RemoteCollection<D> for FakeCollection<D> {
    async fn list(&self, _cancel: &CancellationToken) -> Result<Vec<Record<D>>, RequestError> {
        self.enter()?;
        Ok(self.records())
    }

    async fn create(
        &self,
        body: &Submission<'_, D>,
        _cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError> {
        self.enter()?;
        Ok(self.seed(body.draft.clone(), body.author.clone()))
    }

    async fn update(
        &self,
        id: &EntityId,
        body: &Submission<'_, D>,
        _cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError> {
        self.enter()?;
        let mut records = self.records.borrow_mut();
        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        record.fields = body.draft.clone();
        record.author = body.author.clone();
        Ok(record.clone())
    }

    async fn delete(&self, id: &EntityId, _cancel: &CancellationToken) -> Result<(), RequestError> {
        self.enter()?;
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|r| &r.id != id);
        if records.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}
