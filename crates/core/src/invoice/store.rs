//! Invoice storage trait and types.

use thiserror::Error;

use super::{Invoice, InvoicePage, PageRequest};

/// Error type for invoice store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with the given id.
    #[error("Invoice not found: {0}")]
    NotFound(String),

    /// A record with the given id already exists.
    #[error("Invoice already exists: {0}")]
    Conflict(String),

    /// An update mutation refused to apply; nothing was written.
    #[error("Update rejected: {0}")]
    Rejected(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Mutation applied to an in-memory record before it is persisted.
pub type MutateFn<'a> = &'a dyn Fn(&mut Invoice) -> Result<(), StoreError>;

/// Trait for invoice storage backends.
///
/// `update` is a read-modify-write over a record the caller already holds,
/// not a compare-and-swap against the durable copy: concurrent updates to
/// the same id race and the last writer wins. In the intended usage a single
/// background task owns all transitions for an id after creation, and the
/// manual metadata edit is allowed to race with it.
pub trait InvoiceStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the id
    /// already exists.
    fn create(&self, invoice: &Invoice) -> Result<(), StoreError>;

    /// Fetch a record by id. Fails with [`StoreError::NotFound`] if absent.
    fn get(&self, id: &str) -> Result<Invoice, StoreError>;

    /// List records ordered by `created_at` descending, with total and
    /// total-page counts. The store does not cap `page_size`; callers clamp.
    fn list(&self, page: PageRequest) -> Result<InvoicePage, StoreError>;

    /// Apply `mutate` to the in-memory record, then persist the full record.
    /// If the mutation fails nothing is written. This is the only sanctioned
    /// way to change a record's mutable fields.
    fn update(&self, invoice: &mut Invoice, mutate: MutateFn<'_>) -> Result<(), StoreError>;

    /// Delete a record. Fails with [`StoreError::NotFound`] if absent.
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Begin a transaction. Mutations issued through the returned handle are
    /// atomic: they become durable on `commit` and are discarded on
    /// `rollback` or when the handle is dropped unfinished.
    fn begin(&self) -> Result<Box<dyn InvoiceTxn + '_>, StoreError>;
}

/// An open store transaction.
///
/// Finalization is idempotent: `commit` after `rollback` (and vice versa)
/// is a no-op, and dropping an unfinished handle rolls back, so a panic
/// inside a transactional workflow never leaves a write half-applied.
pub trait InvoiceTxn {
    /// Transactional [`InvoiceStore::create`].
    fn create(&mut self, invoice: &Invoice) -> Result<(), StoreError>;

    /// Transactional [`InvoiceStore::update`].
    fn update(&mut self, invoice: &mut Invoice, mutate: MutateFn<'_>) -> Result<(), StoreError>;

    /// Transactional [`InvoiceStore::delete`].
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    /// Make all buffered mutations durable.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard all buffered mutations.
    fn rollback(&mut self);

    /// Commit on `Ok`, roll back on `Err`, returning the outcome.
    fn finish(&mut self, outcome: Result<(), StoreError>) -> Result<(), StoreError> {
        match outcome {
            Ok(()) => self.commit(),
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }
}
