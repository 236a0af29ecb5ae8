//! Invoice records and their storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteInvoiceStore;
pub use store::{InvoiceStore, InvoiceTxn, MutateFn, StoreError};
pub use types::{new_invoice_id, Invoice, InvoicePage, InvoiceStatus, PageRequest};
