//! SQLite-backed invoice store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{Invoice, InvoicePage, InvoiceStatus, InvoiceStore, InvoiceTxn, MutateFn, PageRequest, StoreError};

/// SQLite-backed invoice store.
///
/// A single connection behind a mutex; readers and the background extraction
/// writers serialize on it. Timestamps are stored as RFC3339 text so the
/// `created_at` ordering is a plain lexicographic sort.
pub struct SqliteInvoiceStore {
    conn: Mutex<Connection>,
}

impl SqliteInvoiceStore {
    /// Open (or create) the database file and initialize the schema.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS invoices (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                image_path TEXT NOT NULL,
                extracted_data TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_invoices_created_at ON invoices(created_at DESC);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-query; the connection itself
        // is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

const SELECT_COLUMNS: &str =
    "id, status, image_path, extracted_data, error_message, created_at, updated_at";

fn row_to_invoice(row: &rusqlite::Row) -> rusqlite::Result<Invoice> {
    let id: String = row.get(0)?;
    let status_str: String = row.get(1)?;
    let image_path: String = row.get(2)?;
    let extracted_json: Option<String> = row.get(3)?;
    let error_message: Option<String> = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;

    // The status column only ever holds values written through
    // InvoiceStatus; anything else is a corrupt row, not a new state.
    let status = InvoiceStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("invalid invoice status: {}", status_str).into(),
        )
    })?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let extracted_data = extracted_json.and_then(|json| serde_json::from_str(&json).ok());

    Ok(Invoice {
        id,
        status,
        image_path,
        extracted_data,
        error_message,
        created_at,
        updated_at,
    })
}

fn insert_invoice(conn: &Connection, invoice: &Invoice) -> Result<(), StoreError> {
    let extracted_json = invoice
        .extracted_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Database(e.to_string()))?;

    conn.execute(
        "INSERT INTO invoices (id, status, image_path, extracted_data, error_message, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            invoice.id,
            invoice.status.as_str(),
            invoice.image_path,
            extracted_json,
            invoice.error_message,
            invoice.created_at.to_rfc3339(),
            invoice.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(invoice.id.clone())
        }
        other => StoreError::Database(other.to_string()),
    })?;

    Ok(())
}

fn persist_invoice(conn: &Connection, invoice: &Invoice) -> Result<(), StoreError> {
    let extracted_json = invoice
        .extracted_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Database(e.to_string()))?;

    let changed = conn
        .execute(
            "UPDATE invoices SET status = ?, extracted_data = ?, error_message = ?, updated_at = ? WHERE id = ?",
            params![
                invoice.status.as_str(),
                extracted_json,
                invoice.error_message,
                invoice.updated_at.to_rfc3339(),
                invoice.id,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

    if changed == 0 {
        return Err(StoreError::NotFound(invoice.id.clone()));
    }

    Ok(())
}

fn apply_update(
    conn: &Connection,
    invoice: &mut Invoice,
    mutate: MutateFn<'_>,
) -> Result<(), StoreError> {
    // A failed mutation aborts before anything touches the database.
    mutate(invoice)?;
    persist_invoice(conn, invoice)
}

fn delete_invoice(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn
        .execute("DELETE FROM invoices WHERE id = ?", params![id])
        .map_err(|e| StoreError::Database(e.to_string()))?;

    if changed == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }

    Ok(())
}

impl InvoiceStore for SqliteInvoiceStore {
    fn create(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let conn = self.lock();
        insert_invoice(&conn, invoice)
    }

    fn get(&self, id: &str) -> Result<Invoice, StoreError> {
        let conn = self.lock();

        let result = conn.query_row(
            &format!("SELECT {} FROM invoices WHERE id = ?", SELECT_COLUMNS),
            params![id],
            row_to_invoice,
        );

        match result {
            Ok(invoice) => Ok(invoice),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn list(&self, page: PageRequest) -> Result<InvoicePage, StoreError> {
        let conn = self.lock();

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM invoices", [], |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM invoices ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                SELECT_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![page.page_size as i64, page.offset()], row_to_invoice)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut invoices = Vec::new();
        for row_result in rows {
            invoices.push(row_result.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(InvoicePage {
            invoices,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: InvoicePage::total_pages_for(total, page.page_size),
        })
    }

    fn update(&self, invoice: &mut Invoice, mutate: MutateFn<'_>) -> Result<(), StoreError> {
        let conn = self.lock();
        apply_update(&conn, invoice, mutate)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        delete_invoice(&conn, id)
    }

    fn begin(&self) -> Result<Box<dyn InvoiceTxn + '_>, StoreError> {
        let conn = self.lock();
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Box::new(SqliteInvoiceTxn {
            conn,
            state: TxnState::Active,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    RolledBack,
}

/// An open transaction holding the store's connection.
///
/// Commit and rollback are idempotent once the transaction is finalized,
/// and dropping an active handle rolls back, so a panicking caller cannot
/// leave a transaction half-open.
struct SqliteInvoiceTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    state: TxnState,
}

impl InvoiceTxn for SqliteInvoiceTxn<'_> {
    fn create(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        insert_invoice(&self.conn, invoice)
    }

    fn update(&mut self, invoice: &mut Invoice, mutate: MutateFn<'_>) -> Result<(), StoreError> {
        apply_update(&self.conn, invoice, mutate)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        delete_invoice(&self.conn, id)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.state != TxnState::Active {
            return Ok(());
        }
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.state = TxnState::Committed;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.state != TxnState::Active {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::error!("Failed to roll back invoice transaction: {}", e);
        }
        self.state = TxnState::RolledBack;
    }
}

impl Drop for SqliteInvoiceTxn<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> SqliteInvoiceStore {
        SqliteInvoiceStore::in_memory().unwrap()
    }

    fn test_invoice(id: &str) -> Invoice {
        Invoice::new(id, format!("/data/uploads/{}.jpg", id))
    }

    #[test]
    fn test_create_and_get() {
        let store = create_test_store();
        let invoice = test_invoice("inv-1");

        store.create(&invoice).unwrap();
        let fetched = store.get("inv-1").unwrap();

        assert_eq!(fetched.id, invoice.id);
        assert_eq!(fetched.status, InvoiceStatus::Pending);
        assert_eq!(fetched.image_path, invoice.image_path);
        assert!(fetched.extracted_data.is_none());
        assert!(fetched.error_message.is_none());
    }

    #[test]
    fn test_create_duplicate_id_conflicts() {
        let store = create_test_store();
        let invoice = test_invoice("inv-1");

        store.create(&invoice).unwrap();
        let result = store.create(&invoice);
        assert!(matches!(result, Err(StoreError::Conflict(id)) if id == "inv-1"));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        let result = store.get("missing");
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_orders_by_created_at_descending() {
        let store = create_test_store();
        let base = Utc::now();

        // Insert out of chronological order.
        for (id, age_secs) in [("oldest", 30), ("newest", 0), ("middle", 15)] {
            let mut invoice = test_invoice(id);
            invoice.created_at = base - Duration::seconds(age_secs);
            invoice.updated_at = invoice.created_at;
            store.create(&invoice).unwrap();
        }

        let page = store.list(PageRequest::default()).unwrap();
        let ids: Vec<&str> = page.invoices.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_list_pagination_metadata() {
        let store = create_test_store();
        let base = Utc::now();

        for i in 0..25 {
            let mut invoice = test_invoice(&format!("inv-{:02}", i));
            invoice.created_at = base - Duration::seconds(i);
            invoice.updated_at = invoice.created_at;
            store.create(&invoice).unwrap();
        }

        let page = store.list(PageRequest::new(1, 10)).unwrap();
        assert_eq!(page.invoices.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let page = store.list(PageRequest::new(3, 10)).unwrap();
        assert_eq!(page.invoices.len(), 5);
        assert_eq!(page.page, 3);

        let page = store.list(PageRequest::new(4, 10)).unwrap();
        assert!(page.invoices.is_empty());
        assert_eq!(page.total, 25);
    }

    #[test]
    fn test_update_persists_mutation() {
        let store = create_test_store();
        let mut invoice = test_invoice("inv-1");
        store.create(&invoice).unwrap();

        store
            .update(&mut invoice, &|inv| {
                inv.mark_processing();
                Ok(())
            })
            .unwrap();

        let fetched = store.get("inv-1").unwrap();
        assert_eq!(fetched.status, InvoiceStatus::Processing);
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[test]
    fn test_update_completed_round_trips_data() {
        let store = create_test_store();
        let mut invoice = test_invoice("inv-1");
        store.create(&invoice).unwrap();

        let data = serde_json::json!({
            "key_value_pairs": [{"key": "Total", "value": "120.50"}],
            "confidence": 0.92,
        });

        store
            .update(&mut invoice, &|inv| {
                inv.mark_completed(data.clone());
                Ok(())
            })
            .unwrap();

        let fetched = store.get("inv-1").unwrap();
        assert_eq!(fetched.status, InvoiceStatus::Completed);
        assert_eq!(fetched.extracted_data, Some(data.clone()));
    }

    #[test]
    fn test_rejected_mutation_writes_nothing() {
        let store = create_test_store();
        let mut invoice = test_invoice("inv-1");
        store.create(&invoice).unwrap();

        let result = store.update(&mut invoice, &|_| {
            Err(StoreError::Rejected("not allowed".to_string()))
        });
        assert!(matches!(result, Err(StoreError::Rejected(_))));

        let fetched = store.get("inv-1").unwrap();
        assert_eq!(fetched.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_update_deleted_record_is_not_found() {
        let store = create_test_store();
        let mut invoice = test_invoice("inv-1");
        store.create(&invoice).unwrap();
        store.delete("inv-1").unwrap();

        let result = store.update(&mut invoice, &|inv| {
            inv.mark_processing();
            Ok(())
        });
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_record() {
        let store = create_test_store();
        store.create(&test_invoice("inv-1")).unwrap();

        store.delete("inv-1").unwrap();
        assert!(matches!(store.get("inv-1"), Err(StoreError::NotFound(_))));

        // Second delete of the same id reports NotFound.
        assert!(matches!(store.delete("inv-1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_transaction_commit() {
        let store = create_test_store();

        let mut txn = store.begin().unwrap();
        txn.create(&test_invoice("inv-1")).unwrap();
        txn.create(&test_invoice("inv-2")).unwrap();
        txn.commit().unwrap();
        drop(txn);

        assert!(store.get("inv-1").is_ok());
        assert!(store.get("inv-2").is_ok());
    }

    #[test]
    fn test_transaction_rollback_discards_writes() {
        let store = create_test_store();

        let mut txn = store.begin().unwrap();
        txn.create(&test_invoice("inv-1")).unwrap();
        txn.rollback();
        drop(txn);

        assert!(matches!(store.get("inv-1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_transaction_drop_rolls_back() {
        let store = create_test_store();

        {
            let mut txn = store.begin().unwrap();
            txn.create(&test_invoice("inv-1")).unwrap();
            // Dropped without commit.
        }

        assert!(matches!(store.get("inv-1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_transaction_finalization_is_idempotent() {
        let store = create_test_store();

        let mut txn = store.begin().unwrap();
        txn.create(&test_invoice("inv-1")).unwrap();
        txn.commit().unwrap();
        // Rollback after commit and a second commit are both no-ops.
        txn.rollback();
        txn.commit().unwrap();
        drop(txn);

        assert!(store.get("inv-1").is_ok());
    }

    #[test]
    fn test_transaction_finish_with_error_rolls_back() {
        let store = create_test_store();

        let mut txn = store.begin().unwrap();
        txn.create(&test_invoice("inv-1")).unwrap();
        let result = txn.finish(Err(StoreError::Rejected("validation failed".to_string())));
        assert!(result.is_err());
        drop(txn);

        assert!(matches!(store.get("inv-1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_transaction_mixed_operations() {
        let store = create_test_store();
        let mut existing = test_invoice("existing");
        store.create(&existing).unwrap();

        let mut txn = store.begin().unwrap();
        txn.create(&test_invoice("fresh")).unwrap();
        txn.update(&mut existing, &|inv| {
            inv.mark_processing();
            Ok(())
        })
        .unwrap();
        txn.commit().unwrap();
        drop(txn);

        assert_eq!(store.get("existing").unwrap().status, InvoiceStatus::Processing);
        assert!(store.get("fresh").is_ok());
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("invoices.db");

        let store = SqliteInvoiceStore::new(&db_path).unwrap();
        store.create(&test_invoice("inv-1")).unwrap();

        assert!(db_path.exists());
        assert!(store.get("inv-1").is_ok());
    }
}
