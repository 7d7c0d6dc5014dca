//! libSQL backend: async `DocumentStore` implementation.
//!
//! Each collection is a table of JSON documents keyed by the document's
//! natural key. Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::contract::{Account, ContractDraft};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::DocumentStore;

/// A document collection: table name plus key column.
#[derive(Debug, Clone, Copy)]
struct Collection {
    table: &'static str,
    key_column: &'static str,
}

const DRAFTS: Collection = Collection {
    table: "contract_drafts",
    key_column: "key",
};

const LIVE: Collection = Collection {
    table: "live_contracts",
    key_column: "key",
};

const ACCOUNTS: Collection = Collection {
    table: "accounts",
    key_column: "email_address",
};

/// libSQL document store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn find_document<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, DatabaseError> {
        let sql = format!(
            "SELECT document FROM {} WHERE {} = ?1",
            collection.table, collection.key_column
        );
        let mut rows = self
            .conn()
            .query(&sql, params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("find {}: {e}", collection.table)))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find {}: {e}", collection.table)))?;

        match row {
            Some(row) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                let document = serde_json::from_str(&raw).map_err(|e| {
                    DatabaseError::Serialization(format!(
                        "{} document {key}: {e}",
                        collection.table
                    ))
                })?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn insert_document<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        document: &T,
    ) -> Result<(), DatabaseError> {
        let json = to_json(document)?;
        let sql = format!(
            "INSERT INTO {} ({}, document) VALUES (?1, ?2)",
            collection.table, collection.key_column
        );
        self.conn()
            .execute(&sql, params![key, json])
            .await
            .map_err(|e| classify_write_error(collection, e))?;

        debug!(table = collection.table, key = key, "Document inserted");
        Ok(())
    }

    async fn replace_document<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        document: &T,
    ) -> Result<bool, DatabaseError> {
        let json = to_json(document)?;
        let sql = format!(
            "UPDATE {} SET document = ?2, updated_at = datetime('now') WHERE {} = ?1",
            collection.table, collection.key_column
        );
        let affected = self
            .conn()
            .execute(&sql, params![key, json])
            .await
            .map_err(|e| classify_write_error(collection, e))?;

        debug!(table = collection.table, key = key, affected, "Document replaced");
        Ok(affected > 0)
    }

    async fn delete_document(&self, collection: Collection, key: &str) -> Result<bool, DatabaseError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            collection.table, collection.key_column
        );
        let affected = self
            .conn()
            .execute(&sql, params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete {}: {e}", collection.table)))?;

        debug!(table = collection.table, key = key, affected, "Document deleted");
        Ok(affected > 0)
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn to_json<T: Serialize>(document: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(document).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Separate key collisions from other write failures.
fn classify_write_error(collection: Collection, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{}: {message}", collection.table))
    } else {
        DatabaseError::Query(format!("write {}: {message}", collection.table))
    }
}

// ── DocumentStore impl ──────────────────────────────────────────────

#[async_trait]
impl DocumentStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn find_draft(&self, key: &str) -> Result<Option<ContractDraft>, DatabaseError> {
        self.find_document(DRAFTS, key).await
    }

    async fn insert_draft(&self, draft: &ContractDraft) -> Result<(), DatabaseError> {
        self.insert_document(DRAFTS, &draft.key, draft).await
    }

    async fn replace_draft(&self, draft: &ContractDraft) -> Result<bool, DatabaseError> {
        self.replace_document(DRAFTS, &draft.key, draft).await
    }

    async fn delete_draft(&self, key: &str) -> Result<bool, DatabaseError> {
        self.delete_document(DRAFTS, key).await
    }

    async fn find_live(&self, key: &str) -> Result<Option<ContractDraft>, DatabaseError> {
        self.find_document(LIVE, key).await
    }

    async fn insert_live(&self, contract: &ContractDraft) -> Result<(), DatabaseError> {
        self.insert_document(LIVE, &contract.key, contract).await
    }

    async fn replace_live(&self, contract: &ContractDraft) -> Result<bool, DatabaseError> {
        self.replace_document(LIVE, &contract.key, contract).await
    }

    async fn find_account(&self, email_address: &str) -> Result<Option<Account>, DatabaseError> {
        self.find_document(ACCOUNTS, email_address).await
    }

    async fn insert_account(&self, account: &Account) -> Result<(), DatabaseError> {
        self.insert_document(ACCOUNTS, &account.email_address, account)
            .await
    }

    async fn replace_account(&self, account: &Account) -> Result<bool, DatabaseError> {
        self.replace_document(ACCOUNTS, &account.email_address, account)
            .await
    }
}
