//! `DocumentStore` trait: async interface over the three contract collections.
//!
//! Drafts and live contracts are keyed by contract `key`, accounts by
//! `email_address`. Writes replace whole documents; there are no partial
//! updates.

use async_trait::async_trait;

use crate::contract::{Account, ContractDraft};
use crate::error::DatabaseError;

/// Backend-agnostic document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Drafts ──────────────────────────────────────────────────────

    /// Find a draft by contract key.
    async fn find_draft(&self, key: &str) -> Result<Option<ContractDraft>, DatabaseError>;

    /// Insert a new draft. Fails if the key already exists.
    async fn insert_draft(&self, draft: &ContractDraft) -> Result<(), DatabaseError>;

    /// Replace an existing draft by key. Returns `false` if no draft matched.
    async fn replace_draft(&self, draft: &ContractDraft) -> Result<bool, DatabaseError>;

    /// Delete a draft by key. Returns `false` if no draft matched.
    async fn delete_draft(&self, key: &str) -> Result<bool, DatabaseError>;

    // ── Live contracts ──────────────────────────────────────────────

    /// Find a live contract by key.
    async fn find_live(&self, key: &str) -> Result<Option<ContractDraft>, DatabaseError>;

    /// Insert a live contract. Fails if the key already exists.
    async fn insert_live(&self, contract: &ContractDraft) -> Result<(), DatabaseError>;

    /// Replace a live contract by key. Returns `false` if none matched.
    async fn replace_live(&self, contract: &ContractDraft) -> Result<bool, DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Find an account by email address.
    async fn find_account(&self, email_address: &str) -> Result<Option<Account>, DatabaseError>;

    /// Insert a new account.
    async fn insert_account(&self, account: &Account) -> Result<(), DatabaseError>;

    /// Replace an existing account by email address. Returns `false` if no
    /// account matched.
    async fn replace_account(&self, account: &Account) -> Result<bool, DatabaseError>;
}
