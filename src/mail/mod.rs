//! Mailbox side of the pipeline: the mail store seam, the IMAP adapter,
//! message parsing, and folder routing.

pub mod imap;
pub mod message;
pub mod router;

use async_trait::async_trait;

use crate::error::MailboxError;

pub use imap::{ImapMailbox, MailboxConfig};
pub use message::{ReviewMail, is_sender_allowed, plain_text_body};
pub use router::{Folder, route_message};

/// Operations the pipeline needs from the monitored mailbox.
///
/// Message ids are UIDs, stable across expunges within a session.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Ids of every message in the monitored folder, ascending.
    async fn search_all(&self) -> Result<Vec<u32>, MailboxError>;

    /// Raw RFC 822 source of one message.
    async fn fetch(&self, uid: u32) -> Result<Vec<u8>, MailboxError>;

    /// Copy a message into another folder. The folder must already exist.
    async fn copy(&self, uid: u32, folder: &str) -> Result<(), MailboxError>;

    /// Flag a message `\Deleted`.
    async fn mark_deleted(&self, uid: u32) -> Result<(), MailboxError>;

    /// Permanently remove every message flagged `\Deleted`.
    async fn expunge(&self) -> Result<(), MailboxError>;
}
