//! Terminal folders and the copy / flag / expunge routing sequence.

use std::fmt;

use tracing::info;

use super::MailStore;
use crate::error::MailboxError;

/// Destination folder for a processed message. Folders must pre-exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Folder {
    /// Not a review: unknown sender or no marker in the subject.
    General,
    /// Review marker present but unusable subject, or a review that changed nothing.
    Malformed,
    /// Review applied or contract approved.
    Reviewed,
}

impl Folder {
    pub const ALL: [Folder; 3] = [Folder::General, Folder::Malformed, Folder::Reviewed];

    pub fn name(&self) -> &'static str {
        match self {
            Folder::General => "General",
            Folder::Malformed => "Malformed",
            Folder::Reviewed => "Reviewed",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Move a message out of the monitored folder into `folder`.
///
/// Any failure leaves the message where it was (possibly already copied),
/// so the next tick sees it again.
pub async fn route_message(
    mailbox: &dyn MailStore,
    uid: u32,
    folder: Folder,
) -> Result<(), MailboxError> {
    mailbox.copy(uid, folder.name()).await?;
    mailbox.mark_deleted(uid).await?;
    mailbox.expunge().await?;
    info!(uid, folder = %folder, "Message routed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct CallLog {
        calls: Mutex<Vec<String>>,
        fail_copy: bool,
    }

    #[async_trait]
    impl MailStore for CallLog {
        async fn search_all(&self) -> Result<Vec<u32>, MailboxError> {
            Ok(vec![])
        }
        async fn fetch(&self, uid: u32) -> Result<Vec<u8>, MailboxError> {
            Err(MailboxError::NotFound { uid })
        }
        async fn copy(&self, uid: u32, folder: &str) -> Result<(), MailboxError> {
            if self.fail_copy {
                return Err(MailboxError::Command {
                    command: "UID COPY".into(),
                    reason: "NO [TRYCREATE] no such mailbox".into(),
                });
            }
            self.calls.lock().unwrap().push(format!("copy {uid} {folder}"));
            Ok(())
        }
        async fn mark_deleted(&self, uid: u32) -> Result<(), MailboxError> {
            self.calls.lock().unwrap().push(format!("delete {uid}"));
            Ok(())
        }
        async fn expunge(&self) -> Result<(), MailboxError> {
            self.calls.lock().unwrap().push("expunge".into());
            Ok(())
        }
    }

    #[test]
    fn folder_names_are_fixed() {
        let names: Vec<_> = Folder::ALL.iter().map(|f| f.to_string()).collect();
        assert_eq!(names, vec!["General", "Malformed", "Reviewed"]);
    }

    #[tokio::test]
    async fn routes_with_copy_flag_expunge() {
        let mailbox = CallLog::default();
        route_message(&mailbox, 42, Folder::Reviewed).await.unwrap();
        assert_eq!(
            *mailbox.calls.lock().unwrap(),
            vec!["copy 42 Reviewed", "delete 42", "expunge"]
        );
    }

    #[tokio::test]
    async fn failed_copy_leaves_message_in_place() {
        let mailbox = CallLog {
            fail_copy: true,
            ..Default::default()
        };
        let err = route_message(&mailbox, 3, Folder::General).await.unwrap_err();
        assert!(matches!(err, MailboxError::Command { .. }));
        assert!(mailbox.calls.lock().unwrap().is_empty());
    }
}
