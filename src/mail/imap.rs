//! IMAP mail store: raw IMAP over rustls.
//!
//! The socket is blocking, so every operation runs in `spawn_blocking`
//! against a session kept behind a mutex. A session that hits a transport
//! or protocol error is dropped and the next operation reconnects.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::MailStore;
use crate::config::parse_var;
use crate::error::{ConfigError, MailboxError};

const IO_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// IMAP connection settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    /// Monitored folder.
    pub inbox: String,
}

impl MailboxConfig {
    /// Fails with `MissingEnvVar` if `IMAP_HOST` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let imap_host = lookup("IMAP_HOST")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("IMAP_HOST".into()))?;

        let imap_port: u16 = parse_var(&lookup, "IMAP_PORT")?.unwrap_or(993);
        let username = lookup("IMAP_USERNAME").unwrap_or_default();
        let password = SecretString::from(lookup("IMAP_PASSWORD").unwrap_or_default());
        let inbox = lookup("REVIEW_INBOX")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "INBOX".to_string());

        Ok(Self {
            imap_host,
            imap_port,
            username,
            password,
            inbox,
        })
    }
}

// ── Mail store ──────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// `MailStore` backed by a single IMAP session on the monitored folder.
pub struct ImapMailbox {
    config: Arc<MailboxConfig>,
    session: Arc<Mutex<Option<Session<TlsStream>>>>,
}

impl ImapMailbox {
    /// Create the store. Nothing connects until the first operation.
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Close the session if one is open.
    pub async fn logout(&self) {
        let slot = Arc::clone(&self.session);
        let _ = tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(mut session) = guard.take() {
                let _ = session.command("LOGOUT");
                debug!("IMAP session closed");
            }
        })
        .await;
    }

    /// Run `op` against the open session, connecting first if needed.
    async fn with_session<T, F>(&self, op: F) -> Result<T, MailboxError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<TlsStream>) -> Result<T, MailboxError> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.session);

        tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut session = match guard.take() {
                Some(session) => session,
                None => Session::open(&config)?,
            };

            let result = op(&mut session);
            match &result {
                Ok(_) | Err(MailboxError::Command { .. } | MailboxError::NotFound { .. }) => {
                    *guard = Some(session);
                }
                Err(e) => warn!(error = %e, "Dropping IMAP session"),
            }
            result
        })
        .await
        .map_err(|e| MailboxError::Task(e.to_string()))?
    }
}

#[async_trait]
impl MailStore for ImapMailbox {
    async fn search_all(&self) -> Result<Vec<u32>, MailboxError> {
        self.with_session(|session| {
            let response = session.command("UID SEARCH ALL")?;
            Ok(parse_search(&response.lines))
        })
        .await
    }

    async fn fetch(&self, uid: u32) -> Result<Vec<u8>, MailboxError> {
        self.with_session(move |session| {
            let response = session.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
            response
                .literals
                .into_iter()
                .next()
                .ok_or(MailboxError::NotFound { uid })
        })
        .await
    }

    async fn copy(&self, uid: u32, folder: &str) -> Result<(), MailboxError> {
        let command = format!("UID COPY {uid} {}", quote(folder));
        self.with_session(move |session| session.command(&command).map(|_| ()))
            .await
    }

    async fn mark_deleted(&self, uid: u32) -> Result<(), MailboxError> {
        self.with_session(move |session| {
            session
                .command(&format!("UID STORE {uid} +FLAGS.SILENT (\\Deleted)"))
                .map(|_| ())
        })
        .await
    }

    async fn expunge(&self) -> Result<(), MailboxError> {
        self.with_session(|session| session.command("EXPUNGE").map(|_| ()))
            .await
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Untagged lines and literal payloads collected for one command.
#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

/// One IMAP conversation over any byte stream.
struct Session<S: Read + Write> {
    stream: S,
    next_tag: u32,
}

impl Session<TlsStream> {
    /// Connect, log in, and select the monitored folder.
    fn open(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let connect_err = |reason: String| MailboxError::Connect {
            host: config.imap_host.clone(),
            port: config.imap_port,
            reason,
        };

        let addr = (config.imap_host.as_str(), config.imap_port)
            .to_socket_addrs()
            .map_err(|e| connect_err(e.to_string()))?
            .next()
            .ok_or_else(|| connect_err("no address resolved".into()))?;
        let tcp =
            TcpStream::connect_timeout(&addr, IO_TIMEOUT).map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(IO_TIMEOUT))?;
        tcp.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;

        let mut session = Session::new(rustls::StreamOwned::new(conn, tcp));
        session.greeting()?;
        session
            .command(&format!(
                "LOGIN {} {}",
                quote(&config.username),
                quote(config.password.expose_secret())
            ))
            .map_err(|e| match e {
                MailboxError::Command { .. } => MailboxError::LoginFailed {
                    username: config.username.clone(),
                },
                other => other,
            })?;
        session.command(&format!("SELECT {}", quote(&config.inbox)))?;

        info!(host = %config.imap_host, folder = %config.inbox, "IMAP session opened");
        Ok(session)
    }
}

impl<S: Read + Write> Session<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            next_tag: 0,
        }
    }

    fn greeting(&mut self) -> Result<(), MailboxError> {
        let line = self.read_line()?;
        if line.starts_with("* OK") || line.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                line.trim_end()
            )))
        }
    }

    /// Send a tagged command and collect everything up to its completion.
    fn command(&mut self, command: &str) -> Result<Response, MailboxError> {
        self.next_tag += 1;
        let tag = format!("A{}", self.next_tag);

        self.stream
            .write_all(format!("{tag} {command}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;
            if let Some(status) = tagged_status(&line, &tag) {
                return status.map(|()| response).map_err(|reason| MailboxError::Command {
                    command: command_name(command),
                    reason,
                });
            }
            if let Some(len) = literal_length(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            response.lines.push(line);
        }
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(MailboxError::Protocol("IMAP connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ── Protocol helpers ────────────────────────────────────────────────

/// `Some(Ok)` for `<tag> OK ...`, `Some(Err(text))` for NO/BAD, `None` otherwise.
fn tagged_status(line: &str, tag: &str) -> Option<Result<(), String>> {
    let rest = line.strip_prefix(tag)?.strip_prefix(' ')?.trim_end();
    if rest.starts_with("OK") {
        Some(Ok(()))
    } else {
        Some(Err(rest.to_string()))
    }
}

/// Length of a `{N}` literal announced at the end of a line.
fn literal_length(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let open = line.strip_suffix('}')?.rfind('{')?;
    line[open + 1..line.len() - 1].parse().ok()
}

/// UIDs from `* SEARCH` lines, ascending.
fn parse_search(lines: &[String]) -> Vec<u32> {
    let mut uids: Vec<u32> = lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|n| n.parse().ok()))
        .collect();
    uids.sort_unstable();
    uids.dedup();
    uids
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Command name for error messages; never includes arguments.
fn command_name(command: &str) -> String {
    let mut words = command.split_whitespace();
    match words.next() {
        Some("UID") => format!("UID {}", words.next().unwrap_or_default()),
        Some(verb) => verb.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Replays canned server output and records what the client wrote.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Scripted {
        fn new(server: &str) -> Self {
            Self {
                input: Cursor::new(server.as_bytes().to_vec()),
                written: Vec::new(),
            }
        }

        fn sent(&self) -> String {
            String::from_utf8_lossy(&self.written).to_string()
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    // ── Helper tests ────────────────────────────────────────────────

    #[test]
    fn tagged_status_matches_only_own_tag() {
        assert_eq!(tagged_status("A1 OK done\r\n", "A1"), Some(Ok(())));
        assert_eq!(
            tagged_status("A1 NO [TRYCREATE] missing\r\n", "A1"),
            Some(Err("NO [TRYCREATE] missing".to_string()))
        );
        assert_eq!(tagged_status("A12 OK done\r\n", "A1"), None);
        assert_eq!(tagged_status("* 3 EXISTS\r\n", "A1"), None);
    }

    #[test]
    fn literal_length_parses_suffix() {
        assert_eq!(literal_length("* 1 FETCH (UID 7 BODY[] {342}\r\n"), Some(342));
        assert_eq!(literal_length("* 1 FETCH (FLAGS (\\Seen))\r\n"), None);
        assert_eq!(literal_length("* OK {abc}\r\n"), None);
    }

    #[test]
    fn search_lines_are_collected_sorted() {
        let lines = vec![
            "* SEARCH 9 3 5\r\n".to_string(),
            "* 4 EXISTS\r\n".to_string(),
            "* SEARCH\r\n".to_string(),
        ];
        assert_eq!(parse_search(&lines), vec![3, 5, 9]);
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("Reviewed"), "\"Reviewed\"");
        assert_eq!(quote(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
    }

    #[test]
    fn command_name_hides_arguments() {
        assert_eq!(command_name("LOGIN \"u\" \"secret\""), "LOGIN");
        assert_eq!(command_name("UID COPY 4 \"Reviewed\""), "UID COPY");
    }

    // ── Session tests ───────────────────────────────────────────────

    #[test]
    fn command_collects_untagged_lines() {
        let mut session = Session::new(Scripted::new("* SEARCH 2 4\r\nA1 OK SEARCH completed\r\n"));
        let response = session.command("UID SEARCH ALL").unwrap();
        assert_eq!(parse_search(&response.lines), vec![2, 4]);
        assert_eq!(session.stream.sent(), "A1 UID SEARCH ALL\r\n");
    }

    #[test]
    fn command_reads_literals() {
        let server = "* 1 FETCH (UID 12 BODY[] {12}\r\nHello\r\nWorld)\r\nA1 OK FETCH completed\r\n";
        let mut session = Session::new(Scripted::new(server));
        let response = session.command("UID FETCH 12 BODY.PEEK[]").unwrap();
        assert_eq!(response.literals, vec![b"Hello\r\nWorld".to_vec()]);
    }

    #[test]
    fn tags_increment_per_command() {
        let mut session = Session::new(Scripted::new("A1 OK\r\nA2 OK\r\n"));
        session.command("NOOP").unwrap();
        session.command("EXPUNGE").unwrap();
        assert_eq!(session.stream.sent(), "A1 NOOP\r\nA2 EXPUNGE\r\n");
    }

    #[test]
    fn rejected_command_is_command_error() {
        let mut session = Session::new(Scripted::new("A1 NO [TRYCREATE] no such mailbox\r\n"));
        let err = session.command("UID COPY 3 \"Reviewed\"").unwrap_err();
        match err {
            MailboxError::Command { command, reason } => {
                assert_eq!(command, "UID COPY");
                assert!(reason.contains("TRYCREATE"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn closed_connection_is_protocol_error() {
        let mut session = Session::new(Scripted::new("* 1 EXISTS\r\n"));
        assert!(matches!(
            session.command("NOOP"),
            Err(MailboxError::Protocol(_))
        ));
    }

    #[test]
    fn greeting_must_be_ok() {
        let mut session = Session::new(Scripted::new("* OK IMAP4rev1 ready\r\n"));
        session.greeting().unwrap();

        let mut session = Session::new(Scripted::new("* BYE go away\r\n"));
        assert!(matches!(session.greeting(), Err(MailboxError::Protocol(_))));
    }

    // ── Config tests ────────────────────────────────────────────────

    #[test]
    fn config_requires_host() {
        let err = MailboxConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "IMAP_HOST"));
    }

    #[test]
    fn config_defaults() {
        let config = MailboxConfig::from_lookup(|key| match key {
            "IMAP_HOST" => Some("imap.example.com".into()),
            "IMAP_PASSWORD" => Some("hunter2".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.imap_port, 993);
        assert_eq!(config.inbox, "INBOX");
        assert_eq!(config.password.expose_secret(), "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
