use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use review_intake::config::{ReviewConfig, RuntimeConfig};
use review_intake::error::{MailboxError, Result};
use review_intake::mail::{ImapMailbox, MailboxConfig};
use review_intake::pipeline::{ReviewPipeline, ReviewPoller};
use review_intake::store::LibSqlBackend;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| MailboxError::Tls("failed to install rustls crypto provider".into()))?;

    let runtime = RuntimeConfig::from_env();
    let _log_guard = init_tracing(runtime.log_dir.as_deref());

    let review_config = ReviewConfig::from_env()?;
    let mailbox_config = MailboxConfig::from_env()?;

    eprintln!("📬 Review Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mailbox: {}@{}:{} ({})",
        mailbox_config.username, mailbox_config.imap_host, mailbox_config.imap_port, mailbox_config.inbox
    );
    eprintln!("   Database: {}", runtime.db_path.display());
    eprintln!("   Poll interval: {}s", review_config.poll_interval.as_secs());
    eprintln!("   Press Ctrl-C to stop.\n");

    if review_config.allowed_reviewers.is_empty() {
        warn!("REVIEW_ALLOWED_REVIEWERS is empty, every message will be routed to General");
    }

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(LibSqlBackend::new_local(&runtime.db_path).await?);

    // ── Mailbox + poller ─────────────────────────────────────────────────
    let mailbox = Arc::new(ImapMailbox::new(mailbox_config));
    let interval = review_config.poll_interval;
    let pipeline = Arc::new(ReviewPipeline::new(mailbox.clone(), store, review_config));
    let poller = ReviewPoller::spawn(pipeline, interval);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    poller.stop().await;
    mailbox.logout().await;
    info!("Review intake stopped");
    Ok(())
}

/// Log to stderr, or to a daily rolling file when a log directory is set.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "review-intake.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
