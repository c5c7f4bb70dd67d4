//! Outbound mail dispatch.
//!
//! Request handlers only ever [`Mailer::enqueue`] a message; a background
//! worker drains the queue and hands each message to a [`MailSender`].
//! Delivery failures are logged by the worker and never reach the request
//! that triggered them.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::config::MailConfig;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Sender that records outgoing mail in the log instead of talking to an
/// SMTP relay. Used when no real transport is wired in.
pub struct LogMailer {
    config: MailConfig,
}

impl LogMailer {
    pub fn new(config: MailConfig) -> Self {
        LogMailer { config }
    }
}

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if !message.recipient.contains('@') {
            return Err(MailError::InvalidRecipient(message.recipient.clone()));
        }
        let relay = format!("{}:{}", self.config.smtp, self.config.smtp_port);
        info!(
            from = %self.config.host_user,
            relay = %relay,
            to = %message.recipient,
            subject = %message.subject,
            "mail sent"
        );
        trace!(to = %message.recipient, body = %redact_tokens(&message.body), "mail body");
        Ok(())
    }
}

/// Masks every `token=` query value in `text`. Mail bodies carry live
/// verification and reset tokens.
fn redact_tokens(text: &str) -> String {
    const MARKER: &str = "token=";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        let (head, tail) = rest.split_at(pos + MARKER.len());
        out.push_str(head);
        out.push_str("[redacted]");
        let end = tail
            .find(|c: char| c == '&' || c.is_whitespace())
            .unwrap_or(tail.len());
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

/// Cheap, cloneable handle to the mail queue.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<MailMessage>,
}

impl Mailer {
    /// Starts the worker. It runs until every `Mailer` clone is dropped.
    pub fn spawn(sender: Arc<dyn MailSender>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<MailMessage>(QUEUE_CAPACITY);
        let worker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match sender.send(&message).await {
                    Ok(()) => debug!(to = %message.recipient, "mail delivered"),
                    Err(e) => warn!(error = %e, to = %message.recipient, "mail delivery failed"),
                }
            }
            debug!("mail queue closed");
        });
        (Mailer { tx }, worker)
    }

    /// Queues `message` without waiting. A full or closed queue drops the
    /// message with a warning.
    pub fn enqueue(&self, message: MailMessage) {
        if let Err(e) = self.tx.try_send(message) {
            warn!(error = %e, "mail dropped before dispatch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io, sync::Mutex, time::Duration};

    struct Recording(mpsc::UnboundedSender<MailMessage>);

    #[async_trait]
    impl MailSender for Recording {
        async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            let _ = self.0.send(message.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MailSender for Failing {
        async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
            Err(MailError::Transport("relay unreachable".into()))
        }
    }

    fn message(to: &str) -> MailMessage {
        MailMessage {
            recipient: to.into(),
            subject: "hello".into(),
            body: "body".into(),
        }
    }

    #[tokio::test]
    async fn queued_mail_reaches_the_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mailer, _worker) = Mailer::spawn(Arc::new(Recording(tx)));
        mailer.enqueue(message("a@x.com"));

        let sent = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("worker delivered in time")
            .expect("message");
        assert_eq!(sent.recipient, "a@x.com");
    }

    #[tokio::test]
    async fn sender_failure_does_not_stop_the_worker() {
        let (mailer, worker) = Mailer::spawn(Arc::new(Failing));
        mailer.enqueue(message("a@x.com"));
        mailer.enqueue(message("b@x.com"));
        drop(mailer);

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker drains and exits")
            .expect("worker did not panic");
    }

    #[tokio::test]
    async fn log_mailer_rejects_malformed_recipient() {
        let mailer = LogMailer::new(MailConfig {
            host_user: "noreply@example.com".into(),
            smtp: "smtp.example.com".into(),
            smtp_port: 465,
        });
        assert!(mailer.send(&message("nobody")).await.is_err());
        assert!(mailer.send(&message("a@x.com")).await.is_ok());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn redaction_masks_every_token_value() {
        assert_eq!(
            redact_tokens("http://h:8000/resetPassword?token=abc.def.ghi"),
            "http://h:8000/resetPassword?token=[redacted]"
        );
        assert_eq!(
            redact_tokens("a?token=x&b=1 and token=y"),
            "a?token=[redacted]&b=1 and token=[redacted]"
        );
        assert_eq!(redact_tokens("no secrets here"), "no secrets here");
    }

    #[tokio::test]
    async fn log_mailer_keeps_link_tokens_out_of_the_log() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mailer = LogMailer::new(MailConfig {
            host_user: "noreply@example.com".into(),
            smtp: "smtp.example.com".into(),
            smtp_port: 465,
        });
        let reset = MailMessage {
            recipient: "a@x.com".into(),
            subject: "Reset password".into(),
            body: "http://localhost:8000/resetPassword?token=eyJhbGciOi.payload.signature".into(),
        };
        mailer.send(&reset).await.unwrap();

        let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("mail sent"));
        assert!(logged.contains("a@x.com"));
        assert!(logged.contains("token=[redacted]"));
        assert!(!logged.contains("eyJhbGciOi.payload.signature"));
    }
}
