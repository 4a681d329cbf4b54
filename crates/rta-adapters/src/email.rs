//! E-mail notification channel.
//!
//! [`SmtpNotifier`] delivers alert notifications over SMTP with implicit
//! TLS (port 465) and `AUTH LOGIN`.  The dialogue itself is written against
//! any `AsyncRead + AsyncWrite` stream so that it can be driven without a
//! network in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::ClientConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use rta_kernel::Notifier;

use crate::error::{AdapterError, Result};

/// Default SMTP TLS port.
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Connection and per-reply timeout in seconds.
const SMTP_TIMEOUT_SECS: u64 = 30;

/// Domain announced in `EHLO`.
const EHLO_DOMAIN: &str = "rta.local";

// ---------------------------------------------------------------------------
// SMTP command builders (pure functions, testable)
// ---------------------------------------------------------------------------

/// Build an SMTP EHLO command.
pub fn smtp_ehlo_command(domain: &str) -> String {
    format!("EHLO {domain}\r\n")
}

/// Encode a credential line for `AUTH LOGIN`.
pub fn smtp_base64_line(input: &str) -> String {
    use base64::Engine;
    format!("{}\r\n", base64::engine::general_purpose::STANDARD.encode(input))
}

/// Build an SMTP MAIL FROM command.
pub fn smtp_mail_from_command(from: &str) -> String {
    format!("MAIL FROM:<{from}>\r\n")
}

/// Build an SMTP RCPT TO command.
pub fn smtp_rcpt_to_command(to: &str) -> String {
    format!("RCPT TO:<{to}>\r\n")
}

/// Build the DATA payload: headers, a dot-stuffed CRLF body and the
/// terminating `.` line.
pub fn smtp_message_body(from: &str, to: &str, subject: &str, body: &str) -> String {
    let body: String = body
        .lines()
        .map(|line| {
            if line.starts_with('.') {
                format!(".{line}\r\n")
            } else {
                format!("{line}\r\n")
            }
        })
        .collect();

    format!(
        "From: {from}\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=UTF-8\r\n\
         \r\n\
         {body}\
         .\r\n"
    )
}

// ---------------------------------------------------------------------------
// SMTP dialogue
// ---------------------------------------------------------------------------

/// One complete server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub status: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    /// The final line of the reply.
    pub fn last_line(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or_default()
    }
}

/// Read an SMTP reply (one or more lines) until the final status line.
async fn read_reply<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<SmtpReply> {
    let mut lines = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(SMTP_TIMEOUT_SECS);

    loop {
        let mut line = String::new();
        match tokio::time::timeout_at(deadline, reader.read_line(&mut line)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let trimmed = line.trim().to_string();
                debug!(smtp_line = %trimmed, "SMTP response line");
                // "NNN-text" continues the reply, "NNN text" ends it.
                let is_final = trimmed.as_bytes().get(3) != Some(&b'-');
                lines.push(trimmed);
                if is_final {
                    break;
                }
            }
            Ok(Err(e)) => return Err(AdapterError::IoError(e)),
            Err(_) => {
                return Err(AdapterError::Timeout {
                    seconds: SMTP_TIMEOUT_SECS,
                    reason: "SMTP response timed out".into(),
                });
            }
        }
    }

    let status = lines
        .first()
        .and_then(|l| l.get(..3))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    Ok(SmtpReply { status, lines })
}

/// Check that a reply is in the expected class (2xx, 3xx).
fn expect_class(reply: SmtpReply, class: u16) -> Result<SmtpReply> {
    if reply.status / 100 == class {
        Ok(reply)
    } else {
        Err(AdapterError::Smtp {
            expected: class,
            status: reply.status,
            reply: reply.lines.join("; "),
        })
    }
}

/// Everything needed to send one message.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

/// Run the SMTP dialogue on an established stream.
///
/// Returns the server's final acceptance line for the message.
pub async fn deliver<S>(stream: S, envelope: &Envelope<'_>) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    expect_class(read_reply(&mut reader).await?, 2)?;

    let steps: [(String, u16); 7] = [
        (smtp_ehlo_command(EHLO_DOMAIN), 2),
        ("AUTH LOGIN\r\n".to_string(), 3),
        (smtp_base64_line(envelope.username), 3),
        (smtp_base64_line(envelope.password), 2),
        (smtp_mail_from_command(envelope.from), 2),
        (smtp_rcpt_to_command(envelope.to), 2),
        ("DATA\r\n".to_string(), 3),
    ];
    for (command, class) in steps {
        writer.write_all(command.as_bytes()).await?;
        expect_class(read_reply(&mut reader).await?, class)?;
    }

    let message = smtp_message_body(envelope.from, envelope.to, envelope.subject, envelope.body);
    writer.write_all(message.as_bytes()).await?;
    let accepted = expect_class(read_reply(&mut reader).await?, 2)?;

    // The message is accepted at this point; a failed QUIT is irrelevant.
    let _ = writer.write_all(b"QUIT\r\n").await;

    Ok(accepted.last_line().to_owned())
}

// ---------------------------------------------------------------------------
// TLS connection helpers
// ---------------------------------------------------------------------------

/// Build a rustls `ClientConfig` using Mozilla's bundled root certificates.
fn tls_client_config() -> Arc<ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Arc::new(config)
}

/// Establish a TLS connection to the given host and port.
async fn connect_tls(host: &str, port: u16) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let connector = TlsConnector::from(tls_client_config());
    let server_name = rustls::pki_types::ServerName::try_from(host.to_owned()).map_err(|e| {
        AdapterError::Tls {
            host: host.to_owned(),
            reason: format!("invalid server name: {e}"),
        }
    })?;

    let addr = format!("{host}:{port}");
    let timeout = Duration::from_secs(SMTP_TIMEOUT_SECS);

    let tcp_stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| AdapterError::Timeout {
            seconds: SMTP_TIMEOUT_SECS,
            reason: format!("TCP connection to {addr} timed out"),
        })??;

    tokio::time::timeout(timeout, connector.connect(server_name, tcp_stream))
        .await
        .map_err(|_| AdapterError::Timeout {
            seconds: SMTP_TIMEOUT_SECS,
            reason: format!("TLS handshake with {host} timed out"),
        })?
        .map_err(|e| AdapterError::Tls {
            host: host.to_owned(),
            reason: format!("handshake failed: {e}"),
        })
}

// ---------------------------------------------------------------------------
// SmtpNotifier
// ---------------------------------------------------------------------------

/// SMTP account and recipient settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; the username when unset.
    pub from: Option<String>,
    pub recipient: String,
}

/// Sends every notification to one fixed recipient.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        for (name, value) in [
            ("smtp_host", &config.host),
            ("username", &config.username),
            ("password", &config.password),
            ("recipient", &config.recipient),
        ] {
            if value.trim().is_empty() {
                return Err(AdapterError::ConfigError(format!("notify.{name} is not set")));
            }
        }
        Ok(Self { config })
    }

    pub fn recipient(&self) -> &str {
        &self.config.recipient
    }

    async fn send_mail(&self, subject: &str, body: &str) -> Result<String> {
        let config = &self.config;
        info!(host = %config.host, to = %config.recipient, subject, "sending notification");

        let stream = connect_tls(&config.host, config.port).await?;
        let envelope = Envelope {
            username: &config.username,
            password: &config.password,
            from: config.from.as_deref().unwrap_or(&config.username),
            to: &config.recipient,
            subject,
            body,
        };
        deliver(stream, &envelope).await
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> rta_kernel::Result<String> {
        self.send_mail(subject, body)
            .await
            .map_err(AdapterError::into_delivery)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[test]
    fn command_builders() {
        assert_eq!(smtp_ehlo_command("rta.local"), "EHLO rta.local\r\n");
        assert_eq!(smtp_mail_from_command("a@b.c"), "MAIL FROM:<a@b.c>\r\n");
        assert_eq!(smtp_rcpt_to_command("x@y.z"), "RCPT TO:<x@y.z>\r\n");
        assert_eq!(smtp_base64_line("user"), "dXNlcg==\r\n");
    }

    #[test]
    fn message_body_is_crlf_and_dot_stuffed() {
        let body = smtp_message_body("a@b.c", "x@y.z", "Custom Alert Triggered", "Reason: r\n\n.hidden");
        assert!(body.contains("Subject: Custom Alert Triggered\r\n"));
        assert!(body.contains("\r\n\r\nReason: r\r\n\r\n..hidden\r\n.\r\n"));
        assert!(body.ends_with("\r\n.\r\n"));
    }

    #[test]
    fn missing_settings_are_rejected() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: DEFAULT_SMTP_PORT,
            username: "bot@example.com".into(),
            password: "secret".into(),
            from: None,
            recipient: String::new(),
        };
        let err = SmtpNotifier::new(config).unwrap_err();
        assert!(err.to_string().contains("notify.recipient"));
    }

    /// Play a scripted server on the far end of a duplex pipe.
    async fn scripted_server(
        mut server: tokio::io::DuplexStream,
        replies: Vec<&'static str>,
    ) -> String {
        let mut transcript = Vec::new();
        let mut buf = vec![0u8; 4096];
        let mut replies = replies.into_iter();

        if let Some(greeting) = replies.next() {
            server.write_all(greeting.as_bytes()).await.unwrap();
        }
        for reply in replies {
            let n = server.read(&mut buf).await.unwrap();
            transcript.extend_from_slice(&buf[..n]);
            server.write_all(reply.as_bytes()).await.unwrap();
        }
        String::from_utf8(transcript).unwrap()
    }

    fn envelope() -> Envelope<'static> {
        Envelope {
            username: "bot@example.com",
            password: "secret",
            from: "bot@example.com",
            to: "ops@example.com",
            subject: "Custom Alert Triggered",
            body: "Reason: Condition met: fire_alarm == 1",
        }
    }

    #[tokio::test]
    async fn deliver_returns_acceptance_line() {
        let (client, server) = tokio::io::duplex(8192);
        let server = tokio::spawn(scripted_server(
            server,
            vec![
                "220 smtp.example.com ready\r\n",
                "250-smtp.example.com\r\n250 AUTH LOGIN\r\n",
                "334 VXNlcm5hbWU6\r\n",
                "334 UGFzc3dvcmQ6\r\n",
                "235 Authentication successful\r\n",
                "250 OK\r\n",
                "250 OK\r\n",
                "354 Go ahead\r\n",
                "250 2.0.0 OK queued as 42\r\n",
            ],
        ));

        let id = deliver(client, &envelope()).await.unwrap();
        assert_eq!(id, "250 2.0.0 OK queued as 42");

        let transcript = server.await.unwrap();
        assert!(transcript.starts_with("EHLO rta.local\r\nAUTH LOGIN\r\n"));
        assert!(transcript.contains("RCPT TO:<ops@example.com>\r\n"));
        assert!(transcript.contains("Reason: Condition met: fire_alarm == 1\r\n.\r\n"));
    }

    #[tokio::test]
    async fn deliver_fails_on_rejected_auth() {
        let (client, server) = tokio::io::duplex(8192);
        tokio::spawn(scripted_server(
            server,
            vec![
                "220 ready\r\n",
                "250 hello\r\n",
                "334 VXNlcm5hbWU6\r\n",
                "334 UGFzc3dvcmQ6\r\n",
                "535 Authentication failed\r\n",
            ],
        ));

        let err = deliver(client, &envelope()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Smtp { status: 535, expected: 2, .. }));
    }
}
