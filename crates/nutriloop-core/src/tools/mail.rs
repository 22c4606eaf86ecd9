//! Mail tool: SMTP delivery with a file outbox for offline runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{Tool, ToolError};

/// How outgoing mail leaves the process.
#[derive(Debug, Clone)]
pub enum MailBackend {
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
    /// Write each message to a file under `dir` instead of sending.
    Outbox { dir: PathBuf },
}

/// Mail delivery settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub from: String,
}

impl MailConfig {
    /// Outbox delivery into `dir`, the default for local runs.
    pub fn outbox(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: MailBackend::Outbox { dir: dir.into() },
            from: "clinic@nutriloop.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MailArgs {
    to: String,
    subject: String,
    body: String,
}

enum Delivery {
    Smtp(SmtpTransport),
    Outbox(PathBuf),
}

/// Sends consultation mail to patients and doctors.
pub struct MailTool {
    from: String,
    delivery: Delivery,
}

impl MailTool {
    pub const NAME: &'static str = "send_mail";

    pub fn new(config: MailConfig) -> Result<Self, ToolError> {
        let delivery = match config.backend {
            MailBackend::Smtp {
                host,
                port,
                username,
                password,
            } => {
                let transport = match (username, password) {
                    (Some(user), Some(pass)) => SmtpTransport::relay(&host)
                        .map_err(|e| ToolError::Mail(e.to_string()))?
                        .port(port)
                        .credentials(Credentials::new(user, pass))
                        .build(),
                    // Unauthenticated connection, e.g. a local MailDev.
                    _ => SmtpTransport::builder_dangerous(&host).port(port).build(),
                };
                Delivery::Smtp(transport)
            }
            MailBackend::Outbox { dir } => Delivery::Outbox(dir),
        };

        Ok(Self {
            from: config.from,
            delivery,
        })
    }
}

#[async_trait]
impl Tool for MailTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Send an email to a patient or the supervising doctor"
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: MailArgs =
            serde_json::from_value(args).map_err(|e| ToolError::BadArgs(e.to_string()))?;

        match &self.delivery {
            Delivery::Smtp(transport) => {
                let message = build_message(&self.from, &args)?;
                let transport = transport.clone();
                // lettre's sync transport blocks on the socket.
                tokio::task::spawn_blocking(move || transport.send(&message))
                    .await
                    .map_err(|e| ToolError::Mail(e.to_string()))?
                    .map_err(|e| ToolError::Mail(e.to_string()))?;
                info!(to = %args.to, subject = %args.subject, "mail sent via smtp");
                Ok(json!({"delivered": true, "via": "smtp", "to": args.to}))
            }
            Delivery::Outbox(dir) => {
                let path = write_outbox(dir, &self.from, &args)?;
                info!(to = %args.to, path = %path.display(), "mail written to outbox");
                Ok(json!({
                    "delivered": true,
                    "via": "outbox",
                    "to": args.to,
                    "path": path.display().to_string(),
                }))
            }
        }
    }
}

fn build_message(from: &str, args: &MailArgs) -> Result<Message, ToolError> {
    Message::builder()
        .from(from.parse().map_err(|e| {
            ToolError::BadArgs(format!("invalid from address '{from}': {e}"))
        })?)
        .to(args.to.parse().map_err(|e| {
            ToolError::BadArgs(format!("invalid to address '{}': {e}", args.to))
        })?)
        .subject(args.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(args.body.clone())
        .map_err(|e| ToolError::Mail(e.to_string()))
}

static OUTBOX_SEQ: AtomicU64 = AtomicU64::new(0);

fn write_outbox(dir: &Path, from: &str, args: &MailArgs) -> Result<PathBuf, ToolError> {
    std::fs::create_dir_all(dir)?;
    let seq = OUTBOX_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-{seq}.eml", Utc::now().format("%Y%m%dT%H%M%S%3f"));
    let path = dir.join(name);
    let contents = format!(
        "From: {from}\nTo: {}\nSubject: {}\n\n{}\n",
        args.to, args.subject, args.body
    );
    std::fs::write(&path, contents)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
