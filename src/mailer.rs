use std::sync::Arc;

use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use crate::{config::SmtpConfig, notifications::fanout::MailSender};

struct Smtp {
    transport: SmtpTransport,
    from: Mailbox,
}

/// Best-effort mail dispatcher. When SMTP is unconfigured every send is a
/// silent no-op; when configured, the actual transport call runs on a
/// detached thread so a slow relay can never hold up an HTTP response.
#[derive(Clone)]
pub struct Mailer {
    smtp: Option<Arc<Smtp>>,
}

impl Mailer {
    pub fn disabled() -> Self {
        Mailer { smtp: None }
    }

    pub fn from_config(config: Option<&SmtpConfig>) -> anyhow::Result<Self> {
        let config = match config {
            Some(config) => config,
            None => return Ok(Mailer::disabled()),
        };

        let mut builder = SmtpTransport::relay(&config.host)
            .context("SMTP relay setup")?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let from = config
            .from
            .parse::<Mailbox>()
            .context("SMTP_FROM is not a valid mailbox")?;

        Ok(Mailer {
            smtp: Some(Arc::new(Smtp {
                transport: builder.build(),
                from,
            })),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.smtp.is_some()
    }

    /// Fire-and-forget delivery. Malformed addresses and transport failures
    /// are logged and swallowed.
    pub fn dispatch(&self, to: &str, subject: &str, body: &str) {
        let smtp = match &self.smtp {
            Some(smtp) => Arc::clone(smtp),
            None => {
                log::debug!("mail disabled, skipping \"{}\" to {}", subject, to);
                return;
            }
        };

        let to = match to.parse::<Mailbox>() {
            Ok(mailbox) => mailbox,
            Err(err) => {
                log::warn!("skipping mail to invalid address {}: {}", to, err);
                return;
            }
        };
        let subject = subject.to_string();
        let body = body.to_string();

        std::thread::spawn(move || {
            let message = Message::builder()
                .from(smtp.from.clone())
                .to(to.clone())
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body);
            match message {
                Ok(message) => {
                    if let Err(err) = smtp.transport.send(&message) {
                        log::warn!("mail delivery to {} failed: {}", to, err);
                    }
                }
                Err(err) => log::warn!("could not build mail to {}: {}", to, err),
            }
        });
    }
}

impl MailSender for Mailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.dispatch(to, subject, body);
        Ok(())
    }
}
