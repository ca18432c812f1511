use async_trait::async_trait;
use chrono::Duration;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Mail sink: one-shot delivery of a verification code to an address.
/// Invoked only after the code row is committed; a delivery failure does
/// not invalidate the stored code.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// SMTP delivery over an async relay transport (STARTTLS, optional PLAIN
/// credentials).
pub struct SmtpMailer {
    from: Mailbox,
    code_ttl: Duration,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        pass: &str,
        from: &str,
        code_ttl: Duration,
    ) -> anyhow::Result<Self> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| anyhow::anyhow!("invalid SMTP from address '{from}': {e}"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow::anyhow!("failed to create SMTP transport: {e}"))?
            .port(port);
        if !user.is_empty() {
            builder = builder.credentials(Credentials::new(user.to_owned(), pass.to_owned()));
        }

        Ok(Self {
            from,
            code_ttl,
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        let to = email
            .parse::<Mailbox>()
            .map_err(|e| anyhow::anyhow!("invalid recipient address: {e}"))?;

        let body = format!(
            "Your TimeSync code is {code}. It expires in {} minutes.",
            self.code_ttl.num_minutes()
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Your TimeSync verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        tracing::info!(%email, "verification code delivered");
        Ok(())
    }
}

/// Fallback sink used when SMTP is not configured: writes the code to the
/// log instead of delivering it. Development only.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(%email, %code, "verification code (mail transport disabled)");
        Ok(())
    }
}
