//! System email service for account invitations and password resets.
//!
//! Uses the SMTP settings from the main config file; when SMTP is not
//! configured, sending degrades to a logged warning so provisioning and
//! reset flows still complete.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Service for sending system emails
pub struct SystemEmailService {
    config: EmailConfig,
}

impl SystemEmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send an invitation to a newly provisioned account. The setup link
    /// carries a password-setup token; the account is unusable until the
    /// invitee sets a password.
    pub async fn send_invitation_email(
        &self,
        to_email: &str,
        full_name: &str,
        role: &str,
        setup_url: &str,
        expires_in_hours: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping invitation email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = "Your DTR Tracker account".to_string();
        let text_body = format!(
            "Hello {full_name},\n\n\
             An account has been created for you on the school DTR tracker \
             with the role {role}.\n\n\
             Set your password to activate it:\n{setup_url}\n\n\
             This link expires in {expires_in_hours} hours.\n"
        );
        let html_body = format!(
            "<p>Hello {full_name},</p>\
             <p>An account has been created for you on the school DTR tracker \
             with the role <b>{role}</b>.</p>\
             <p><a href=\"{setup_url}\">Set your password</a> to activate it. \
             The link expires in {expires_in_hours} hours.</p>"
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send a password-reset link.
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_url: &str,
        expires_in_hours: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping password reset email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = "Reset your DTR Tracker password".to_string();
        let text_body = format!(
            "A password reset was requested for this address.\n\n\
             Reset your password here:\n{reset_url}\n\n\
             The link expires in {expires_in_hours} hours. If you did not \
             request this, you can ignore this email.\n"
        );
        let html_body = format!(
            "<p>A password reset was requested for this address.</p>\
             <p><a href=\"{reset_url}\">Reset your password</a>. \
             The link expires in {expires_in_hours} hours.</p>\
             <p>If you did not request this, you can ignore this email.</p>"
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
            .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");

        Ok(())
    }
}
