// src/services/email.rs
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::config::{Credentials, Region};
use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::common::config::EmailConfig;
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email delivery not configured")]
    NotConfigured,

    #[error("SES operation failed: {0}")]
    SESError(String),
}

/// Outbound notifications triggered by account events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_welcome(&self, email: &str, name: &str) -> Result<(), EmailError>;
}

pub fn generate_welcome_email(app_name: &str, client_url: &str, username: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #334155; background-color: #f8fafc; }}
        .container {{ max-width: 600px; margin: 0 auto; background-color: #ffffff; border: 1px solid #e2e8f0; border-radius: 10px; }}
        .header {{ padding: 28px 40px; border-bottom: 1px solid #f1f5f9; }}
        .content {{ padding: 40px; }}
        .button {{ display: inline-block; padding: 12px 26px; background-color: #0f172a; color: white; text-decoration: none; border-radius: 6px; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #94a3b8; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>{app}</h1>
        </div>
        <div class="content">
            <p>Dear {user},</p>

            <p>Welcome to <strong>{app}</strong>. Your account is ready and you can sign in any time with the provider you just used.</p>

            <a href="{url}" class="button">Go to Dashboard</a>
        </div>
        <div class="footer">
            <p>&copy; {year} {app}. All rights reserved.</p>
        </div>
    </div>
</body>
</html>"#,
        app = html_escape(app_name),
        user = html_escape(username),
        url = html_escape(client_url),
        year = Utc::now().year(),
    )
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Sends mail through AWS SES v2.
pub struct SesNotifier {
    config: EmailConfig,
    client_url: String,
}

impl SesNotifier {
    pub fn new(config: EmailConfig, client_url: String) -> Self {
        Self { config, client_url }
    }

    pub fn is_configured(&self) -> bool {
        self.config.access_key_id.is_some()
            && self.config.secret_access_key.is_some()
            && self.config.from_address.is_some()
    }

    async fn client(&self) -> Result<(SesClient, String), EmailError> {
        let (Some(key_id), Some(secret), Some(from)) = (
            self.config.access_key_id.as_deref(),
            self.config.secret_access_key.as_deref(),
            self.config.from_address.clone(),
        ) else {
            return Err(EmailError::NotConfigured);
        };

        let credentials = Credentials::new(key_id, secret, None, None, "environment");

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok((SesClient::new(&aws_config), from))
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send_welcome(&self, email: &str, name: &str) -> Result<(), EmailError> {
        if email.ends_with(".placeholder") {
            debug!(
                email = %safe_email_log(email),
                "Skipping welcome email for placeholder address"
            );
            return Ok(());
        }

        let (client, from) = self.client().await?;

        let subject = Content::builder()
            .data(format!("Welcome to {}", self.config.app_name))
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SESError(format!("Failed to build subject: {}", e)))?;

        let html = generate_welcome_email(&self.config.app_name, &self.client_url, name);
        let body = Content::builder()
            .data(html)
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SESError(format!("Failed to build body: {}", e)))?;

        let message = Message::builder()
            .subject(subject)
            .body(SesBody::builder().html(body).build())
            .build();

        let result = client
            .send_email()
            .from_email_address(format!("\"{} Team\" <{}>", self.config.app_name, from))
            .destination(Destination::builder().to_addresses(email).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(email), "Failed to send email via SES");
                EmailError::SESError(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(email),
            message_id = ?result.message_id(),
            "Welcome email sent via SES"
        );

        Ok(())
    }
}
