//! Operator notifications.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
  async fn notify(&self, subject: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
  async fn notify(&self, subject: &str, message: &str) -> Result<()> {
    warn!(subject, message, "notification");
    Ok(())
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload<'a> {
  pub channel_alias: &'a str,
  pub subject: &'a str,
  pub message: &'a str,
}

/// Posts notifications as JSON to a webhook endpoint.
pub struct WebhookNotifier {
  url: String,
  channel_alias: String,
  client: reqwest::Client,
}

impl WebhookNotifier {
  #[must_use]
  pub fn new(
    url: impl Into<String>,
    channel_alias: impl Into<String>,
  ) -> WebhookNotifier {
    WebhookNotifier {
      url: url.into(),
      channel_alias: channel_alias.into(),
      client: reqwest::Client::new(),
    }
  }

  #[must_use]
  pub fn payload<'a>(
    &'a self,
    subject: &'a str,
    message: &'a str,
  ) -> NotificationPayload<'a> {
    NotificationPayload {
      channel_alias: &self.channel_alias,
      subject,
      message,
    }
  }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
  async fn notify(&self, subject: &str, message: &str) -> Result<()> {
    let resp = self
      .client
      .post(&self.url)
      .json(&self.payload(subject, message))
      .send()
      .await
      .context("notification request failed")?;
    if !resp.status().is_success() {
      bail!("notification returned HTTP {}", resp.status());
    }
    info!(subject, "notification sent");
    Ok(())
  }
}

/// Sends a notification, logging instead of failing when delivery fails.
pub async fn notify_best_effort(
  notifier: &dyn Notifier,
  subject: &str,
  message: &str,
) {
  if let Err(e) = notifier.notify(subject, message).await {
    warn!(subject, error = %e, "notification delivery failed");
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use serde_json::json;

  use super::*;

  #[derive(Default)]
  struct Failing {
    attempts: AtomicU32,
  }

  #[async_trait::async_trait]
  impl Notifier for Failing {
    async fn notify(&self, _subject: &str, _message: &str) -> Result<()> {
      self.attempts.fetch_add(1, Ordering::SeqCst);
      bail!("unreachable endpoint")
    }
  }

  #[test]
  fn webhook_payload_shape() -> Result<()> {
    let notifier = WebhookNotifier::new("http://localhost", "Ops Channel");
    let value = serde_json::to_value(notifier.payload("Low balance", "kCUR"))?;
    assert_eq!(
      value,
      json!({
        "channelAlias": "Ops Channel",
        "subject": "Low balance",
        "message": "kCUR",
      })
    );
    Ok(())
  }

  #[tokio::test]
  async fn best_effort_swallows_failures() -> Result<()> {
    let notifier = Failing::default();
    notify_best_effort(&notifier, "subject", "message").await;
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
    LogNotifier.notify("subject", "message").await?;
    Ok(())
  }
}
