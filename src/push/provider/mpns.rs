use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PushError, Result};
use crate::push::notification::Notification;
use crate::push::payload::EncodedPayload;
use crate::push::provider::provider_trait::PushProvider;
use crate::push::report::{DispatchReport, FailedNotification};
use crate::push::types::{PushVendor, RecipientStatus};

/// 单个 MPNS 请求的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpnsOutcome {
    Delivered,
    NotRegistered(String),
    Failed(String),
}

/// MPNS Provider
///
/// 每个接收者一个请求，发往设备的 channel URI（接收者令牌的 base64 解码结果）
pub struct MpnsProvider {
    client: Client,
}

impl MpnsProvider {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    async fn send_one(&self, notification: &Notification) -> Result<MpnsOutcome> {
        let channel_uri = channel_uri(notification.recipient().identifier())?;
        let (target, notification_class) = match &**notification.payload() {
            EncodedPayload::Xml {
                target,
                notification_class,
                ..
            } => (*target, *notification_class),
            EncodedPayload::Json(_) => {
                return Err(PushError::Domain(format!(
                    "MPNS cannot deliver a JSON payload (notification {})",
                    notification.id()
                )))
            }
        };

        debug!(
            "[MPNS] Sending notification {} to {}",
            notification.id(),
            channel_uri
        );

        let mut request = self
            .client
            .post(&channel_uri)
            .header("Content-Type", notification.payload().content_type())
            .header("X-NotificationClass", notification_class.to_string())
            .header("X-MessageID", Uuid::new_v4().to_string());
        if let Some(target) = target {
            request = request.header("X-WindowsPhone-Target", target);
        }

        let response = request.body(notification.payload().to_bytes()?).send().await?;
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(classify_response(
            response.status().as_u16(),
            header("X-NotificationStatus").as_deref(),
            header("X-SubscriptionStatus").as_deref(),
        ))
    }
}

#[async_trait]
impl PushProvider for MpnsProvider {
    async fn send(&self, notifications: &[Notification]) -> Result<DispatchReport> {
        let mut report =
            DispatchReport::new(Uuid::new_v4().to_string(), PushVendor::Mpns, notifications.len());

        for notification in notifications {
            let recipient = notification.recipient();
            // 单个 channel 不可达不影响其余接收者
            let outcome = match self.send_one(notification).await {
                Ok(outcome) => outcome,
                Err(PushError::Http(reason)) => MpnsOutcome::Failed(reason),
                Err(e) => return Err(e),
            };
            match outcome {
                MpnsOutcome::Delivered => {
                    recipient.set_status(RecipientStatus::DeliveredUnconfirmed);
                    report.delivered += 1;
                }
                MpnsOutcome::NotRegistered(reason) => {
                    warn!("[MPNS] Recipient {} rejected: {}", recipient.identifier(), reason);
                    recipient.mark_not_registered();
                    report.invalid_recipients.push(recipient.identifier().to_string());
                }
                MpnsOutcome::Failed(reason) => {
                    warn!("[MPNS] Notification {} failed: {}", notification.id(), reason);
                    report.failed.push(FailedNotification {
                        id: notification.id(),
                        token: recipient.identifier().to_string(),
                        status: None,
                        description: reason,
                    });
                }
            }
        }

        info!(
            "[MPNS] Sent {} notifications: delivered={}, invalid_recipients={}, failed={}",
            report.total,
            report.delivered,
            report.invalid_recipients.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn vendor(&self) -> PushVendor {
        PushVendor::Mpns
    }
}

/// 接收者令牌是 base64 编码的 channel URI
pub fn channel_uri(identifier: &str) -> Result<String> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(identifier)
        .map_err(|e| {
            PushError::InvalidArgument(format!("Invalid MPNS token '{}': {}", identifier, e))
        })?;
    String::from_utf8(decoded).map_err(|e| {
        PushError::InvalidArgument(format!(
            "MPNS token '{}' is not a UTF-8 channel URI: {}",
            identifier, e
        ))
    })
}

/// 按 HTTP 状态码和 MPNS 响应头判断结果
pub fn classify_response(
    status: u16,
    notification_status: Option<&str>,
    subscription_status: Option<&str>,
) -> MpnsOutcome {
    if subscription_status == Some("Expired") {
        return MpnsOutcome::NotRegistered("Subscription expired".to_string());
    }
    match status {
        404 => MpnsOutcome::NotRegistered("Channel not found".to_string()),
        412 => MpnsOutcome::NotRegistered("Device inactive".to_string()),
        200 if notification_status == Some("Received") => MpnsOutcome::Delivered,
        200 => MpnsOutcome::Failed(format!(
            "Notification {}",
            notification_status.unwrap_or("not received")
        )),
        other => MpnsOutcome::Failed(format!("HTTP {}", other)),
    }
}
