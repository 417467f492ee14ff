use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PushError, Result};
use crate::push::notification::Notification;
use crate::push::provider::provider_trait::PushProvider;
use crate::push::report::{DispatchReport, FailedNotification};
use crate::push::types::{PushVendor, RecipientStatus};

/// GCM HTTP 接口地址
pub const GCM_ENDPOINT: &str = "https://gcm-http.googleapis.com/gcm/send";

/// GCM 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct GcmResponse {
    #[serde(default)]
    pub multicast_id: Option<i64>,
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failure: u32,
    #[serde(default)]
    pub canonical_ids: u32,
    /// 与请求中 `registration_ids` 一一对应
    #[serde(default)]
    pub results: Vec<GcmResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcmResult {
    pub message_id: Option<String>,
    /// 平台给出的新注册 ID
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

/// GCM Provider
///
/// 使用旧版 HTTP 接口（`Authorization: key=<api_key>`），一次请求最多 1000 个接收者
pub struct GcmProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GcmProvider {
    /// 创建新的 GCM Provider
    ///
    /// # 参数
    /// - endpoint: 接口地址，通常为 [`GCM_ENDPOINT`]
    /// - api_key: 服务端 API Key
    /// - request_timeout: 单个请求的超时
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    async fn send_request(&self, batch: &[Notification], report: &mut DispatchReport) -> Result<()> {
        let Some(first) = batch.first() else {
            return Ok(());
        };
        let body = first.payload().to_bytes()?;

        info!(
            "[GCM] Sending request: recipients={}, first_id={}",
            batch.len(),
            first.id()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.api_key))
            .header("Content-Type", first.payload().content_type())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let parsed: GcmResponse = response.json().await?;
            debug!(
                "[GCM] Response: multicast_id={:?}, success={}, failure={}, canonical_ids={}",
                parsed.multicast_id, parsed.success, parsed.failure, parsed.canonical_ids
            );
            apply_response(batch, &parsed, report)
        } else if status.is_server_error() {
            // 平台暂时不可用，整批记为失败，由调用方决定是否重试
            warn!("[GCM] Service unavailable: status={}", status);
            for notification in batch {
                report.failed.push(FailedNotification {
                    id: notification.id(),
                    token: notification.recipient().identifier().to_string(),
                    status: None,
                    description: format!("HTTP {}", status),
                });
            }
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("[GCM] Request rejected: status={}, error={}", status, error_text);
            Err(PushError::Http(format!(
                "GCM request rejected: status={}, error={}",
                status, error_text
            )))
        }
    }
}

#[async_trait]
impl PushProvider for GcmProvider {
    async fn send(&self, notifications: &[Notification]) -> Result<DispatchReport> {
        let mut report =
            DispatchReport::new(Uuid::new_v4().to_string(), PushVendor::Gcm, notifications.len());
        for batch in requests(notifications) {
            self.send_request(batch, &mut report).await?;
        }
        Ok(report)
    }

    fn vendor(&self) -> PushVendor {
        PushVendor::Gcm
    }
}

/// 按共用的 payload 把通知切分为请求
fn requests(notifications: &[Notification]) -> Vec<&[Notification]> {
    let mut batches = Vec::new();
    let mut start = 0;
    for end in 1..=notifications.len() {
        if end == notifications.len() || !notifications[end].shares_payload_with(&notifications[start])
        {
            batches.push(&notifications[start..end]);
            start = end;
        }
    }
    batches
}

/// 把响应结果对应回接收者
pub fn apply_response(
    batch: &[Notification],
    response: &GcmResponse,
    report: &mut DispatchReport,
) -> Result<()> {
    if response.results.len() != batch.len() {
        return Err(PushError::Http(format!(
            "GCM returned {} results for {} recipients",
            response.results.len(),
            batch.len()
        )));
    }

    for (notification, result) in batch.iter().zip(&response.results) {
        let recipient = notification.recipient();
        match (&result.message_id, result.error.as_deref()) {
            (Some(message_id), _) => {
                recipient.set_status(RecipientStatus::DeliveredUnconfirmed);
                report.delivered += 1;
                debug!("[GCM] Delivered {}: message_id={}", recipient.identifier(), message_id);
                if let Some(canonical) = &result.registration_id {
                    info!(
                        "[GCM] Recipient {} has canonical registration id {}",
                        recipient.identifier(),
                        canonical
                    );
                }
            }
            (None, Some(error @ ("NotRegistered" | "InvalidRegistration"))) => {
                warn!("[GCM] Recipient {} rejected: {}", recipient.identifier(), error);
                recipient.mark_not_registered();
                report.invalid_recipients.push(recipient.identifier().to_string());
            }
            (None, error) => {
                let description = error.unwrap_or("Missing message_id").to_string();
                warn!("[GCM] Notification {} failed: {}", notification.id(), description);
                report.failed.push(FailedNotification {
                    id: notification.id(),
                    token: recipient.identifier().to_string(),
                    status: None,
                    description,
                });
            }
        }
    }

    Ok(())
}
