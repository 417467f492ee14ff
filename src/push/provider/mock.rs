use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::push::notification::Notification;
use crate::push::provider::provider_trait::PushProvider;
use crate::push::report::DispatchReport;
use crate::push::types::{PushVendor, RecipientStatus};

/// Mock Provider（用于测试和本地调试）
///
/// 不调用真实 API，只打印日志并记录收到的通知 ID
pub struct MockProvider {
    vendor: PushVendor,
    sent: Mutex<Vec<u32>>,
}

impl MockProvider {
    pub fn new(vendor: PushVendor) -> Self {
        Self {
            vendor,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// 已发送的通知 ID
    pub fn sent(&self) -> Vec<u32> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PushProvider for MockProvider {
    async fn send(&self, notifications: &[Notification]) -> Result<DispatchReport> {
        let mut report =
            DispatchReport::new(Uuid::new_v4().to_string(), self.vendor, notifications.len());

        for notification in notifications {
            let body = notification.payload().to_bytes()?;
            info!(
                "[MOCK PUSH] Sending push: id={}, vendor={}, recipient={}, content_type={}, bytes={}",
                notification.id(),
                self.vendor,
                notification.recipient().identifier(),
                notification.payload().content_type(),
                body.len()
            );
            notification
                .recipient()
                .set_status(RecipientStatus::DeliveredUnconfirmed);
            self.sent.lock().push(notification.id());
            report.delivered += 1;
        }

        Ok(report)
    }

    fn vendor(&self) -> PushVendor {
        self.vendor
    }
}
