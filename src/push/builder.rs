use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{PushError, Result};
use crate::push::message::Message;
use crate::push::notification::Notification;
use crate::push::payload::{default_handlers, PayloadHandler};
use crate::push::recipient::Recipient;
use crate::push::types::PushVendor;

/// Notification Builder（通知构建器）
///
/// 职责：
/// - 按消息平台选择 Payload Handler
/// - 把消息展开为按接收者顺序排列的通知序列
/// - 分配会话内单调递增的通知 ID（从 1 开始）
pub struct NotificationBuilder {
    handlers: HashMap<PushVendor, Box<dyn PayloadHandler>>,
    next_id: u32,
}

impl NotificationBuilder {
    /// 创建不含任何 Handler 的构建器
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 1,
        }
    }

    /// 注册全部内置 Handler
    pub fn with_default_handlers() -> Self {
        let mut builder = Self::new();
        for handler in default_handlers() {
            builder.add_payload_handler(handler);
        }
        builder
    }

    /// 注册 Handler，同一平台的旧 Handler 会被替换
    pub fn add_payload_handler(&mut self, handler: Box<dyn PayloadHandler>) -> &mut Self {
        self.handlers.insert(handler.vendor(), handler);
        self
    }

    pub fn has_handler(&self, vendor: PushVendor) -> bool {
        self.handlers.contains_key(&vendor)
    }

    /// 下一个将要分配的通知 ID
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    fn allocate_id(&mut self) -> Result<u32> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| {
            PushError::Runtime("notification identifier space exhausted".to_string())
        })?;
        Ok(id)
    }

    /// 展开消息为通知序列
    ///
    /// 已标记为 `NotRegistered` 的接收者不再生成通知
    pub fn build_notifications(&mut self, message: &Message) -> Result<Vec<Notification>> {
        let vendor = message.vendor();
        let handler = self.handlers.get(&vendor).ok_or_else(|| {
            PushError::Domain(format!("No payload handler registered for {}", vendor))
        })?;

        let recipients: Vec<Arc<Recipient>> = message
            .recipients()
            .iter()
            .filter(|r| {
                let registered = r.is_registered();
                if !registered {
                    debug!(
                        "[NOTIFICATION BUILDER] Skipping unregistered recipient {}",
                        r.identifier()
                    );
                }
                registered
            })
            .cloned()
            .collect();

        // 先完成全部编码，再分配 ID，编码失败时计数器保持不变
        let mut encoded = Vec::with_capacity(recipients.len());
        if handler.per_recipient() {
            for recipient in &recipients {
                let single = message.with_recipients(std::slice::from_ref(recipient));
                let payload = Arc::new(handler.encode(&single)?);
                encoded.push((Arc::clone(recipient), payload));
            }
        } else {
            for chunk in recipients.chunks(message.max_recipients_per_request()) {
                let payload = Arc::new(handler.encode(&message.with_recipients(chunk))?);
                for recipient in chunk {
                    encoded.push((Arc::clone(recipient), Arc::clone(&payload)));
                }
            }
        }

        let expiry = message.expiration_time();
        let mut notifications = Vec::with_capacity(encoded.len());
        for (recipient, payload) in encoded {
            let id = self.allocate_id()?;
            notifications.push(Notification::new(id, vendor, recipient, payload, expiry));
        }

        debug!(
            "[NOTIFICATION BUILDER] Built {} notifications for {} message",
            notifications.len(),
            vendor
        );

        Ok(notifications)
    }
}

impl Default for NotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
