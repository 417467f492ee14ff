use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::push::payload::EncodedPayload;
use crate::push::recipient::Recipient;
use crate::push::types::PushVendor;

/// 通知：绑定到单个接收者的已编码 payload，是传输层实际发送的单位
///
/// `id` 在一次投递会话内单调递增且唯一，二进制网关用它作为帧标识
#[derive(Debug, Clone)]
pub struct Notification {
    id: u32,
    vendor: PushVendor,
    recipient: Arc<Recipient>,
    payload: Arc<EncodedPayload>,
    expiry: Option<DateTime<Utc>>,
}

impl Notification {
    pub(crate) fn new(
        id: u32,
        vendor: PushVendor,
        recipient: Arc<Recipient>,
        payload: Arc<EncodedPayload>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            vendor,
            recipient,
            payload,
            expiry,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn vendor(&self) -> PushVendor {
        self.vendor
    }

    pub fn recipient(&self) -> &Arc<Recipient> {
        &self.recipient
    }

    pub fn payload(&self) -> &Arc<EncodedPayload> {
        &self.payload
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// 是否与另一条通知共用同一份 payload（同一个 GCM 请求）
    pub fn shares_payload_with(&self, other: &Notification) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}
