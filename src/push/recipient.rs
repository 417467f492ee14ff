use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{PushError, Result};
use crate::push::types::{PushVendor, RecipientStatus};

/// APNs 设备令牌长度（hex 字符数）
pub const APNS_TOKEN_HEX_LENGTH: usize = 64;

/// 接收设备
///
/// 身份由 `identifier` 决定；投递状态是唯一可变的部分，
/// 在消息和通知之间通过 `Arc<Recipient>` 共享
pub struct Recipient {
    identifier: String,
    status: AtomicU8,
}

impl Recipient {
    /// 校验令牌后创建接收者
    pub fn new(vendor: PushVendor, identifier: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        if !validate(vendor, &identifier) {
            return Err(PushError::InvalidArgument(format!(
                "Invalid recipient token '{}' for provider {}",
                identifier, vendor
            )));
        }
        Ok(Self {
            identifier,
            status: AtomicU8::new(RecipientStatus::Unknown as u8),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn status(&self) -> RecipientStatus {
        RecipientStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// 更新投递状态，`NotRegistered` 为终态
    pub fn set_status(&self, status: RecipientStatus) {
        let _ = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == RecipientStatus::NotRegistered as u8 {
                    None
                } else {
                    Some(status as u8)
                }
            });
    }

    pub fn mark_not_registered(&self) {
        self.set_status(RecipientStatus::NotRegistered);
    }

    pub fn is_registered(&self) -> bool {
        self.status() != RecipientStatus::NotRegistered
    }
}

impl PartialEq for Recipient {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Recipient {}

impl fmt::Debug for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipient")
            .field("identifier", &self.identifier)
            .field("status", &self.status())
            .finish()
    }
}

/// 按推送平台校验设备令牌
///
/// - APNs：64 位 hex 字符串
/// - GCM：非空，仅包含 `[A-Za-z0-9_\-:.]`
/// - MPNS：合法的 base64 编码
pub fn validate(vendor: PushVendor, identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }
    match vendor {
        PushVendor::Apns => {
            identifier.len() == APNS_TOKEN_HEX_LENGTH && hex::decode(identifier).is_ok()
        }
        PushVendor::Gcm => identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b':' | b'.')),
        PushVendor::Mpns => STANDARD.decode(identifier).is_ok(),
    }
}
