use serde::{Deserialize, Serialize};
use std::fmt;

/// 推送平台
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PushVendor {
    /// Apple Push Notification service（二进制网关）
    Apns,
    /// Google Cloud Messaging（HTTP/JSON）
    Gcm,
    /// Microsoft Push Notification Service（HTTP/XML）
    Mpns,
}

impl PushVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushVendor::Apns => "apns",
            PushVendor::Gcm => "gcm",
            PushVendor::Mpns => "mpns",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "apns" => Some(PushVendor::Apns),
            "gcm" => Some(PushVendor::Gcm),
            "mpns" => Some(PushVendor::Mpns),
            _ => None,
        }
    }

    /// 单条 payload 的最大字节数
    pub fn max_payload_size(&self) -> usize {
        match self {
            PushVendor::Apns => 2048,
            PushVendor::Gcm => 4096,
            PushVendor::Mpns => 3072,
        }
    }

    /// 是否使用二进制长连接传输（需要发送窗口与重发）
    pub fn is_binary_transport(&self) -> bool {
        matches!(self, PushVendor::Apns)
    }
}

impl fmt::Display for PushVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 接收者投递状态
///
/// 只由响应处理修改；一旦变为 `NotRegistered` 就不会再被重置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[repr(u8)]
pub enum RecipientStatus {
    Unknown = 0,
    DeliveredUnconfirmed = 1,
    NotRegistered = 2,
}

impl RecipientStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RecipientStatus::DeliveredUnconfirmed,
            2 => RecipientStatus::NotRegistered,
            _ => RecipientStatus::Unknown,
        }
    }
}
