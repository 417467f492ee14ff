//! Payload Handler：把 `Message` 编码为各平台原生的 payload。
//!
//! 编码是纯函数：同样的消息总是得到逐字节相同的结果，且不修改消息。

pub mod apns;
pub mod gcm;
pub mod mpns;
pub mod xml;

use serde_json::Value;

use crate::error::{PushError, Result};
use crate::push::message::Message;
use crate::push::types::PushVendor;

pub use apns::ApnsPayloadHandler;
pub use gcm::GcmPayloadHandler;
pub use mpns::MpnsPayloadHandler;
pub use xml::{XmlDocument, XmlElement};

/// 编码后的 payload
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedPayload {
    /// APNs / GCM 的 JSON 结构
    Json(Value),
    /// MPNS 的 XML 文档，附带投递所需的头信息
    Xml {
        document: XmlDocument,
        target: Option<&'static str>,
        notification_class: u8,
    },
}

impl EncodedPayload {
    /// 序列化为线上字节
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            EncodedPayload::Json(value) => Ok(serde_json::to_vec(value)?),
            EncodedPayload::Xml { document, .. } => document.to_bytes(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            EncodedPayload::Json(_) => "application/json",
            EncodedPayload::Xml { .. } => "text/xml; charset=utf-8",
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            EncodedPayload::Json(value) => Some(value),
            EncodedPayload::Xml { .. } => None,
        }
    }
}

/// Payload Handler 接口（每个推送平台一个实现）
pub trait PayloadHandler: Send + Sync {
    /// 处理的推送平台
    fn vendor(&self) -> PushVendor;

    /// payload 是否需要按接收者逐个编码（二进制网关把令牌嵌入每条通知）
    fn per_recipient(&self) -> bool {
        false
    }

    /// 编码消息
    fn encode(&self, message: &Message) -> Result<EncodedPayload>;
}

/// 所有内置 Handler
pub fn default_handlers() -> Vec<Box<dyn PayloadHandler>> {
    vec![
        Box::new(ApnsPayloadHandler),
        Box::new(GcmPayloadHandler),
        Box::new(MpnsPayloadHandler),
    ]
}

fn unsupported(handler: PushVendor, message: &Message) -> PushError {
    PushError::Domain(format!(
        "{} payload handler cannot encode {} message",
        handler,
        message.vendor()
    ))
}

/// 超过平台上限的 payload 视为编码错误，不做截断
fn check_size(vendor: PushVendor, payload: &EncodedPayload) -> Result<()> {
    let size = payload.to_bytes()?.len();
    let max = vendor.max_payload_size();
    if size > max {
        return Err(PushError::InvalidArgument(format!(
            "{} payload is {} bytes, exceeds maximum of {} bytes",
            vendor, size, max
        )));
    }
    Ok(())
}
