//! APNs 二进制网关帧编解码。
//!
//! 通知帧（enhanced 格式）：
//! `command(1) | identifier(4) | expiry(4) | token_len(2) | token | payload_len(2) | payload`
//!
//! 错误响应帧固定 6 字节：`command(1) | status(1) | identifier(4)`，多字节字段均为大端序。

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PushError, Result};
use crate::push::notification::Notification;
use crate::push::recipient::Recipient;
use crate::push::types::PushVendor;

/// enhanced 通知帧命令字
pub const ENHANCED_NOTIFICATION_COMMAND: u8 = 1;

/// 错误响应帧命令字
pub const ERROR_RESPONSE_COMMAND: u8 = 8;

/// 错误响应帧长度
pub const ERROR_RESPONSE_LENGTH: usize = 6;

/// 通知帧在令牌之前的固定头长度
const NOTIFICATION_HEADER_SIZE: usize = 1 + 4 + 4 + 2;

/// 错误响应状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorStatus {
    NoError = 0,
    ProcessingError = 1,
    MissingDeviceToken = 2,
    MissingTopic = 3,
    MissingPayload = 4,
    InvalidTokenSize = 5,
    InvalidTopicSize = 6,
    InvalidPayloadSize = 7,
    InvalidToken = 8,
    Shutdown = 10,
    Unknown = 255,
}

impl ErrorStatus {
    /// 状态码表之外的值返回 None
    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::ProcessingError,
            2 => ErrorStatus::MissingDeviceToken,
            3 => ErrorStatus::MissingTopic,
            4 => ErrorStatus::MissingPayload,
            5 => ErrorStatus::InvalidTokenSize,
            6 => ErrorStatus::InvalidTopicSize,
            7 => ErrorStatus::InvalidPayloadSize,
            8 => ErrorStatus::InvalidToken,
            10 => ErrorStatus::Shutdown,
            255 => ErrorStatus::Unknown,
            _ => return None,
        };
        Some(status)
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorStatus::NoError => "No errors encountered",
            ErrorStatus::ProcessingError => "Processing error",
            ErrorStatus::MissingDeviceToken => "Missing device token",
            ErrorStatus::MissingTopic => "Missing topic",
            ErrorStatus::MissingPayload => "Missing payload",
            ErrorStatus::InvalidTokenSize => "Invalid token size",
            ErrorStatus::InvalidTopicSize => "Invalid topic size",
            ErrorStatus::InvalidPayloadSize => "Invalid payload size",
            ErrorStatus::InvalidToken => "Invalid token",
            ErrorStatus::Shutdown => "Shutdown",
            ErrorStatus::Unknown => "None (unknown)",
        }
    }

    /// 只影响单个接收者的错误（令牌无效），其余错误作用于整个会话
    pub fn is_recipient_scoped(&self) -> bool {
        matches!(self, ErrorStatus::InvalidTokenSize | ErrorStatus::InvalidToken)
    }
}

/// 解码后的错误响应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    pub command: u8,
    pub status: ErrorStatus,
    pub identifier: u32,
}

impl ErrorResponse {
    pub fn description(&self) -> &'static str {
        self.status.description()
    }

    /// 把错误响应转换为错误信号
    ///
    /// - 无错误：`Ok(())`
    /// - 令牌类错误：把 `identifier` 对应的接收者标记为 `NotRegistered`，返回 `InvalidRecipient`
    /// - 其他错误：返回 `DispatchMessage`
    ///
    /// `lookup` 负责按通知 ID 找到接收者；令牌类错误找不到对应接收者时
    /// 无法归因到单个设备，按会话级错误处理
    pub fn check<F>(&self, lookup: F) -> Result<()>
    where
        F: FnOnce(u32) -> Option<Arc<Recipient>>,
    {
        if self.status == ErrorStatus::NoError {
            return Ok(());
        }

        if self.status.is_recipient_scoped() {
            if let Some(recipient) = lookup(self.identifier) {
                recipient.mark_not_registered();
                return Err(PushError::InvalidRecipient {
                    token: recipient.identifier().to_string(),
                    description: self.description().to_string(),
                });
            }
        }

        Err(PushError::DispatchMessage {
            status: self.status.code(),
            description: self.description().to_string(),
        })
    }
}

/// 解码错误响应帧
///
/// 长度不对、命令字不对或状态码不在表中都视为传输损坏
pub fn decode_error_response(frame: &[u8]) -> Result<ErrorResponse> {
    if frame.len() != ERROR_RESPONSE_LENGTH {
        return Err(PushError::Runtime(format!(
            "Unable to unpack response data: expected {} bytes, got {}",
            ERROR_RESPONSE_LENGTH,
            frame.len()
        )));
    }

    let mut buf = frame;
    let command = buf.get_u8();
    let code = buf.get_u8();
    let identifier = buf.get_u32();

    if command != ERROR_RESPONSE_COMMAND {
        return Err(PushError::Runtime(format!(
            "Invalid APNS response packet command: {}",
            command
        )));
    }

    let status = ErrorStatus::from_code(code).ok_or_else(|| {
        PushError::Runtime(format!("Unknown APNS response status code: {}", code))
    })?;

    Ok(ErrorResponse {
        command,
        status,
        identifier,
    })
}

/// 解码并处理错误响应帧
pub fn process_error_response<F>(frame: &[u8], lookup: F) -> Result<ErrorResponse>
where
    F: FnOnce(u32) -> Option<Arc<Recipient>>,
{
    let response = decode_error_response(frame)?;
    response.check(lookup)?;
    Ok(response)
}

/// 编码错误响应帧（测试服务端使用）
pub fn encode_error_response(status: ErrorStatus, identifier: u32) -> [u8; ERROR_RESPONSE_LENGTH] {
    let mut frame = [0u8; ERROR_RESPONSE_LENGTH];
    frame[0] = ERROR_RESPONSE_COMMAND;
    frame[1] = status.code();
    frame[2..].copy_from_slice(&identifier.to_be_bytes());
    frame
}

/// 编码通知帧
///
/// payload 超过平台上限时报错，不做截断
pub fn encode_notification(notification: &Notification) -> Result<Bytes> {
    if notification.vendor() != PushVendor::Apns {
        return Err(PushError::Domain(format!(
            "Binary frame codec cannot encode {} notification",
            notification.vendor()
        )));
    }

    let token = hex::decode(notification.recipient().identifier()).map_err(|e| {
        PushError::InvalidArgument(format!(
            "Invalid recipient token '{}': {}",
            notification.recipient().identifier(),
            e
        ))
    })?;
    let payload = notification.payload().to_bytes()?;

    let max = PushVendor::Apns.max_payload_size();
    if payload.len() > max {
        return Err(PushError::InvalidArgument(format!(
            "Payload of notification {} is {} bytes, exceeds maximum of {} bytes",
            notification.id(),
            payload.len(),
            max
        )));
    }

    let expiry = notification
        .expiry()
        .map(|at| at.timestamp().clamp(0, u32::MAX as i64) as u32)
        .unwrap_or(0);

    let mut frame =
        BytesMut::with_capacity(NOTIFICATION_HEADER_SIZE + token.len() + 2 + payload.len());
    frame.put_u8(ENHANCED_NOTIFICATION_COMMAND);
    frame.put_u32(notification.id());
    frame.put_u32(expiry);
    frame.put_u16(token.len() as u16);
    frame.put_slice(&token);
    frame.put_u16(payload.len() as u16);
    frame.put_slice(&payload);

    Ok(frame.freeze())
}

/// 解码后的通知帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFrame {
    pub identifier: u32,
    pub expiry: u32,
    pub token: Vec<u8>,
    pub payload: Vec<u8>,
}

/// 从缓冲区解码一个通知帧
///
/// 数据不足时返回 `Ok(None)` 且不消耗缓冲区
pub fn decode_notification_frame(src: &mut BytesMut) -> Result<Option<NotificationFrame>> {
    if src.len() < NOTIFICATION_HEADER_SIZE {
        return Ok(None);
    }
    if src[0] != ENHANCED_NOTIFICATION_COMMAND {
        return Err(PushError::Runtime(format!(
            "Invalid APNS notification command: {}",
            src[0]
        )));
    }

    let token_len = u16::from_be_bytes([src[9], src[10]]) as usize;
    let payload_len_at = NOTIFICATION_HEADER_SIZE + token_len;
    if src.len() < payload_len_at + 2 {
        return Ok(None);
    }
    let payload_len = u16::from_be_bytes([src[payload_len_at], src[payload_len_at + 1]]) as usize;
    let total = payload_len_at + 2 + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    let mut frame = src.split_to(total);
    frame.advance(1);
    let identifier = frame.get_u32();
    let expiry = frame.get_u32();
    let token_len = frame.get_u16() as usize;
    let token = frame.split_to(token_len).to_vec();
    let payload_len = frame.get_u16() as usize;
    let payload = frame.split_to(payload_len).to_vec();

    Ok(Some(NotificationFrame {
        identifier,
        expiry,
        token,
        payload,
    }))
}
