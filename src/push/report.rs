use serde::Serialize;

use crate::push::types::PushVendor;

/// 未送达的单条通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedNotification {
    pub id: u32,
    pub token: String,
    /// 二进制网关的状态码（HTTP 平台为空）
    pub status: Option<u8>,
    pub description: String,
}

/// 一次投递的结果
///
/// 无论哪个平台，调用方看到的都是同一种结构：全部成功、部分完成（列出被标记为不可用的
/// 接收者和失败的通知），或者以 `Err` 返回的致命错误
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub session_id: String,
    pub vendor: PushVendor,
    /// 投递的通知总数
    pub total: usize,
    /// 已交给平台、未被任何错误牵连的通知数
    pub delivered: usize,
    /// 被标记为 `NotRegistered` 的接收者令牌
    pub invalid_recipients: Vec<String>,
    pub failed: Vec<FailedNotification>,
    /// 因错误被丢弃后重发的通知数
    pub resent: usize,
    pub reconnects: u32,
}

impl DispatchReport {
    pub fn new(session_id: impl Into<String>, vendor: PushVendor, total: usize) -> Self {
        Self {
            session_id: session_id.into(),
            vendor,
            total,
            delivered: 0,
            invalid_recipients: Vec::new(),
            failed: Vec::new(),
            resent: 0,
            reconnects: 0,
        }
    }

    /// 所有通知都已交付
    pub fn is_complete(&self) -> bool {
        self.invalid_recipients.is_empty() && self.failed.is_empty()
    }
}
