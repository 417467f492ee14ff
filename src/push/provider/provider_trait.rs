use async_trait::async_trait;

use crate::error::Result;
use crate::push::notification::Notification;
use crate::push::report::DispatchReport;
use crate::push::types::PushVendor;

/// Push Provider Trait（HTTP 推送平台接口）
///
/// 请求/响应式协议，没有发送窗口。实现方按平台的响应更新接收者状态，
/// 并把结果汇总到报告里
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// 发送一组通知（`NotificationBuilder` 的输出，同一请求的通知共用 payload）
    async fn send(&self, notifications: &[Notification]) -> Result<DispatchReport>;

    /// 获取 Provider 对应的 Vendor
    fn vendor(&self) -> PushVendor;
}
