use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{PushError, Result};
use crate::push::builder::NotificationBuilder;
use crate::push::dispatcher::DispatchSession;
use crate::push::message::Message;
use crate::push::provider::PushProvider;
use crate::push::report::DispatchReport;
use crate::push::transport::{Connector, TcpConnector};
use crate::push::types::PushVendor;

/// Push Service（推送服务）
///
/// 职责：
/// - 用同一个 `NotificationBuilder` 展开消息，通知 ID 在服务生命周期内唯一
/// - 按平台选择投递方式：APNs 走二进制会话，其余走 HTTP Provider
/// - 返回统一的投递报告
pub struct PushService<C: Connector = TcpConnector> {
    builder: NotificationBuilder,
    apns: Option<DispatchSession<C>>,
    providers: HashMap<PushVendor, Arc<dyn PushProvider>>,
}

impl<C: Connector> PushService<C> {
    pub fn new() -> Self {
        Self {
            builder: NotificationBuilder::with_default_handlers(),
            apns: None,
            providers: HashMap::new(),
        }
    }

    /// 使用二进制网关会话投递 APNs 消息
    pub fn with_apns_session(mut self, session: DispatchSession<C>) -> Self {
        self.apns = Some(session);
        self
    }

    /// 注册 HTTP Provider，同一平台的旧 Provider 会被替换
    pub fn with_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.providers.insert(provider.vendor(), provider);
        self
    }

    pub fn builder_mut(&mut self) -> &mut NotificationBuilder {
        &mut self.builder
    }

    /// 该平台是否有可用的投递方式
    pub fn supports(&self, vendor: PushVendor) -> bool {
        (vendor == PushVendor::Apns && self.apns.is_some()) || self.providers.contains_key(&vendor)
    }

    /// 构建并投递消息
    pub async fn send(&mut self, message: &Message) -> Result<DispatchReport> {
        let vendor = message.vendor();
        if !self.supports(vendor) {
            return Err(PushError::Domain(format!(
                "No delivery channel configured for {}",
                vendor
            )));
        }

        let notifications = self.builder.build_notifications(message)?;
        info!(
            "[PUSH SERVICE] Dispatching {} message: recipients={}, notifications={}",
            vendor,
            message.recipients().len(),
            notifications.len()
        );

        let report = match (vendor, self.apns.as_mut()) {
            (PushVendor::Apns, Some(session)) => session.dispatch(notifications).await?,
            _ => match self.providers.get(&vendor) {
                Some(provider) => provider.send(&notifications).await?,
                None => {
                    return Err(PushError::Domain(format!(
                        "No provider registered for {}",
                        vendor
                    )))
                }
            },
        };

        if report.is_complete() {
            info!(
                "[PUSH SERVICE] {} message delivered: {} notifications",
                vendor, report.delivered
            );
        } else {
            warn!(
                "[PUSH SERVICE] {} message partially delivered: delivered={}, invalid_recipients={:?}, failed={}",
                vendor,
                report.delivered,
                report.invalid_recipients,
                report.failed.len()
            );
        }

        Ok(report)
    }
}

impl<C: Connector> Default for PushService<C> {
    fn default() -> Self {
        Self::new()
    }
}
