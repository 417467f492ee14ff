//! APNs 二进制网关投递会话。
//!
//! 每条连接上同时运行两个角色：
//! - sender：按顺序把通知写入连接，写之前登记到发送窗口
//! - listener：阻塞读取错误响应帧，是触发重发的唯一途径
//!
//! 收到引用 K 的错误后，窗口中 ID 小于 K 的通知视为已处理，K 本身丢弃，
//! 大于 K 的通知在新连接上按原顺序、原 ID 重发。

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PushError, Result};
use crate::push::codec::{self, ErrorResponse, ErrorStatus};
use crate::push::notification::Notification;
use crate::push::report::{DispatchReport, FailedNotification};
use crate::push::transport::{self, Connector};
use crate::push::types::{PushVendor, RecipientStatus};
use crate::push::window::DispatchWindow;

/// 会话参数
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 写完最后一帧后等待错误响应的时间，超时即视为会话完成
    pub error_wait: Duration,
    /// 会话级重启（DispatchMessage、断线、重连失败）次数上限，`None` 表示不限
    pub max_retries: Option<u32>,
    /// 连接建立失败后的等待时间
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            error_wait: Duration::from_millis(1000),
            max_retries: Some(3),
            reconnect_delay: Duration::from_millis(200),
        }
    }
}

enum ListenEvent {
    Error(ErrorResponse),
    Closed,
}

enum ConnectionOutcome {
    /// 全部写出且未收到错误
    Completed,
    /// 收到错误响应帧
    Failed(ErrorResponse),
    /// 写完之前连接已断开
    Lost,
}

impl ListenEvent {
    fn into_outcome(self, sent_all: bool) -> ConnectionOutcome {
        match self {
            ListenEvent::Error(response) => ConnectionOutcome::Failed(response),
            ListenEvent::Closed if sent_all => ConnectionOutcome::Completed,
            ListenEvent::Closed => ConnectionOutcome::Lost,
        }
    }
}

/// Dispatch Session（二进制网关投递会话）
pub struct DispatchSession<C: Connector> {
    connector: C,
    config: SessionConfig,
    window: Mutex<DispatchWindow>,
}

impl<C: Connector> DispatchSession<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            window: Mutex::new(DispatchWindow::new()),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 投递一组通知（须按 ID 升序，即 `NotificationBuilder` 的输出顺序）
    ///
    /// 接收者级错误和可恢复的会话级错误记录在返回的报告里；
    /// 损坏的错误帧或超出重试次数时返回 `Err`
    pub async fn dispatch(&mut self, notifications: Vec<Notification>) -> Result<DispatchReport> {
        let session_id = Uuid::new_v4().to_string();
        let mut report = DispatchReport::new(&session_id, PushVendor::Apns, notifications.len());

        // 先全部编码，编码错误在写出任何字节之前暴露
        let mut frames = HashMap::with_capacity(notifications.len());
        for notification in &notifications {
            frames.insert(notification.id(), codec::encode_notification(notification)?);
        }

        let mut pending: VecDeque<Notification> = notifications.into();
        let mut restarts = 0u32;
        let mut connections = 0u32;

        info!(
            "[APNS SESSION] Starting session {}: {} notifications",
            session_id, report.total
        );

        while !pending.is_empty() {
            let stream = match self.connector.connect().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("[APNS SESSION] Session {} failed to connect: {}", session_id, e);
                    self.consume_budget(&session_id, &mut restarts, e)?;
                    tokio::time::sleep(self.config.reconnect_delay).await;
                    continue;
                }
            };
            if connections > 0 {
                report.reconnects += 1;
            }
            connections += 1;

            let outcome = match self.run_connection(stream, &mut pending, &frames).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("[APNS SESSION] Session {} aborted: {}", session_id, e);
                    self.window.lock().drain();
                    return Err(e);
                }
            };

            match outcome {
                ConnectionOutcome::Completed => {
                    let written = self.window.lock().drain();
                    mark_delivered(&written, &mut report);
                }
                ConnectionOutcome::Lost => {
                    // 已写出的视为已交付，没写完的和未写出的在新连接上继续
                    let written = {
                        let mut window = self.window.lock();
                        if let Some(unwritten) = window.take_unwritten() {
                            pending.push_front(unwritten);
                        }
                        window.drain()
                    };
                    mark_delivered(&written, &mut report);
                    if !pending.is_empty() {
                        warn!(
                            "[APNS SESSION] Session {} lost connection with {} notifications unsent",
                            session_id,
                            pending.len()
                        );
                        let cause = PushError::Runtime(format!(
                            "connection closed with {} notifications unsent",
                            pending.len()
                        ));
                        self.consume_budget(&session_id, &mut restarts, cause)?;
                    }
                }
                ConnectionOutcome::Failed(response) => {
                    self.handle_error_response(
                        &session_id,
                        response,
                        &mut pending,
                        &mut report,
                        &mut restarts,
                    )?;
                }
            }
        }

        info!(
            "[APNS SESSION] Session {} finished: delivered={}, invalid_recipients={}, failed={}, resent={}, reconnects={}",
            session_id,
            report.delivered,
            report.invalid_recipients.len(),
            report.failed.len(),
            report.resent,
            report.reconnects
        );

        Ok(report)
    }

    /// 在一条连接上运行 sender 与 listener，直到出现结果
    async fn run_connection(
        &self,
        stream: C::Stream,
        pending: &mut VecDeque<Notification>,
        frames: &HashMap<u32, Bytes>,
    ) -> Result<ConnectionOutcome> {
        let (reader, mut writer) = tokio::io::split(stream);
        let window = &self.window;

        let listener = listen(reader);
        tokio::pin!(listener);

        let sender = async {
            while let Some(notification) = pending.pop_front() {
                let id = notification.id();
                let frame = frames.get(&id).cloned().ok_or_else(|| {
                    PushError::Runtime(format!("No encoded frame for notification {}", id))
                })?;

                // 先登记再写，写到一半被取消时仍能从窗口取回
                window.lock().begin_write(notification);
                writer.write_all(&frame).await?;
                window.lock().finish_write(id);
                debug!("[APNS SESSION] Wrote notification {}", id);
            }
            writer.flush().await?;
            Ok::<(), PushError>(())
        };
        tokio::pin!(sender);

        let sent_all = tokio::select! {
            biased;
            event = &mut listener => return Ok(event?.into_outcome(false)),
            result = &mut sender => match result {
                Ok(()) => true,
                Err(PushError::Io(e)) => {
                    warn!("[APNS SESSION] Write failed: {}", e);
                    false
                }
                Err(e) => return Err(e),
            },
        };

        match tokio::time::timeout(self.config.error_wait, &mut listener).await {
            Ok(event) => Ok(event?.into_outcome(sent_all)),
            Err(_) if sent_all => Ok(ConnectionOutcome::Completed),
            Err(_) => Ok(ConnectionOutcome::Lost),
        }
    }

    fn handle_error_response(
        &self,
        session_id: &str,
        response: ErrorResponse,
        pending: &mut VecDeque<Notification>,
        report: &mut DispatchReport,
        restarts: &mut u32,
    ) -> Result<()> {
        let checked = response.check(|id| self.window.lock().recipient_of(id));
        let rewind = self.window.lock().rewind(response.identifier);

        mark_delivered(&rewind.confirmed, report);

        // 重发部分排在未写出部分之前，保持原发送顺序；已失效的接收者不再发送
        let resend: Vec<Notification> = rewind
            .resend
            .into_iter()
            .filter(|notification| notification.recipient().is_registered())
            .collect();
        report.resent += resend.len();
        let unsent: Vec<Notification> = pending.drain(..).collect();
        pending.extend(resend);
        pending.extend(unsent);
        pending.retain(|notification| notification.recipient().is_registered());

        match checked {
            Ok(()) => Ok(()),
            Err(PushError::InvalidRecipient { token, description }) => {
                warn!(
                    "[APNS SESSION] Session {}: recipient {} rejected ({}), {} notifications to resend",
                    session_id,
                    token,
                    description,
                    pending.len()
                );
                report.invalid_recipients.push(token);
                Ok(())
            }
            Err(e @ PushError::DispatchMessage { .. }) => {
                warn!(
                    "[APNS SESSION] Session {}: notification {} failed: {}",
                    session_id, response.identifier, e
                );
                if let Some(notification) = rewind.failed {
                    if response.status == ErrorStatus::Shutdown {
                        // 网关维护关闭连接，K 是最后一条成功处理的通知
                        mark_delivered(std::slice::from_ref(&notification), report);
                    } else {
                        report.failed.push(FailedNotification {
                            id: notification.id(),
                            token: notification.recipient().identifier().to_string(),
                            status: Some(response.status.code()),
                            description: response.description().to_string(),
                        });
                    }
                }
                if pending.is_empty() {
                    return Ok(());
                }
                self.consume_budget(session_id, restarts, e)
            }
            Err(e) => Err(e),
        }
    }

    fn consume_budget(&self, session_id: &str, restarts: &mut u32, cause: PushError) -> Result<()> {
        *restarts += 1;
        match self.config.max_retries {
            Some(max) if *restarts > max => {
                error!(
                    "[APNS SESSION] Session {} exceeded retry budget ({}): {}",
                    session_id, max, cause
                );
                Err(cause)
            }
            _ => {
                debug!("[APNS SESSION] Session {} restart #{}", session_id, restarts);
                Ok(())
            }
        }
    }
}

/// 读取错误响应，直到出现需要处理的错误或连接关闭
async fn listen<R>(mut reader: R) -> Result<ListenEvent>
where
    R: AsyncRead + Unpin,
{
    loop {
        let Some(frame) = transport::read_error_frame(&mut reader).await? else {
            return Ok(ListenEvent::Closed);
        };
        let response = codec::decode_error_response(&frame)?;
        if response.status == ErrorStatus::NoError {
            debug!(
                "[APNS SESSION] Ignoring no-error response for notification {}",
                response.identifier
            );
            continue;
        }
        return Ok(ListenEvent::Error(response));
    }
}

fn mark_delivered(notifications: &[Notification], report: &mut DispatchReport) {
    for notification in notifications {
        notification
            .recipient()
            .set_status(RecipientStatus::DeliveredUnconfirmed);
    }
    report.delivered += notifications.len();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::builder::NotificationBuilder;
    use crate::push::message::{ApnsMessage, Message};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream};

    /// 收下所有帧、从不报错的网关
    struct SilentGateway {
        received: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl Connector for SilentGateway {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<DuplexStream> {
            let (client, mut server) = tokio::io::duplex(64 * 1024);
            let received = Arc::clone(&self.received);
            tokio::spawn(async move {
                let mut buf = bytes::BytesMut::new();
                loop {
                    while let Ok(Some(frame)) = codec::decode_notification_frame(&mut buf) {
                        received.lock().push(frame.identifier);
                    }
                    if server.read_buf(&mut buf).await.unwrap_or(0) == 0 {
                        break;
                    }
                }
            });
            Ok(client)
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<DuplexStream> {
            Err(PushError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            error_wait: Duration::from_millis(50),
            max_retries: Some(2),
            reconnect_delay: Duration::from_millis(1),
        }
    }

    fn build(count: u8) -> Vec<Notification> {
        let mut message = Message::from(ApnsMessage::new().with_alert("hello"));
        for n in 1..=count {
            message.add_recipient(&format!("{:064x}", n)).unwrap();
        }
        NotificationBuilder::with_default_handlers()
            .build_notifications(&message)
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_without_errors() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let mut session = DispatchSession::new(
            SilentGateway {
                received: Arc::clone(&received),
            },
            config(),
        );

        let notifications = build(3);
        let recipients: Vec<_> = notifications.iter().map(|n| Arc::clone(n.recipient())).collect();
        let report = session.dispatch(notifications).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.delivered, 3);
        assert_eq!(report.reconnects, 0);
        assert_eq!(*received.lock(), vec![1, 2, 3]);
        for recipient in recipients {
            assert_eq!(recipient.status(), RecipientStatus::DeliveredUnconfirmed);
        }
    }

    #[tokio::test]
    async fn test_empty_dispatch_does_not_connect() {
        let mut session = DispatchSession::new(RefusingConnector, config());
        let report = session.dispatch(Vec::new()).await.unwrap();
        assert_eq!(report.total, 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_connect_failures_consume_budget() {
        let mut session = DispatchSession::new(RefusingConnector, config());
        let result = session.dispatch(build(1)).await;
        assert!(matches!(result, Err(PushError::Io(_))));
    }

    #[tokio::test]
    async fn test_wrong_vendor_fails_before_connecting() {
        let mut message = Message::from(crate::push::message::GcmMessage::new());
        message.add_recipient("device1").unwrap();
        let notifications = NotificationBuilder::with_default_handlers()
            .build_notifications(&message)
            .unwrap();

        let mut session = DispatchSession::new(RefusingConnector, config());
        assert!(matches!(
            session.dispatch(notifications).await,
            Err(PushError::Domain(_))
        ));
    }
}
