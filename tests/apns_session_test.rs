use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use unified_push::push::codec::{self, ErrorStatus};
use unified_push::push::{
    ApnsMessage, Connector, DispatchSession, Message, Notification, NotificationBuilder,
    PushService, SessionConfig,
};
use unified_push::{PushError, RecipientStatus, Result};

/// 网关在一条连接上的行为
#[derive(Clone)]
enum Script {
    /// 收下所有帧
    AcceptAll,
    /// 收到指定 ID 的帧后回写错误帧并关闭连接
    ErrorAt(u32, Vec<u8>),
    /// 收到指定 ID 的帧后回写一帧，连接保持
    NoticeAt(u32, Vec<u8>),
    /// 收到指定 ID 的帧后直接关闭连接
    CloseAt(u32),
    /// 拒绝连接
    Refuse,
}

/// 内存中的 APNs 网关，按脚本处理每条连接
struct MockGateway {
    scripts: Mutex<VecDeque<Script>>,
    connections: Arc<Mutex<Vec<Vec<u32>>>>,
    buffer_size: usize,
}

impl MockGateway {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connections: Arc::new(Mutex::new(Vec::new())),
            buffer_size: 64 * 1024,
        }
    }

    fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// 每条连接上收到的通知 ID
    fn connections(&self) -> Arc<Mutex<Vec<Vec<u32>>>> {
        Arc::clone(&self.connections)
    }
}

#[async_trait]
impl Connector for MockGateway {
    type Stream = DuplexStream;

    async fn connect(&self) -> Result<DuplexStream> {
        let script = self.scripts.lock().pop_front().unwrap_or(Script::AcceptAll);
        if let Script::Refuse = script {
            return Err(PushError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "gateway refused connection",
            )));
        }

        let (client, server) = tokio::io::duplex(self.buffer_size);
        let index = {
            let mut connections = self.connections.lock();
            connections.push(Vec::new());
            connections.len() - 1
        };
        tokio::spawn(serve(server, script, Arc::clone(&self.connections), index));
        Ok(client)
    }
}

async fn serve(
    mut server: DuplexStream,
    script: Script,
    connections: Arc<Mutex<Vec<Vec<u32>>>>,
    index: usize,
) {
    let mut buf = BytesMut::new();
    loop {
        while let Ok(Some(frame)) = codec::decode_notification_frame(&mut buf) {
            connections.lock()[index].push(frame.identifier);
            match &script {
                Script::ErrorAt(id, response) if *id == frame.identifier => {
                    let _ = server.write_all(response).await;
                    return;
                }
                Script::NoticeAt(id, response) if *id == frame.identifier => {
                    let _ = server.write_all(response).await;
                }
                Script::CloseAt(id) if *id == frame.identifier => return,
                _ => {}
            }
        }
        match server.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

fn config(max_retries: Option<u32>) -> SessionConfig {
    SessionConfig {
        error_wait: Duration::from_millis(100),
        max_retries,
        reconnect_delay: Duration::from_millis(1),
    }
}

fn token(n: u32) -> String {
    format!("{:064x}", n)
}

fn build(count: u32) -> Vec<Notification> {
    let mut message = Message::from(ApnsMessage::new().with_alert("Text of an alert").with_badge(1));
    for n in 1..=count {
        message.add_recipient(&token(n)).unwrap();
    }
    NotificationBuilder::with_default_handlers()
        .build_notifications(&message)
        .unwrap()
}

fn error_frame(status: ErrorStatus, id: u32) -> Vec<u8> {
    codec::encode_error_response(status, id).to_vec()
}

#[tokio::test]
async fn test_processing_error_resends_after_failed_id() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(4, error_frame(ErrorStatus::ProcessingError, 4)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(3)));

    let notifications = build(10);
    let recipients: Vec<_> = notifications.iter().map(|n| Arc::clone(n.recipient())).collect();
    let report = session.dispatch(notifications).await.unwrap();

    let connections = connections.lock();
    assert_eq!(connections.len(), 2);
    assert_eq!(connections[0][..4], [1, 2, 3, 4]);
    assert_eq!(connections[1], vec![5, 6, 7, 8, 9, 10]);

    assert_eq!(report.total, 10);
    assert_eq!(report.delivered, 9);
    assert_eq!(report.reconnects, 1);
    assert!(report.invalid_recipients.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, 4);
    assert_eq!(report.failed[0].status, Some(1));
    assert_eq!(report.failed[0].description, "Processing error");

    assert_eq!(recipients[3].status(), RecipientStatus::Unknown);
    assert_eq!(recipients[4].status(), RecipientStatus::DeliveredUnconfirmed);
}

#[tokio::test]
async fn test_invalid_token_marks_recipient_and_continues() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(3, error_frame(ErrorStatus::InvalidToken, 3)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    // 接收者级错误不消耗重试次数
    let mut session = DispatchSession::new(gateway, config(Some(0)));

    let notifications = build(5);
    let recipients: Vec<_> = notifications.iter().map(|n| Arc::clone(n.recipient())).collect();
    let report = session.dispatch(notifications).await.unwrap();

    assert_eq!(connections.lock()[1], vec![4, 5]);
    assert_eq!(report.invalid_recipients, vec![token(3)]);
    assert_eq!(report.delivered, 4);
    assert!(report.failed.is_empty());
    assert!(!report.is_complete());

    assert_eq!(recipients[2].status(), RecipientStatus::NotRegistered);
    assert_eq!(recipients[0].status(), RecipientStatus::DeliveredUnconfirmed);
    assert_eq!(recipients[4].status(), RecipientStatus::DeliveredUnconfirmed);
}

#[tokio::test]
async fn test_sequential_errors_only_look_forward() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(2, error_frame(ErrorStatus::ProcessingError, 2)),
        Script::ErrorAt(5, error_frame(ErrorStatus::InvalidToken, 5)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(3)));

    let report = session.dispatch(build(7)).await.unwrap();

    let connections = connections.lock();
    assert_eq!(connections.len(), 3);
    assert_eq!(connections[1][..3], [3, 4, 5]);
    assert_eq!(connections[2], vec![6, 7]);
    assert_eq!(report.delivered, 5);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.invalid_recipients, vec![token(5)]);
    assert_eq!(report.reconnects, 2);
}

#[tokio::test]
async fn test_error_on_last_notification_needs_no_reconnect() {
    let gateway = MockGateway::new(vec![Script::ErrorAt(
        3,
        error_frame(ErrorStatus::InvalidToken, 3),
    )]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(3)));

    let report = session.dispatch(build(3)).await.unwrap();

    assert_eq!(connections.lock().len(), 1);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.invalid_recipients, vec![token(3)]);
    assert_eq!(report.reconnects, 0);
}

#[tokio::test]
async fn test_invalid_token_size_for_unknown_id_is_dispatch_error() {
    // 第二条连接上的错误帧引用已经丢弃的 #2，无法归因到接收者
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(2, error_frame(ErrorStatus::ProcessingError, 2)),
        Script::ErrorAt(4, vec![8, 5, 0, 0, 0, 2]),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    let notifications = build(6);
    let recipients: Vec<_> = notifications.iter().map(|n| Arc::clone(n.recipient())).collect();
    let result = session.dispatch(notifications).await;

    assert!(matches!(
        result,
        Err(PushError::DispatchMessage { status: 5, .. })
    ));
    assert_eq!(connections.lock().len(), 2);
    assert!(recipients.iter().all(|r| r.is_registered()));
}

#[tokio::test]
async fn test_unattributed_error_resends_whole_window() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(2, error_frame(ErrorStatus::ProcessingError, 2)),
        Script::ErrorAt(4, vec![8, 8, 0, 0, 0, 2]),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(None));

    let report = session.dispatch(build(5)).await.unwrap();

    let connections = connections.lock();
    assert_eq!(connections[1][..2], [3, 4]);
    assert_eq!(connections[2], vec![3, 4, 5]);
    assert!(report.invalid_recipients.is_empty());
}

#[tokio::test]
async fn test_corrupt_error_frame_is_fatal() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(2, vec![8, 9, 0, 0, 0, 2]),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(None));

    let result = session.dispatch(build(4)).await;
    assert!(matches!(result, Err(PushError::Runtime(_))));
    // 不重发
    assert_eq!(connections.lock().len(), 1);
}

#[tokio::test]
async fn test_wrong_command_is_fatal() {
    let gateway = MockGateway::new(vec![Script::ErrorAt(1, vec![7, 8, 0, 0, 0, 1])]);
    let mut session = DispatchSession::new(gateway, config(None));
    assert!(matches!(
        session.dispatch(build(2)).await,
        Err(PushError::Runtime(_))
    ));
}

#[tokio::test]
async fn test_truncated_error_frame_is_fatal() {
    let gateway = MockGateway::new(vec![Script::ErrorAt(1, vec![8, 8, 0])]);
    let mut session = DispatchSession::new(gateway, config(None));
    assert!(matches!(
        session.dispatch(build(2)).await,
        Err(PushError::Runtime(_))
    ));
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(2, error_frame(ErrorStatus::ProcessingError, 2)),
        Script::ErrorAt(4, error_frame(ErrorStatus::ProcessingError, 4)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    let result = session.dispatch(build(6)).await;
    assert!(matches!(
        result,
        Err(PushError::DispatchMessage { status: 1, .. })
    ));
    assert_eq!(connections.lock().len(), 2);
}

#[tokio::test]
async fn test_unbounded_budget_survives_many_errors() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(1, error_frame(ErrorStatus::ProcessingError, 1)),
        Script::ErrorAt(2, error_frame(ErrorStatus::MissingPayload, 2)),
        Script::ErrorAt(3, error_frame(ErrorStatus::Unknown, 3)),
        Script::ErrorAt(4, error_frame(ErrorStatus::InvalidPayloadSize, 4)),
        Script::AcceptAll,
    ]);
    let mut session = DispatchSession::new(gateway, config(None));

    let report = session.dispatch(build(6)).await.unwrap();
    assert_eq!(report.failed.len(), 4);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.reconnects, 4);
}

#[tokio::test]
async fn test_no_error_frame_keeps_listening() {
    let gateway = MockGateway::new(vec![Script::NoticeAt(
        1,
        error_frame(ErrorStatus::NoError, 1),
    )]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(0)));

    let report = session.dispatch(build(3)).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.delivered, 3);
    assert_eq!(connections.lock().len(), 1);
}

#[tokio::test]
async fn test_shutdown_counts_last_notification_as_processed() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(2, error_frame(ErrorStatus::Shutdown, 2)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    let report = session.dispatch(build(4)).await.unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.delivered, 4);
    assert_eq!(connections.lock()[1], vec![3, 4]);
}

#[tokio::test]
async fn test_refused_connection_is_retried() {
    let gateway = MockGateway::new(vec![Script::Refuse, Script::AcceptAll]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    let report = session.dispatch(build(2)).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(connections.lock()[0], vec![1, 2]);
}

#[tokio::test]
async fn test_connection_lost_resends_unwritten_remainder() {
    // 缓冲区只能容纳约一帧，关闭连接时后续通知尚未写出
    let gateway = MockGateway::new(vec![Script::CloseAt(2), Script::AcceptAll]).with_buffer_size(128);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    let report = session.dispatch(build(8)).await.unwrap();

    let connections = connections.lock();
    assert_eq!(connections.len(), 2);
    assert_eq!(connections[1].last(), Some(&8));
    assert_eq!(report.reconnects, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_interrupted_write_is_resent_not_delivered() {
    // 网关收到 #1 后关闭连接，此时 #2 还没写完
    let gateway = MockGateway::new(vec![Script::CloseAt(1), Script::AcceptAll]).with_buffer_size(40);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    let notifications = build(4);
    let second = Arc::clone(notifications[1].recipient());
    let report = session.dispatch(notifications).await.unwrap();

    assert_eq!(*connections.lock(), vec![vec![1], vec![2, 3, 4]]);
    assert_eq!(report.delivered, 4);
    assert!(report.failed.is_empty());
    assert_eq!(second.status(), RecipientStatus::DeliveredUnconfirmed);
}

#[tokio::test]
async fn test_rejected_token_is_not_resent_for_later_notifications() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(1, error_frame(ErrorStatus::InvalidToken, 1)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut session = DispatchSession::new(gateway, config(Some(1)));

    // 同一批接收者构建两轮：#1 和 #3 发往 token(1)
    let mut message = Message::from(ApnsMessage::new().with_alert("hi"));
    message.add_recipients([token(1), token(2)]).unwrap();
    let mut builder = NotificationBuilder::with_default_handlers();
    let mut notifications = builder.build_notifications(&message).unwrap();
    notifications.extend(builder.build_notifications(&message).unwrap());

    let report = session.dispatch(notifications).await.unwrap();

    assert_eq!(report.invalid_recipients, vec![token(1)]);
    assert_eq!(connections.lock()[1], vec![2, 4]);
    assert_eq!(message.recipients()[0].status(), RecipientStatus::NotRegistered);
    assert_eq!(
        message.recipients()[1].status(),
        RecipientStatus::DeliveredUnconfirmed
    );
}

#[tokio::test]
async fn test_frames_carry_token_and_payload() {
    let gateway = MockGateway::new(vec![]);
    let mut session = DispatchSession::new(gateway, config(None));
    let notifications = build(1);
    let expected = notifications[0].payload().to_bytes().unwrap();

    let mut frame = BytesMut::from(&codec::encode_notification(&notifications[0]).unwrap()[..]);
    let decoded = codec::decode_notification_frame(&mut frame).unwrap().unwrap();
    assert_eq!(decoded.token, hex::decode(token(1)).unwrap());
    assert_eq!(decoded.payload, expected);

    assert!(session.dispatch(notifications).await.unwrap().is_complete());
}

#[tokio::test]
async fn test_service_routes_apns_through_session() {
    let gateway = MockGateway::new(vec![
        Script::ErrorAt(1, error_frame(ErrorStatus::InvalidToken, 1)),
        Script::AcceptAll,
    ]);
    let connections = gateway.connections();
    let mut service =
        PushService::new().with_apns_session(DispatchSession::new(gateway, config(Some(3))));

    let mut message = Message::from(ApnsMessage::new().with_alert("hi"));
    message.add_recipients([token(1), token(2)]).unwrap();

    let report = service.send(&message).await.unwrap();
    assert_eq!(report.invalid_recipients, vec![token(1)]);
    assert_eq!(connections.lock()[1], vec![2]);

    // 已失效的接收者不再生成通知，ID 继续递增
    let report = service.send(&message).await.unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(connections.lock()[2], vec![3]);
}
