//! 二进制网关的连接抽象。
//!
//! 会话只通过 `Connector` 拿到一条可读写的字节流，TLS 与 socket 生命周期由实现方负责。

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{PushError, Result};
use crate::push::codec::ERROR_RESPONSE_LENGTH;

/// 建立到推送网关的连接，每次调用都返回一条新连接
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn connect(&self) -> Result<Self::Stream>;
}

/// 明文 TCP 连接器
///
/// 生产网关要求 TLS，可以指向本地 TLS 代理，或用自定义 `Connector` 包装
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        debug!("[APNS TRANSPORT] Connecting to {}", self.address);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                PushError::Timeout(format!(
                    "connect to {} timed out after {:?}",
                    self.address, self.connect_timeout
                ))
            })??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// 读取一个错误响应帧
///
/// 连接在帧开始前关闭时返回 `None`；读到一半关闭时返回已读到的字节，
/// 由解码阶段判定为损坏帧
pub async fn read_error_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut frame = vec![0u8; ERROR_RESPONSE_LENGTH];
    let mut filled = 0;

    while filled < ERROR_RESPONSE_LENGTH {
        match reader.read(&mut frame[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if is_disconnect(&e) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if filled == 0 {
        return Ok(None);
    }
    frame.truncate(filled);
    Ok(Some(frame))
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}
