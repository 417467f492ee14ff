use thiserror::Error;

/// 推送错误类型
///
/// 前五个变体对应推送管道的错误分类：
/// - `InvalidArgument` / `Domain`：构建阶段的本地错误，直接返回给调用方
/// - `Runtime`：帧损坏或未知状态码，当前会话终止，不重试
/// - `InvalidRecipient`：设备永久不可用，标记接收者后继续投递其余通知
/// - `DispatchMessage`：服务端投递错误，通过重发算法恢复
#[derive(Debug, Error)]
pub enum PushError {
    /// 参数错误（非法设备令牌、超长 payload 等）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// 不支持的推送服务或消息类型
    #[error("Domain error: {0}")]
    Domain(String),
    /// 传输帧损坏或无法识别
    #[error("Runtime error: {0}")]
    Runtime(String),
    /// 接收者设备不可用
    #[error("Invalid recipient '{token}': {description}")]
    InvalidRecipient { token: String, description: String },
    /// 服务端返回的投递错误
    #[error("Dispatch error (status {status}): {description}")]
    DispatchMessage { status: u8, description: String },
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// HTTP 请求错误
    #[error("HTTP error: {0}")]
    Http(String),
    /// 超时
    #[error("Timeout: {0}")]
    Timeout(String),
    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PushError {
    /// 是否可通过标记接收者或重发恢复
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PushError::InvalidRecipient { .. } | PushError::DispatchMessage { .. }
        )
    }
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        PushError::Http(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PushError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let invalid = PushError::InvalidRecipient {
            token: "abc".to_string(),
            description: "Invalid token".to_string(),
        };
        let dispatch = PushError::DispatchMessage {
            status: 1,
            description: "Processing error".to_string(),
        };
        assert!(invalid.is_recoverable());
        assert!(dispatch.is_recoverable());
        assert!(!PushError::Runtime("bad frame".to_string()).is_recoverable());
        assert!(!PushError::Domain("unsupported".to_string()).is_recoverable());
    }

    #[test]
    fn test_display_names_status() {
        let err = PushError::DispatchMessage {
            status: 7,
            description: "Invalid payload size".to_string(),
        };
        assert_eq!(err.to_string(), "Dispatch error (status 7): Invalid payload size");
    }
}
