//! 与推送平台无关的消息模型。
//!
//! `Message` 在构造时绑定一个平台，之后加入的每个接收者都先经过该平台的令牌校验。

pub mod apns;
pub mod gcm;
pub mod mpns;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PushError, Result};
use crate::push::payload::xml::XmlElement;
use crate::push::recipient::Recipient;
use crate::push::types::PushVendor;

pub use apns::{ApnsAlert, ApnsAlertValue, ApnsMessage};
pub use gcm::{GcmMessage, GCM_MAX_RECIPIENTS_PER_REQUEST};
pub use mpns::{MpnsKind, MpnsMessage, MpnsTile, MpnsToast};

/// 推送消息（每个平台一个变体）
#[derive(Debug, Clone)]
pub enum Message {
    Apns(ApnsMessage),
    Gcm(GcmMessage),
    Mpns(MpnsMessage),
}

impl Message {
    /// 按平台名称创建空消息
    pub fn of_type(name: &str) -> Result<Self> {
        match PushVendor::from_str(name) {
            Some(PushVendor::Apns) => Ok(Message::Apns(ApnsMessage::new())),
            Some(PushVendor::Gcm) => Ok(Message::Gcm(GcmMessage::new())),
            Some(PushVendor::Mpns) => Ok(Message::Mpns(MpnsMessage::default())),
            None => Err(PushError::Domain(format!(
                "Unsupported message type '{}'",
                name
            ))),
        }
    }

    pub fn vendor(&self) -> PushVendor {
        match self {
            Message::Apns(_) => PushVendor::Apns,
            Message::Gcm(_) => PushVendor::Gcm,
            Message::Mpns(_) => PushVendor::Mpns,
        }
    }

    /// 接收者（插入顺序即发送顺序）
    pub fn recipients(&self) -> &[Arc<Recipient>] {
        match self {
            Message::Apns(m) => &m.recipients,
            Message::Gcm(m) => &m.recipients,
            Message::Mpns(m) => &m.recipients,
        }
    }

    fn recipients_mut(&mut self) -> &mut Vec<Arc<Recipient>> {
        match self {
            Message::Apns(m) => &mut m.recipients,
            Message::Gcm(m) => &mut m.recipients,
            Message::Mpns(m) => &mut m.recipients,
        }
    }

    /// 校验并追加接收者，令牌非法时返回 `InvalidArgument`
    ///
    /// 接收者按令牌区分，重复加入同一令牌返回已有的接收者
    pub fn add_recipient(&mut self, identifier: &str) -> Result<Arc<Recipient>> {
        if let Some(existing) = self
            .recipients()
            .iter()
            .find(|recipient| recipient.identifier() == identifier)
        {
            return Ok(Arc::clone(existing));
        }
        let recipient = Arc::new(Recipient::new(self.vendor(), identifier)?);
        self.recipients_mut().push(Arc::clone(&recipient));
        Ok(recipient)
    }

    /// 批量追加，遇到第一个非法令牌即停止
    pub fn add_recipients<I, S>(&mut self, identifiers: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for identifier in identifiers {
            self.add_recipient(identifier.as_ref())?;
        }
        Ok(())
    }

    /// 单次请求可携带的接收者数量
    pub fn max_recipients_per_request(&self) -> usize {
        match self {
            Message::Apns(_) => 1,
            Message::Gcm(_) => GCM_MAX_RECIPIENTS_PER_REQUEST,
            Message::Mpns(_) => usize::MAX,
        }
    }

    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Message::Apns(m) => m.expiration_time,
            _ => None,
        }
    }

    /// 复制 payload 字段，替换为指定的接收者子集
    pub(crate) fn with_recipients(&self, recipients: &[Arc<Recipient>]) -> Self {
        let mut message = self.clone();
        *message.recipients_mut() = recipients.to_vec();
        message
    }
}

impl From<ApnsMessage> for Message {
    fn from(message: ApnsMessage) -> Self {
        Message::Apns(message)
    }
}

impl From<GcmMessage> for Message {
    fn from(message: GcmMessage) -> Self {
        Message::Gcm(message)
    }
}

impl From<MpnsMessage> for Message {
    fn from(message: MpnsMessage) -> Self {
        Message::Mpns(message)
    }
}

/// 消息的 JSON 描述（CLI 输入）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum MessageSpec {
    Apns {
        recipients: Vec<String>,
        #[serde(default)]
        alert: Option<ApnsAlertValue>,
        #[serde(default)]
        badge: Option<u32>,
        #[serde(default)]
        sound: Option<String>,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        content_available: bool,
        #[serde(default)]
        mutable_content: bool,
        #[serde(default)]
        url_args: Vec<String>,
        #[serde(default)]
        custom_data: Map<String, Value>,
        #[serde(default)]
        expiration_time: Option<DateTime<Utc>>,
    },
    Gcm {
        recipients: Vec<String>,
        #[serde(default)]
        collapse_key: Option<String>,
        #[serde(default)]
        delay_while_idle: bool,
        #[serde(default)]
        dry_run: bool,
        #[serde(default)]
        time_to_live: Option<u32>,
        #[serde(default)]
        restricted_package_name: Option<String>,
        #[serde(default)]
        data: Map<String, Value>,
    },
    Mpns {
        recipients: Vec<String>,
        /// raw 消息的 (元素名, 文本) 列表
        #[serde(default)]
        raw: Vec<(String, String)>,
        #[serde(default)]
        toast: Option<MpnsToast>,
        #[serde(default)]
        tile: Option<MpnsTile>,
    },
}

impl MessageSpec {
    /// 转换为经过校验的 `Message`
    pub fn into_message(self) -> Result<Message> {
        match self {
            MessageSpec::Apns {
                recipients,
                alert,
                badge,
                sound,
                category,
                content_available,
                mutable_content,
                url_args,
                custom_data,
                expiration_time,
            } => {
                let mut message = Message::Apns(ApnsMessage {
                    recipients: Vec::new(),
                    alert,
                    badge,
                    sound,
                    category,
                    content_available,
                    mutable_content,
                    url_args,
                    custom_data,
                    expiration_time,
                });
                message.add_recipients(recipients)?;
                Ok(message)
            }
            MessageSpec::Gcm {
                recipients,
                collapse_key,
                delay_while_idle,
                dry_run,
                time_to_live,
                restricted_package_name,
                data,
            } => {
                let mut message = Message::Gcm(GcmMessage {
                    recipients: Vec::new(),
                    collapse_key,
                    delay_while_idle,
                    dry_run,
                    time_to_live,
                    restricted_package_name,
                    data,
                });
                message.add_recipients(recipients)?;
                Ok(message)
            }
            MessageSpec::Mpns {
                recipients,
                raw,
                toast,
                tile,
            } => {
                let body = match (toast, tile) {
                    (Some(toast), _) => MpnsMessage::toast(toast),
                    (None, Some(tile)) => MpnsMessage::tile(tile),
                    (None, None) => MpnsMessage::raw(
                        raw.into_iter()
                            .map(|(name, value)| XmlElement::with_text(name, value))
                            .collect(),
                    ),
                };
                let mut message = Message::Mpns(body);
                message.add_recipients(recipients)?;
                Ok(message)
            }
        }
    }
}
