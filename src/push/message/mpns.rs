use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::push::payload::xml::XmlElement;
use crate::push::recipient::Recipient;

/// Toast 通知内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpnsToast {
    pub text1: Option<String>,
    pub text2: Option<String>,
    /// 点击后跳转的页面参数
    pub param: Option<String>,
}

/// Tile 通知内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpnsTile {
    pub background_image: Option<String>,
    pub count: Option<u32>,
    pub title: Option<String>,
    pub back_background_image: Option<String>,
    pub back_title: Option<String>,
    pub back_content: Option<String>,
}

/// MPNS 消息种类
#[derive(Debug, Clone, PartialEq)]
pub enum MpnsKind {
    /// 应用自定义的原始 XML，放在 `root` 元素下
    Raw(Vec<XmlElement>),
    Toast(MpnsToast),
    Tile(MpnsTile),
}

impl MpnsKind {
    /// `X-WindowsPhone-Target` 头，raw 通知不带
    pub fn target(&self) -> Option<&'static str> {
        match self {
            MpnsKind::Raw(_) => None,
            MpnsKind::Toast(_) => Some("toast"),
            MpnsKind::Tile(_) => Some("token"),
        }
    }

    /// 立即投递的 `X-NotificationClass`
    pub fn notification_class(&self) -> u8 {
        match self {
            MpnsKind::Tile(_) => 1,
            MpnsKind::Toast(_) => 2,
            MpnsKind::Raw(_) => 3,
        }
    }
}

/// MPNS 消息
#[derive(Debug, Clone)]
pub struct MpnsMessage {
    pub(crate) recipients: Vec<Arc<Recipient>>,
    pub kind: MpnsKind,
}

impl MpnsMessage {
    pub fn raw(elements: Vec<XmlElement>) -> Self {
        Self {
            recipients: Vec::new(),
            kind: MpnsKind::Raw(elements),
        }
    }

    /// 由 (元素名, 文本) 对构造 raw 消息
    pub fn raw_from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::raw(
            pairs
                .into_iter()
                .map(|(name, value)| XmlElement::with_text(name, value))
                .collect(),
        )
    }

    pub fn toast(toast: MpnsToast) -> Self {
        Self {
            recipients: Vec::new(),
            kind: MpnsKind::Toast(toast),
        }
    }

    pub fn tile(tile: MpnsTile) -> Self {
        Self {
            recipients: Vec::new(),
            kind: MpnsKind::Tile(tile),
        }
    }
}

impl Default for MpnsMessage {
    fn default() -> Self {
        Self::raw(Vec::new())
    }
}
