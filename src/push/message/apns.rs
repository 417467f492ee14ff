use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::push::recipient::Recipient;

/// APNs alert 字典
///
/// 只有设置过的字段会被编码
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApnsAlert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_loc_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_image: Option<String>,
}

/// alert 可以是纯文本或字典
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApnsAlertValue {
    Text(String),
    Dictionary(ApnsAlert),
}

/// APNs 消息
#[derive(Debug, Clone, Default)]
pub struct ApnsMessage {
    pub(crate) recipients: Vec<Arc<Recipient>>,
    pub alert: Option<ApnsAlertValue>,
    pub badge: Option<u32>,
    pub sound: Option<String>,
    pub category: Option<String>,
    pub content_available: bool,
    pub mutable_content: bool,
    pub url_args: Vec<String>,
    /// 与 `aps` 同级的自定义字段
    pub custom_data: Map<String, Value>,
    pub expiration_time: Option<DateTime<Utc>>,
}

impl ApnsMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alert(mut self, alert: impl Into<String>) -> Self {
        self.alert = Some(ApnsAlertValue::Text(alert.into()));
        self
    }

    pub fn with_alert_dictionary(mut self, alert: ApnsAlert) -> Self {
        self.alert = Some(ApnsAlertValue::Dictionary(alert));
        self
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_content_available(mut self, content_available: bool) -> Self {
        self.content_available = content_available;
        self
    }

    pub fn with_mutable_content(mut self, mutable_content: bool) -> Self {
        self.mutable_content = mutable_content;
        self
    }

    pub fn with_url_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_custom_data(mut self, data: Map<String, Value>) -> Self {
        self.custom_data = data;
        self
    }

    pub fn with_expiration_time(mut self, at: DateTime<Utc>) -> Self {
        self.expiration_time = Some(at);
        self
    }
}
