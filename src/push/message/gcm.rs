use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::push::recipient::Recipient;

/// GCM 单次请求最多携带的 registration_ids 数量
pub const GCM_MAX_RECIPIENTS_PER_REQUEST: usize = 1000;

/// time_to_live 上限（4 周，秒）
pub const GCM_MAX_TIME_TO_LIVE: u32 = 2_419_200;

/// GCM 消息
#[derive(Debug, Clone, Default)]
pub struct GcmMessage {
    pub(crate) recipients: Vec<Arc<Recipient>>,
    pub collapse_key: Option<String>,
    pub delay_while_idle: bool,
    pub dry_run: bool,
    /// 存活时间（秒）
    pub time_to_live: Option<u32>,
    pub restricted_package_name: Option<String>,
    pub data: Map<String, Value>,
}

impl GcmMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collapse_key(mut self, key: impl Into<String>) -> Self {
        self.collapse_key = Some(key.into());
        self
    }

    pub fn with_delay_while_idle(mut self, delay: bool) -> Self {
        self.delay_while_idle = delay;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_time_to_live(mut self, seconds: u32) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    /// 由过期时间换算 time_to_live，换算在设置时完成，编码保持纯函数
    pub fn with_expiration_time(self, at: DateTime<Utc>) -> Self {
        let seconds = (at - Utc::now()).num_seconds().max(0);
        let seconds = u32::try_from(seconds).unwrap_or(u32::MAX);
        self.with_time_to_live(seconds)
    }

    pub fn with_restricted_package_name(mut self, name: impl Into<String>) -> Self {
        self.restricted_package_name = Some(name.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}
