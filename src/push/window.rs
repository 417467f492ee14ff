use std::collections::BTreeMap;
use std::sync::Arc;

use crate::push::notification::Notification;
use crate::push::recipient::Recipient;

/// 错误发生后对窗口的划分
#[derive(Debug, Default)]
pub struct Rewind {
    /// ID 小于 K 的通知，服务端已处理
    pub confirmed: Vec<Notification>,
    /// ID 等于 K 的通知，出错的那一条，不再重发
    pub failed: Option<Notification>,
    /// ID 大于 K 的通知，被服务端丢弃，需要按原顺序重发
    pub resend: Vec<Notification>,
}

/// Dispatch Window（发送窗口）
///
/// 记录已写入连接、尚未被确认的通知，按 ID（即发送顺序）排列。
/// 是唯一做 ID → 通知查找的地方
#[derive(Debug, Default)]
pub struct DispatchWindow {
    entries: BTreeMap<u32, Notification>,
    /// 已登记但 `write_all` 尚未完成的通知
    unwritten: Option<u32>,
}

impl DispatchWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发送时登记
    pub fn insert(&mut self, notification: Notification) {
        self.entries.insert(notification.id(), notification);
    }

    /// 登记并标记为正在写出，写完后调用 [`finish_write`](Self::finish_write)
    pub fn begin_write(&mut self, notification: Notification) {
        self.unwritten = Some(notification.id());
        self.insert(notification);
    }

    pub fn finish_write(&mut self, id: u32) {
        if self.unwritten == Some(id) {
            self.unwritten = None;
        }
    }

    /// 取回写到一半就被中断的通知，它不算已发送
    pub fn take_unwritten(&mut self) -> Option<Notification> {
        let id = self.unwritten.take()?;
        self.entries.remove(&id)
    }

    /// 按通知 ID 查找接收者
    pub fn recipient_of(&self, id: u32) -> Option<Arc<Recipient>> {
        self.entries.get(&id).map(|n| Arc::clone(n.recipient()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 收到引用 `id` 的错误后清空窗口，并把条目划分为已确认、出错和待重发三部分
    pub fn rewind(&mut self, id: u32) -> Rewind {
        self.unwritten = None;
        let after = match id.checked_add(1) {
            Some(next) => self.entries.split_off(&next),
            None => BTreeMap::new(),
        };
        let failed = self.entries.remove(&id);
        let confirmed = std::mem::take(&mut self.entries).into_values().collect();
        let resend = after.into_values().collect();

        Rewind {
            confirmed,
            failed,
            resend,
        }
    }

    /// 会话结束时取出全部条目（按发送顺序）
    pub fn drain(&mut self) -> Vec<Notification> {
        self.unwritten = None;
        std::mem::take(&mut self.entries).into_values().collect()
    }
}
