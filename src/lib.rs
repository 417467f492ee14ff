pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod push;

pub use config::PushConfig;
pub use error::{PushError, Result};
pub use push::{
    DispatchReport, DispatchSession, Message, MessageSpec, Notification, NotificationBuilder,
    PushService, PushVendor, Recipient, RecipientStatus,
};
