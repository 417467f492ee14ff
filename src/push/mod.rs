pub mod builder;
pub mod codec;
pub mod dispatcher;
pub mod message;
pub mod notification;
pub mod payload;
pub mod provider;
pub mod recipient;
pub mod report;
pub mod service;
pub mod transport;
pub mod types;
pub mod window;

pub use builder::NotificationBuilder;
pub use codec::{ErrorResponse, ErrorStatus};
pub use dispatcher::{DispatchSession, SessionConfig};
pub use message::{
    ApnsAlert, ApnsMessage, GcmMessage, Message, MessageSpec, MpnsMessage, MpnsTile, MpnsToast,
};
pub use notification::Notification;
pub use payload::{EncodedPayload, PayloadHandler};
pub use provider::{GcmProvider, MockProvider, MpnsProvider, PushProvider};
pub use recipient::Recipient;
pub use report::{DispatchReport, FailedNotification};
pub use service::PushService;
pub use transport::{Connector, TcpConnector};
pub use types::{PushVendor, RecipientStatus};
pub use window::DispatchWindow;
