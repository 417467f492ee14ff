pub mod gcm;
pub mod mock;
pub mod mpns;
pub mod provider_trait;

pub use gcm::{GcmProvider, GCM_ENDPOINT};
pub use mock::MockProvider;
pub use mpns::MpnsProvider;
pub use provider_trait::PushProvider;
