use serde_json::{Map, Value};

use super::{check_size, unsupported, EncodedPayload, PayloadHandler};
use crate::error::{PushError, Result};
use crate::push::message::gcm::GCM_MAX_TIME_TO_LIVE;
use crate::push::message::Message;
use crate::push::types::PushVendor;

/// GCM Payload Handler
///
/// 输出 GCM HTTP 接口的请求体，`registration_ids` 按接收者顺序排列，
/// 响应里的 `results` 与之一一对应
pub struct GcmPayloadHandler;

impl PayloadHandler for GcmPayloadHandler {
    fn vendor(&self) -> PushVendor {
        PushVendor::Gcm
    }

    fn encode(&self, message: &Message) -> Result<EncodedPayload> {
        let Message::Gcm(gcm) = message else {
            return Err(unsupported(self.vendor(), message));
        };

        let mut body = Map::new();
        body.insert(
            "registration_ids".to_string(),
            Value::Array(
                message
                    .recipients()
                    .iter()
                    .map(|r| Value::String(r.identifier().to_string()))
                    .collect(),
            ),
        );
        if let Some(collapse_key) = &gcm.collapse_key {
            body.insert("collapse_key".to_string(), Value::String(collapse_key.clone()));
        }
        if gcm.delay_while_idle {
            body.insert("delay_while_idle".to_string(), Value::Bool(true));
        }
        if let Some(ttl) = gcm.time_to_live {
            if ttl > GCM_MAX_TIME_TO_LIVE {
                return Err(PushError::InvalidArgument(format!(
                    "time_to_live {} exceeds maximum of {} seconds",
                    ttl, GCM_MAX_TIME_TO_LIVE
                )));
            }
            body.insert("time_to_live".to_string(), Value::from(ttl));
        }
        if let Some(name) = &gcm.restricted_package_name {
            body.insert("restricted_package_name".to_string(), Value::String(name.clone()));
        }
        if gcm.dry_run {
            body.insert("dry_run".to_string(), Value::Bool(true));
        }
        if !gcm.data.is_empty() {
            body.insert("data".to_string(), Value::Object(gcm.data.clone()));
        }

        let encoded = EncodedPayload::Json(Value::Object(body));
        check_size(self.vendor(), &encoded)?;
        Ok(encoded)
    }
}
