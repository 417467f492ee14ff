use serde_json::{Map, Value};

use super::{check_size, unsupported, EncodedPayload, PayloadHandler};
use crate::error::{PushError, Result};
use crate::push::message::{ApnsAlertValue, ApnsMessage, Message};
use crate::push::types::PushVendor;

/// APNs Payload Handler
///
/// 输出 `{"aps": {...}, <custom>...}`；布尔标志以整数 1 表示，false 时省略
pub struct ApnsPayloadHandler;

impl ApnsPayloadHandler {
    fn build_aps(message: &ApnsMessage) -> Result<Map<String, Value>> {
        let mut aps = Map::new();

        match &message.alert {
            Some(ApnsAlertValue::Text(text)) => {
                aps.insert("alert".to_string(), Value::String(text.clone()));
            }
            Some(ApnsAlertValue::Dictionary(dict)) => {
                aps.insert("alert".to_string(), serde_json::to_value(dict)?);
            }
            None => {}
        }
        if let Some(badge) = message.badge {
            aps.insert("badge".to_string(), Value::from(badge));
        }
        if let Some(sound) = &message.sound {
            aps.insert("sound".to_string(), Value::String(sound.clone()));
        }
        if let Some(category) = &message.category {
            aps.insert("category".to_string(), Value::String(category.clone()));
        }
        if message.content_available {
            aps.insert("content-available".to_string(), Value::from(1));
        }
        if message.mutable_content {
            aps.insert("mutable-content".to_string(), Value::from(1));
        }
        if !message.url_args.is_empty() {
            aps.insert(
                "url-args".to_string(),
                Value::Array(message.url_args.iter().cloned().map(Value::String).collect()),
            );
        }

        Ok(aps)
    }
}

impl PayloadHandler for ApnsPayloadHandler {
    fn vendor(&self) -> PushVendor {
        PushVendor::Apns
    }

    fn per_recipient(&self) -> bool {
        true
    }

    fn encode(&self, message: &Message) -> Result<EncodedPayload> {
        let Message::Apns(apns) = message else {
            return Err(unsupported(self.vendor(), message));
        };

        let mut payload = Map::new();
        payload.insert("aps".to_string(), Value::Object(Self::build_aps(apns)?));

        for (key, value) in &apns.custom_data {
            if key == "aps" {
                return Err(PushError::InvalidArgument(
                    "custom payload data cannot use the reserved key 'aps'".to_string(),
                ));
            }
            payload.insert(key.clone(), value.clone());
        }

        let encoded = EncodedPayload::Json(Value::Object(payload));
        check_size(self.vendor(), &encoded)?;
        Ok(encoded)
    }
}
