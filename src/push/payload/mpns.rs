use super::xml::{XmlDocument, XmlElement};
use super::{check_size, unsupported, EncodedPayload, PayloadHandler};
use crate::error::Result;
use crate::push::message::{Message, MpnsKind, MpnsTile, MpnsToast};
use crate::push::types::PushVendor;

const WP_NAMESPACE: &str = "WPNotification";

/// MPNS Payload Handler
///
/// 文档与接收者无关，整条消息只编码一次
pub struct MpnsPayloadHandler;

impl MpnsPayloadHandler {
    fn toast_elements(toast: &MpnsToast) -> XmlElement {
        let fields = [
            ("wp:Text1", &toast.text1),
            ("wp:Text2", &toast.text2),
            ("wp:Param", &toast.param),
        ];
        XmlElement::new("wp:Toast").children(
            fields
                .into_iter()
                .filter_map(|(name, value)| value.as_ref().map(|v| XmlElement::with_text(name, v))),
        )
    }

    fn tile_elements(tile: &MpnsTile) -> XmlElement {
        let count = tile.count.map(|c| c.to_string());
        let fields = [
            ("wp:BackgroundImage", &tile.background_image),
            ("wp:Count", &count),
            ("wp:Title", &tile.title),
            ("wp:BackBackgroundImage", &tile.back_background_image),
            ("wp:BackTitle", &tile.back_title),
            ("wp:BackContent", &tile.back_content),
        ];
        XmlElement::new("wp:Tile").children(
            fields
                .into_iter()
                .filter_map(|(name, value)| value.as_ref().map(|v| XmlElement::with_text(name, v))),
        )
    }
}

impl PayloadHandler for MpnsPayloadHandler {
    fn vendor(&self) -> PushVendor {
        PushVendor::Mpns
    }

    fn encode(&self, message: &Message) -> Result<EncodedPayload> {
        let Message::Mpns(mpns) = message else {
            return Err(unsupported(self.vendor(), message));
        };

        let body = match &mpns.kind {
            MpnsKind::Raw(elements) => XmlElement::new("root").children(elements.iter().cloned()),
            MpnsKind::Toast(toast) => Self::toast_elements(toast),
            MpnsKind::Tile(tile) => Self::tile_elements(tile),
        };
        let root = XmlElement::new("wp:Notification")
            .attribute("xmlns:wp", WP_NAMESPACE)
            .child(body);

        let encoded = EncodedPayload::Xml {
            document: XmlDocument::new(root),
            target: mpns.kind.target(),
            notification_class: mpns.kind.notification_class(),
        };
        check_size(self.vendor(), &encoded)?;
        Ok(encoded)
    }
}
