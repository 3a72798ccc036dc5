//! Messages from an isolated page back to its host.
//!
//! The isolated document can only talk to the host through `postMessage`.
//! Exactly two shapes are understood; anything else is dropped.

use altnet_core::address::strip_scheme;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Script injected ahead of author js in every isolated document. It posts
/// `navigate` for anchor clicks and `resize` when the body height changes.
pub const BRIDGE_SCRIPT: &str = concat!(
    "(function(){",
    "function post(m){window.parent.postMessage(m,\"*\");}",
    "var last=-1;",
    "new ResizeObserver(function(){var h=document.body.scrollHeight;",
    "if(h!==last){last=h;post({type:\"resize\",height:h});}}).observe(document.body);",
    "document.addEventListener(\"click\",function(e){",
    "var a=e.target&&e.target.closest?e.target.closest(\"a[href]\"):null;",
    "if(a){e.preventDefault();post({type:\"navigate\",href:a.getAttribute(\"href\")});}",
    "},true);",
    "})();"
);

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeMessage {
    Navigate { href: String },
    Resize { height: f64 },
}

impl BridgeMessage {
    /// Decode a posted message. Unknown or malformed shapes yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match Self::deserialize(value) {
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!(error = %e, "ignoring unrecognised bridge message");
                None
            }
        }
    }

    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|value| Self::from_value(&value))
    }
}

/// What the host should do in response to a bridge message.
#[derive(Clone, Debug, PartialEq)]
pub enum HostAction {
    /// Navigate to this address, scheme already stripped.
    Navigate(String),
    /// Set the frame height in pixels.
    Resize(f64),
}

/// Host-side handling of a decoded message.
pub fn host_action(message: &BridgeMessage) -> Option<HostAction> {
    match message {
        BridgeMessage::Navigate { href } => {
            let target = strip_scheme(href.trim());
            if target.is_empty() {
                None
            } else {
                Some(HostAction::Navigate(target.to_string()))
            }
        }
        BridgeMessage::Resize { height } if height.is_finite() && *height >= 0.0 => {
            Some(HostAction::Resize(*height))
        }
        BridgeMessage::Resize { height } => {
            debug!(height, "ignoring invalid frame height");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_navigate_and_resize() {
        assert_eq!(
            BridgeMessage::from_value(&json!({"type": "navigate", "href": "altnet://a/b"})),
            Some(BridgeMessage::Navigate { href: "altnet://a/b".into() })
        );
        assert_eq!(
            BridgeMessage::from_value(&json!({"type": "resize", "height": 640})),
            Some(BridgeMessage::Resize { height: 640.0 })
        );
    }

    #[test]
    fn ignores_other_shapes() {
        assert!(BridgeMessage::from_value(&json!({"type": "eval", "code": "x"})).is_none());
        assert!(BridgeMessage::from_value(&json!({"type": "navigate"})).is_none());
        assert!(BridgeMessage::from_value(&json!({"type": "resize", "height": "tall"})).is_none());
        assert!(BridgeMessage::from_value(&json!("navigate")).is_none());
        assert!(BridgeMessage::from_json("not json").is_none());
    }

    #[test]
    fn navigate_strips_scheme() {
        let msg = BridgeMessage::from_json(r#"{"type":"navigate","href":"altnet://wiki.alt/Cats"}"#).unwrap();
        assert_eq!(host_action(&msg), Some(HostAction::Navigate("wiki.alt/Cats".into())));

        let legacy = BridgeMessage::Navigate { href: "alt://news.alt".into() };
        assert_eq!(host_action(&legacy), Some(HostAction::Navigate("news.alt".into())));

        let plain = BridgeMessage::Navigate { href: "plain/path".into() };
        assert_eq!(host_action(&plain), Some(HostAction::Navigate("plain/path".into())));
    }

    #[test]
    fn empty_navigate_is_ignored() {
        assert_eq!(host_action(&BridgeMessage::Navigate { href: "altnet://".into() }), None);
    }

    #[test]
    fn bad_heights_are_ignored() {
        assert_eq!(host_action(&BridgeMessage::Resize { height: -4.0 }), None);
        assert_eq!(host_action(&BridgeMessage::Resize { height: f64::NAN }), None);
        assert_eq!(host_action(&BridgeMessage::Resize { height: f64::INFINITY }), None);
        assert_eq!(host_action(&BridgeMessage::Resize { height: 0.0 }), Some(HostAction::Resize(0.0)));
    }

    #[test]
    fn bridge_script_posts_both_shapes() {
        assert!(BRIDGE_SCRIPT.contains("type:\"navigate\""));
        assert!(BRIDGE_SCRIPT.contains("type:\"resize\""));
        assert!(!BRIDGE_SCRIPT.to_ascii_lowercase().contains("</script"));
    }
}
