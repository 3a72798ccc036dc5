//! Displaying generated pages: inline under a namespaced container, or as an
//! isolated document that reports back over a two-message bridge.

pub mod bridge;
pub mod document;
pub mod images;
pub mod target;
pub mod view;

pub use bridge::{host_action, BridgeMessage, HostAction};
pub use images::{insert_placeholders, recover_pending, resolve_images, ImagePrompt, ImageStats};
pub use target::{FileTarget, RecordingTarget, RenderError, RenderHandle, RenderTarget};
pub use view::{render_page, RenderMode, RenderedView};
