//! Generated page content: parsing model output, style scoping, the packed
//! storage form, and the text heuristics used to compare two pages.

pub mod codec;
pub mod diff;
pub mod html;
pub mod packed;
pub mod styles;

pub use codec::{parse_generated_output, ContentParts};
pub use diff::{compute_content_delta, extract_new_concepts};
pub use packed::{pack_bounded, pack_content, unpack_content, wrap_legacy};
pub use styles::{scope_styles, NAMESPACE_CLASS};
