//! HTTP adapters for the generation and image-asset collaborators, plus
//! deterministic doubles for tests.

pub mod assets;
pub mod chat;
pub mod generator;
pub mod tonal;

pub mod mock;

pub use assets::{AssetConfig, HttpAssetResolver};
pub use generator::{GeneratorConfig, HttpGenerator};
pub use mock::{MockAssets, MockGenerator, MockReply, MockScreenshots};
pub use tonal::clean_tonal_modifier;
