//! Lineage reconstruction, listing caches, publishing, browsing history, and
//! the navigation flow that ties them together.

pub mod cache;
pub mod error;
pub mod feed;
pub mod history;
pub mod lineage;
pub mod navigator;
pub mod prompts;
pub mod publish;
pub mod screenshot;
pub mod session;

pub use cache::{KeyedTtlCache, TtlCache, DEFAULT_TTL};
pub use error::{EngineError, NavigateError};
pub use feed::{FeedCaches, FeedConfig, FeedService, FeedView, WelcomeListing};
pub use history::{trim_for_history, BrowsingHistory, MAX_VISIT_HTML_CHARS};
pub use lineage::{
    deduplicate, record_navigation, scrubber_key, scrubber_tree, virtual_reconstruct, LineageOutcome, LineageState,
    LineageStep, ParentLink, StepKind,
};
pub use navigator::{
    Collaborators, DuplicatePolicy, NavigateOptions, NavigationEvent, NavigationOutcome, Navigator, NavigatorConfig,
};
pub use prompts::DEFAULT_SYSTEM_PROMPT;
pub use publish::{PageDraft, Publication, PublishConfig, Publisher};
pub use screenshot::{accept_screenshot, backfill, spawn_backfill, BackfillJob};
pub use session::{HistoryEntry, Session};
