//! One navigation end to end: generate, resolve images, render, publish,
//! extend the lineage, schedule the screenshot, and remember the visit.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use altnet_content::html::extract_title;
use altnet_content::{pack_content, parse_generated_output, unpack_content, ContentParts};
use altnet_core::address::{normalize, strip_scheme};
use altnet_core::{
    now_millis, AssetResolver, ExplorationId, Generator, HistoryStore, NewVisit, NodeId, PageRecord, RecordId,
    ScreenshotCapturer, Store, Visit, VisitId,
};
use altnet_render::{
    host_action, insert_placeholders, recover_pending, render_page, resolve_images, BridgeMessage, HostAction,
    ImageStats, RenderHandle, RenderMode, RenderTarget, RenderedView,
};

use crate::error::{EngineError, NavigateError};
use crate::feed::FeedCaches;
use crate::history::BrowsingHistory;
use crate::lineage::{record_navigation, LineageOutcome, LineageStep, ParentLink, StepKind};
use crate::prompts::{system_prompt, user_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::publish::{PageDraft, Publication, PublishConfig, Publisher};
use crate::screenshot::{spawn_backfill, BackfillJob, DEFAULT_CAPTURE_TIMEOUT};
use crate::session::{HistoryEntry, Session};

/// What to do when the address already has a published page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Show the newest existing page.
    #[default]
    Reuse,
    /// Generate anyway and store under a `~N` suffix.
    Regenerate,
}

#[derive(Clone, Debug)]
pub struct NavigatorConfig {
    pub system_prompt: String,
    pub tonal_modifiers: bool,
    pub images_per_page: usize,
    pub image_timeout: Duration,
    pub screenshot_timeout: Duration,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            tonal_modifiers: true,
            images_per_page: 2,
            image_timeout: Duration::from_secs(60),
            screenshot_timeout: DEFAULT_CAPTURE_TIMEOUT,
            duplicate_policy: DuplicatePolicy::Reuse,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NavigateOptions {
    /// Followed from a link on the current page.
    pub follow: bool,
    /// Overrides the configured duplicate policy.
    pub duplicate_policy: Option<DuplicatePolicy>,
}

impl NavigateOptions {
    pub fn follow() -> Self {
        Self { follow: true, duplicate_policy: None }
    }
}

/// Progress notifications for front-ends.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    Started { address: String },
    Rendered { address: String, mode: RenderMode },
    Published { record_id: RecordId, url: String },
    LineageRecorded { exploration_id: ExplorationId, node_id: NodeId },
    Restored { address: String, record_id: RecordId },
    Revisited { address: String, visit_id: VisitId },
    Failed { address: String, message: String },
}

#[derive(Debug)]
pub enum NavigationOutcome {
    Generated {
        address: String,
        handle: RenderHandle,
        view: RenderedView,
        images: ImageStats,
        publication: Option<Publication>,
        lineage: Option<LineageOutcome>,
        screenshot: Option<JoinHandle<Option<String>>>,
        visit: Option<VisitId>,
    },
    Restored {
        record: PageRecord,
        handle: RenderHandle,
        view: RenderedView,
    },
    /// A page reopened from the browsing history.
    Revisited {
        visit: Visit,
        handle: RenderHandle,
        view: RenderedView,
    },
}

impl NavigationOutcome {
    pub fn handle(&self) -> RenderHandle {
        match self {
            Self::Generated { handle, .. } | Self::Restored { handle, .. } | Self::Revisited { handle, .. } => *handle,
        }
    }

    pub fn view(&self) -> &RenderedView {
        match self {
            Self::Generated { view, .. } | Self::Restored { view, .. } | Self::Revisited { view, .. } => view,
        }
    }
}

/// Collaborators a navigator talks to.
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub assets: Arc<dyn AssetResolver>,
    pub store: Arc<dyn Store>,
    pub target: Arc<dyn RenderTarget>,
    pub screenshots: Option<Arc<dyn ScreenshotCapturer>>,
    pub history: Option<Arc<dyn HistoryStore>>,
}

pub struct Navigator {
    generator: Arc<dyn Generator>,
    assets: Arc<dyn AssetResolver>,
    store: Arc<dyn Store>,
    target: Arc<dyn RenderTarget>,
    screenshots: Option<Arc<dyn ScreenshotCapturer>>,
    history: Option<BrowsingHistory>,
    publisher: Publisher,
    config: NavigatorConfig,
    events: broadcast::Sender<NavigationEvent>,
}

impl Navigator {
    pub fn new(
        collaborators: Collaborators,
        caches: Arc<FeedCaches>,
        config: NavigatorConfig,
        publish: PublishConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            publisher: Publisher::new(Arc::clone(&collaborators.store), caches, publish),
            generator: collaborators.generator,
            assets: collaborators.assets,
            store: collaborators.store,
            target: collaborators.target,
            screenshots: collaborators.screenshots,
            history: collaborators.history.map(BrowsingHistory::new),
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: NavigationEvent) {
        let _ = self.events.send(event);
    }

    pub fn history(&self) -> Option<&BrowsingHistory> {
        self.history.as_ref()
    }

    /// Navigate to `address`.
    ///
    /// Only a generation or render failure aborts; publishing, lineage,
    /// image and screenshot failures are logged and skipped.
    #[instrument(skip(self, session), fields(follow = options.follow))]
    pub async fn navigate(
        &self,
        session: &mut Session,
        address: &str,
        options: NavigateOptions,
    ) -> Result<NavigationOutcome, NavigateError> {
        let address = strip_scheme(address.trim()).trim().to_string();
        if address.is_empty() {
            return Err(NavigateError::EmptyAddress);
        }
        self.emit(NavigationEvent::Started { address: address.clone() });

        let existing = self.newest_record(&address).await;
        let policy = options.duplicate_policy.unwrap_or(self.config.duplicate_policy);
        if let (Some(record), DuplicatePolicy::Reuse) = (&existing, policy) {
            debug!(record_id = %record.id, "address already published, reusing");
            let outcome = self.restore(session, record.clone()).await?;
            self.remember(NewVisit {
                address: address.clone(),
                title: record.display_title().to_string(),
                packed_content: record.packed_content.clone(),
                model_id: record.model_id.clone(),
                timestamp: now_millis(),
                record_id: Some(record.id.clone()),
                exploration_id: record.exploration_id.clone(),
            })
            .await;
            return Ok(outcome);
        }

        let parent = if options.follow { session.parent_link() } else { None };
        if parent.is_none() {
            let tone = if self.config.tonal_modifiers {
                self.generator.tonal_modifier(&address).await
            } else {
                None
            };
            session.set_tonal_modifier(tone);
        }

        let raw = match self
            .generator
            .generate(
                &system_prompt(&self.config.system_prompt, session.tonal_modifier()),
                &user_prompt(&address),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "generation failed");
                let err = NavigateError::Generation(e);
                self.emit(NavigationEvent::Failed { address: address.clone(), message: err.banner() });
                return Err(err);
            }
        };

        let parsed = parse_generated_output(&raw);
        let (html, prompts) = insert_placeholders(&parsed.html);
        let (html, images) = resolve_images(
            &html,
            &prompts,
            self.assets.as_ref(),
            self.config.images_per_page,
            self.config.image_timeout,
        )
        .await;
        let parts = ContentParts { html, ..parsed };

        let view = render_page(&parts);
        let title = match extract_title(&parts.html) {
            t if t.is_empty() => address.clone(),
            t => t,
        };
        let handle = self.target.mount(&title, &view)?;
        self.emit(NavigationEvent::Rendered { address: address.clone(), mode: view.mode });

        let packed = pack_content(&parts.html, &parts.css, &parts.js);
        session.push(HistoryEntry {
            address: address.clone(),
            packed_content: packed.clone(),
            record_id: None,
            exploration_id: None,
        });

        let publication = if self.publisher.config().enabled {
            self.publish(session, &address, existing.is_some(), &parts).await
        } else {
            None
        };

        let lineage = match &publication {
            Some(publication) => self.extend_lineage(session, &address, parent.as_ref(), publication).await,
            None => None,
        };

        let screenshot = match (&self.screenshots, &publication) {
            (Some(capturer), Some(publication)) => Some(spawn_backfill(
                Arc::clone(&self.store),
                Arc::clone(capturer),
                BackfillJob {
                    document: view.document.clone().unwrap_or_else(|| view.markup.clone()),
                    record_id: publication.record_id.clone(),
                    exploration_id: lineage.as_ref().map(|l| l.exploration_id.clone()),
                    timeout: self.config.screenshot_timeout,
                },
            )),
            _ => None,
        };

        let visit = self
            .remember(NewVisit {
                address: address.clone(),
                title,
                packed_content: packed,
                model_id: self.generator.model().to_string(),
                timestamp: publication.as_ref().map_or_else(now_millis, |p| p.timestamp),
                record_id: publication.as_ref().map(|p| p.record_id.clone()),
                exploration_id: lineage.as_ref().map(|l| l.exploration_id.clone()),
            })
            .await;

        info!(address = %address, mode = ?view.mode, images = images.resolved, "navigation complete");
        Ok(NavigationOutcome::Generated {
            address,
            handle,
            view,
            images,
            publication,
            lineage,
            screenshot,
            visit,
        })
    }

    async fn remember(&self, visit: NewVisit) -> Option<VisitId> {
        let history = self.history.as_ref()?;
        match history.record(visit).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "history update failed");
                None
            }
        }
    }

    async fn newest_record(&self, address: &str) -> Option<PageRecord> {
        match self.store.records_by_url(&normalize(address)).await {
            Ok(records) => records.into_iter().next(),
            Err(e) => {
                warn!(error = %e, "duplicate check failed");
                None
            }
        }
    }

    async fn publish(
        &self,
        session: &mut Session,
        address: &str,
        already_published: bool,
        parts: &ContentParts,
    ) -> Option<Publication> {
        let storage_url = self.publisher.storage_url(address, already_published).await;
        let draft = PageDraft {
            address,
            storage_url: &storage_url,
            parts,
            model_id: self.generator.model(),
        };
        match self.publisher.publish(draft).await {
            Ok(publication) => {
                session.attach_record(publication.record_id.clone());
                self.emit(NavigationEvent::Published {
                    record_id: publication.record_id.clone(),
                    url: publication.url.clone(),
                });
                Some(publication)
            }
            Err(e) => {
                warn!(error = %e, "publish failed");
                None
            }
        }
    }

    async fn extend_lineage(
        &self,
        session: &mut Session,
        address: &str,
        parent: Option<&ParentLink>,
        publication: &Publication,
    ) -> Option<LineageOutcome> {
        let url = normalize(address);
        let tone = session.tonal_modifier().map(str::to_string);
        let step = LineageStep {
            record_id: &publication.record_id,
            url: &url,
            title: &publication.title,
            packed_content: &publication.packed_content,
            parent,
            tonal_modifier: tone.as_deref(),
            author_name: &self.publisher.config().author_name,
            author_id: None,
            timestamp: publication.timestamp,
        };
        match record_navigation(self.store.as_ref(), step).await {
            Ok(outcome) => {
                session.record_lineage(&outcome);
                if outcome.kind == StepKind::OrphanChild {
                    debug!(exploration_id = %outcome.exploration_id, "child attached to root");
                }
                self.emit(NavigationEvent::LineageRecorded {
                    exploration_id: outcome.exploration_id.clone(),
                    node_id: outcome.node_id.clone(),
                });
                Some(outcome)
            }
            Err(e) => {
                warn!(error = %e, "lineage update failed");
                None
            }
        }
    }

    /// Render stored content, resolving any placeholders left pending.
    async fn render_stored(&self, title: &str, packed: &str) -> Result<(RenderHandle, RenderedView), NavigateError> {
        let mut parts = unpack_content(packed);
        let pending = recover_pending(&parts.html);
        if !pending.is_empty() {
            let (html, _) = resolve_images(
                &parts.html,
                &pending,
                self.assets.as_ref(),
                self.config.images_per_page,
                self.config.image_timeout,
            )
            .await;
            parts.html = html;
        }
        let view = render_page(&parts);
        let handle = self.target.mount(title, &view)?;
        Ok((handle, view))
    }

    async fn restore(&self, session: &mut Session, record: PageRecord) -> Result<NavigationOutcome, NavigateError> {
        let (handle, view) = self.render_stored(record.display_title(), &record.packed_content).await?;
        session.push(HistoryEntry {
            address: record.url.clone(),
            packed_content: record.packed_content.clone(),
            record_id: Some(record.id.clone()),
            exploration_id: record.exploration_id.clone(),
        });
        session.adopt(record.id.clone(), record.exploration_id.clone());
        self.emit(NavigationEvent::Restored { address: record.url.clone(), record_id: record.id.clone() });
        Ok(NavigationOutcome::Restored { record, handle, view })
    }

    /// Show a published record, e.g. a feed card.
    #[instrument(skip(self, session))]
    pub async fn open_record(&self, session: &mut Session, id: &RecordId) -> Result<NavigationOutcome, EngineError> {
        let record = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("record {id}")))?;
        Ok(self.restore(session, record).await?)
    }

    /// Reopen a page from the browsing history. Cached content is shown as
    /// stored; a visit with no content is navigated to afresh.
    #[instrument(skip(self, session))]
    pub async fn open_visit(&self, session: &mut Session, id: &VisitId) -> Result<NavigationOutcome, EngineError> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| EngineError::NotFound("browsing history".into()))?;
        let visit = history
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("visit {id}")))?;
        if visit.packed_content.trim().is_empty() {
            debug!(address = %visit.address, "visit has no cached content, navigating");
            return Ok(self.navigate(session, &visit.address, NavigateOptions::default()).await?);
        }

        let (handle, view) = self.render_stored(visit.display_title(), &visit.packed_content).await?;
        session.push(HistoryEntry {
            address: visit.address.clone(),
            packed_content: visit.packed_content.clone(),
            record_id: visit.record_id.clone(),
            exploration_id: visit.exploration_id.clone(),
        });
        if let Some(record_id) = &visit.record_id {
            session.adopt(record_id.clone(), visit.exploration_id.clone());
        }
        self.emit(NavigationEvent::Revisited { address: visit.address.clone(), visit_id: visit.id.clone() });
        Ok(NavigationOutcome::Revisited { visit, handle, view })
    }

    /// Step back through the session history without regenerating.
    pub async fn back(&self, session: &mut Session) -> Result<Option<RenderHandle>, NavigateError> {
        let Some(entry) = session.back().cloned() else {
            return Ok(None);
        };
        let (handle, _) = self.render_stored(&entry.address, &entry.packed_content).await?;
        Ok(Some(handle))
    }

    pub async fn forward(&self, session: &mut Session) -> Result<Option<RenderHandle>, NavigateError> {
        let Some(entry) = session.forward().cloned() else {
            return Ok(None);
        };
        let (handle, _) = self.render_stored(&entry.address, &entry.packed_content).await?;
        Ok(Some(handle))
    }

    /// Act on a message posted by an isolated page. Link clicks become
    /// link-follow navigations; resizes go to the render target.
    pub async fn handle_bridge_message(
        &self,
        session: &mut Session,
        handle: RenderHandle,
        raw: &str,
    ) -> Result<Option<NavigationOutcome>, NavigateError> {
        let Some(action) = BridgeMessage::from_json(raw).as_ref().and_then(host_action) else {
            return Ok(None);
        };
        match action {
            HostAction::Navigate(address) => {
                let outcome = self.navigate(session, &address, NavigateOptions::follow()).await?;
                Ok(Some(outcome))
            }
            HostAction::Resize(height) => {
                self.target.resize(handle, height)?;
                Ok(None)
            }
        }
    }
}
