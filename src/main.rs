use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use altnet_core::{ExplorationId, ExplorationTree, HistoryStore, Node, PageRecord, RecordId, Store, Visit, VisitId};
use altnet_engine::{
    BrowsingHistory, Collaborators, DuplicatePolicy, FeedCaches, FeedConfig, FeedService, NavigateOptions,
    NavigationOutcome, Navigator, NavigatorConfig, PublishConfig, Session, DEFAULT_SYSTEM_PROMPT,
};
use altnet_llm::{AssetConfig, GeneratorConfig, HttpAssetResolver, HttpGenerator};
use altnet_render::FileTarget;
use altnet_settings::AltnetSettings;
use altnet_store::{MemoryStore, SqliteStore};
use altnet_telemetry::{init_telemetry, parse_level, TelemetryConfig};

#[derive(Parser)]
#[command(name = "altnet", version, about = "Browse the alternate internet")]
struct Cli {
    /// Settings file to use instead of ~/.altnet/settings.json.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Keep everything in memory for this run.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate (or reuse) the page at an address.
    Navigate {
        address: String,
        /// Follow a link from this published record.
        #[arg(long)]
        parent: Option<String>,
        /// Lineage of the parent record, when the record has none yet.
        #[arg(long, requires = "parent")]
        exploration: Option<String>,
        /// Generate even if the address was already published.
        #[arg(long)]
        regenerate: bool,
        #[arg(long, default_value = "altnet-page.html")]
        out: PathBuf,
    },
    /// Recent pages grouped by lineage.
    Feed {
        #[arg(long)]
        refresh: bool,
    },
    /// One card per lineage.
    Welcome,
    /// Print a lineage tree.
    Lineage { exploration_id: String },
    /// Render a published record to a file.
    Show {
        record_id: String,
        #[arg(long, default_value = "altnet-page.html")]
        out: PathBuf,
    },
    /// Pages visited on this machine, newest first.
    History {
        /// Forget every visit.
        #[arg(long, conflicts_with_all = ["delete", "open"])]
        clear: bool,
        /// Forget one visit.
        #[arg(long, conflicts_with = "open")]
        delete: Option<String>,
        /// Show a visit again without regenerating it.
        #[arg(long)]
        open: Option<String>,
        #[arg(long, default_value = "altnet-page.html")]
        out: PathBuf,
    },
}

/// Published pages and the local history share one backend.
struct Stores {
    pages: Arc<dyn Store>,
    history: Arc<dyn HistoryStore>,
}

fn telemetry_config(settings: &AltnetSettings) -> TelemetryConfig {
    TelemetryConfig {
        log_level: parse_level(&settings.logging.level).unwrap_or(tracing::Level::WARN),
        module_levels: settings
            .logging
            .modules
            .iter()
            .filter_map(|(module, level)| parse_level(level).map(|l| (module.clone(), l)))
            .collect(),
        json: settings.logging.json,
    }
}

fn open_store(settings: &AltnetSettings, ephemeral: bool) -> anyhow::Result<Stores> {
    if ephemeral {
        let store = Arc::new(MemoryStore::new());
        return Ok(Stores { pages: store.clone(), history: store });
    }
    let path = altnet_settings::store_path(settings);
    let store = SqliteStore::open(&path).with_context(|| format!("opening store at {}", path.display()))?;
    tracing::info!(path = %path.display(), "store opened");
    let store = Arc::new(store);
    Ok(Stores { pages: store.clone(), history: store })
}

fn feed_service(settings: &AltnetSettings, store: Arc<dyn Store>, caches: Arc<FeedCaches>) -> FeedService {
    let feed = &settings.feed;
    FeedService::new(
        store,
        caches,
        FeedConfig {
            limit: feed.limit,
            welcome_limit: feed.welcome_limit,
            not_ready_retry: Duration::from_millis(feed.not_ready_retry_ms),
            not_ready_attempts: feed.not_ready_attempts as usize,
        },
    )
}

fn navigator(
    settings: &AltnetSettings,
    stores: &Stores,
    caches: Arc<FeedCaches>,
    out: PathBuf,
) -> anyhow::Result<Navigator> {
    let g = &settings.generator;
    let generator = HttpGenerator::new(GeneratorConfig {
        endpoint: g.endpoint.clone(),
        model: g.model.clone(),
        tonal_model: g.tonal_model.clone(),
        api_key: g.api_key.clone().map(SecretString::from),
        temperature: g.temperature,
        max_tokens: g.max_tokens,
        request_timeout: Duration::from_secs(g.request_timeout_secs),
    })?;

    let a = &settings.assets;
    let assets = HttpAssetResolver::new(AssetConfig {
        primary_base: a.primary_base.clone(),
        fallback_base: a.fallback_base.clone(),
        model: a.model.clone(),
        width: a.width,
        height: a.height,
        api_key: a.api_key.clone().or_else(|| g.api_key.clone()).map(SecretString::from),
        request_timeout: Duration::from_secs(a.timeout_secs),
    })?;

    let config = NavigatorConfig {
        system_prompt: g.system_prompt.clone().unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        tonal_modifiers: g.tonal_modifiers,
        images_per_page: a.images_per_page,
        image_timeout: Duration::from_secs(a.timeout_secs),
        screenshot_timeout: Duration::from_secs(settings.screenshots.timeout_secs),
        duplicate_policy: match settings.publish.duplicate_policy {
            altnet_settings::DuplicatePolicy::Reuse => DuplicatePolicy::Reuse,
            altnet_settings::DuplicatePolicy::Regenerate => DuplicatePolicy::Regenerate,
        },
    };
    let publish = PublishConfig {
        enabled: settings.publish.enabled,
        author_name: settings.publish.author_name.clone(),
        max_packed_bytes: settings.publish.max_packed_bytes,
    };

    Ok(Navigator::new(
        Collaborators {
            generator: Arc::new(generator),
            assets: Arc::new(assets),
            store: Arc::clone(&stores.pages),
            target: Arc::new(FileTarget::new(out)),
            // No headless capturer is bundled with the CLI.
            screenshots: None,
            history: Some(Arc::clone(&stores.history)),
        },
        caches,
        config,
        publish,
    ))
}

fn print_record(record: &PageRecord) {
    let lineage = record.exploration_id.as_ref().map(ExplorationId::as_str).unwrap_or("-");
    println!("{}  {:<40}  {}  [{}]", record.id, record.url, record.display_title(), lineage);
}

fn print_visit(visit: &Visit) {
    let record = visit.record_id.as_ref().map(RecordId::as_str).unwrap_or("-");
    println!("{}  {:<40}  {}  [{}]", visit.id, visit.address, visit.display_title(), record);
}

fn print_tree(tree: &ExplorationTree) {
    println!("{}  {}  by {}", tree.exploration_id, tree.root_url, tree.author_name);
    if let Some(tone) = &tree.tonal_modifier {
        println!("tone: {tone}");
    }
    let nodes = tree.nodes_chronological();
    if let Some(root) = tree.root() {
        print_node(root, &nodes, 0);
    }
}

fn print_node(node: &Node, all: &[&Node], depth: usize) {
    let concepts = if node.concepts.is_empty() {
        String::new()
    } else {
        format!("  +{}", node.concepts.join(", "))
    };
    println!("{}{}  {}  (diff {}){}", "  ".repeat(depth + 1), node.url, node.title, node.diff_size, concepts);
    for child in all.iter().filter(|n| n.parent_node_id.as_ref() == Some(&node.id)) {
        print_node(child, all, depth + 1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => altnet_settings::load_settings_from_path(path)?,
        None => altnet_settings::load_settings()?,
    };
    init_telemetry(&telemetry_config(&settings));

    let stores = open_store(&settings, cli.ephemeral)?;
    let caches = Arc::new(FeedCaches::new(Duration::from_secs(settings.feed.cache_ttl_secs)));

    match cli.command {
        Command::Navigate { address, parent, exploration, regenerate, out } => {
            let navigator = navigator(&settings, &stores, caches, out.clone())?;
            let mut session = Session::new();
            let mut options = NavigateOptions::default();
            if let Some(parent) = parent {
                let parent = RecordId::from_raw(parent);
                let opened = navigator.open_record(&mut session, &parent).await?;
                if let (Some(exploration), NavigationOutcome::Restored { record, .. }) = (exploration, &opened) {
                    session.adopt(record.id.clone(), Some(ExplorationId::from_raw(exploration)));
                }
                options.follow = true;
            }
            if regenerate {
                options.duplicate_policy = Some(DuplicatePolicy::Regenerate);
            }

            let outcome = match navigator.navigate(&mut session, &address, options).await {
                Ok(outcome) => outcome,
                Err(e) => bail!(e.banner()),
            };
            match outcome {
                NavigationOutcome::Generated { publication, lineage, images, .. } => {
                    match publication {
                        Some(p) => println!("published {} as {} ({})", p.record_id, p.url, p.title),
                        None => println!("generated {address} (not published)"),
                    }
                    if let Some(l) = lineage {
                        println!("lineage {} node {}", l.exploration_id, l.node_id);
                    }
                    if images.failed > 0 {
                        eprintln!("{} of {} images failed", images.failed, images.resolved + images.failed);
                    }
                }
                NavigationOutcome::Restored { record, .. } => {
                    println!("showing existing page {} (use --regenerate for a new one)", record.id);
                }
                NavigationOutcome::Revisited { visit, .. } => println!("showing remembered page {}", visit.id),
            }
            println!("wrote {}", out.display());
        }
        Command::Feed { refresh } => {
            let feed = feed_service(&settings, Arc::clone(&stores.pages), caches);
            let view = feed.explorations(refresh).await;
            if let Some(notice) = &view.notice {
                eprintln!("{notice}");
            }
            for tree in view.data.iter() {
                print_tree(tree);
                println!();
            }
        }
        Command::Welcome => {
            let feed = feed_service(&settings, Arc::clone(&stores.pages), caches);
            let view = feed.welcome(false).await;
            if let Some(notice) = &view.notice {
                eprintln!("{notice}");
            }
            for card in &view.data.entries {
                print_record(card);
                let scrubber = feed.scrubber(card, &view.data.all).await;
                if scrubber.data.nodes.len() > 1 {
                    println!("    {} pages in this lineage", scrubber.data.nodes.len());
                }
            }
        }
        Command::Lineage { exploration_id } => {
            let feed = feed_service(&settings, Arc::clone(&stores.pages), caches);
            let tree = feed.lineage(&ExplorationId::from_raw(exploration_id)).await?;
            print_tree(&tree);
        }
        Command::Show { record_id, out } => {
            let navigator = navigator(&settings, &stores, caches, out.clone())?;
            let mut session = Session::new();
            navigator.open_record(&mut session, &RecordId::from_raw(record_id)).await?;
            println!("wrote {}", out.display());
        }
        Command::History { clear, delete, open, out } => {
            let history = BrowsingHistory::new(Arc::clone(&stores.history));
            if clear {
                let dropped = history.clear().await?;
                println!("cleared {dropped} visits");
            } else if let Some(id) = delete {
                if !history.delete(&VisitId::from_raw(id.clone())).await? {
                    bail!("no visit {id}");
                }
                println!("forgot {id}");
            } else if let Some(id) = open {
                let navigator = navigator(&settings, &stores, caches, out.clone())?;
                let mut session = Session::new();
                navigator.open_visit(&mut session, &VisitId::from_raw(id)).await?;
                println!("wrote {}", out.display());
            } else {
                for visit in history.list().await? {
                    print_visit(&visit);
                }
            }
        }
    }
    Ok(())
}
