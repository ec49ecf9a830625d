//! Service wiring shared by the commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use tastebridge_core::{
    Clock, Database, KeyValueStore, MatchStore, NoHistory, StatusBoard, SystemClock,
};
use tastebridge_engine::{
    CatalogB, CatalogBItem, Config, QueueBuilder, RecommendationEngine, ResolveResult,
    TrackResolver,
};
use tastebridge_sync::{
    AuthenticatedApi, Authenticator, CatalogAClient, CatalogApi, CredentialExchanger, ProfileCache,
    SessionManager, TokenSink,
};

/// Catalog B as seen from the command line: search belongs to the player
/// that embeds tastebridge, so only cached matches and overrides resolve.
#[derive(Debug, Default)]
pub struct MatchCacheOnly;

#[async_trait]
impl CatalogB for MatchCacheOnly {
    async fn search(&self, query: &str) -> ResolveResult<Vec<CatalogBItem>> {
        log::debug!("no catalog B search available for {query:?}");
        Ok(Vec::new())
    }
}

#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub db: Arc<Database>,
    pub api: Arc<dyn CatalogApi>,
    pub status: Arc<StatusBoard>,
    pub session: Arc<SessionManager>,
    pub cache: Arc<ProfileCache>,
    pub engine: Arc<RecommendationEngine>,
    pub resolver: Arc<TrackResolver>,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Arc::new(Database::open(&config.database_path).with_context(|| {
            format!("Failed to open database {}", config.database_path.display())
        })?);
        let client = Arc::new(
            CatalogAClient::new(config.client.clone())
                .context("Failed to build catalog A client")?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let status = Arc::new(StatusBoard::new());
        let store: Arc<dyn KeyValueStore> = Arc::clone(&db) as Arc<dyn KeyValueStore>;

        let session = Arc::new(SessionManager::new(
            Arc::clone(&client) as Arc<dyn CredentialExchanger>,
            Arc::clone(&client) as Arc<dyn TokenSink>,
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&status),
        ));
        let api: Arc<dyn CatalogApi> = Arc::new(AuthenticatedApi::new(
            client as Arc<dyn CatalogApi>,
            Arc::clone(&session) as Arc<dyn Authenticator>,
        ));
        let cache = Arc::new(ProfileCache::new(
            Arc::clone(&api),
            Arc::new(NoHistory),
            store,
            Arc::clone(&clock),
            Arc::clone(&status),
            config.cache.clone(),
        ));
        let engine = Arc::new(RecommendationEngine::new(
            Arc::clone(&cache),
            Arc::clone(&api),
            Arc::clone(&clock),
            config.engine.clone(),
        ));
        let resolver = Arc::new(TrackResolver::new(
            Arc::new(MatchCacheOnly),
            Arc::clone(&db) as Arc<dyn MatchStore>,
            clock,
            config.resolver.clone(),
        ));

        Ok(Self {
            config,
            db,
            api,
            status,
            session,
            cache,
            engine,
            resolver,
        })
    }

    /// Make sure catalog A will accept our requests, or explain how to fix it.
    pub async fn require_session(&self) -> Result<()> {
        if self.session.ensure_authenticated().await {
            return Ok(());
        }
        if !self.session.has_credential() || self.session.needs_relogin() {
            anyhow::bail!("Not logged in to catalog A. Run `tastebridge login` first.");
        }
        anyhow::bail!("Could not refresh the catalog A session; try again later.")
    }

    pub fn queue_builder(&self) -> QueueBuilder {
        QueueBuilder::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.resolver),
            Arc::clone(&self.status),
        )
    }
}
