//! Tiered profile cache.
//!
//! Holds three independently refreshed entries: merged top items, followed
//! artists, and related-artist names. Each read returns a fresh in-memory
//! entry without suspending; otherwise it takes the entry's refresh lock,
//! rechecks, restores from durable storage, rechecks again, and only then
//! goes to the network.
//!
//! Top items blend three tiers:
//!
//! 1. saved tracks (always attempted, retrying request path),
//! 2. per-window top tracks and artists (single attempt each, hard timeout,
//!    guarded by a [`Cooldown`]),
//! 3. local play history (sole source when nothing else answered, otherwise
//!    only a reordering of Tier 1).

mod entry;
mod tiers;

pub use entry::{CacheEntry, CacheValue, TopItems, WindowItems};
pub use tiers::normalize_name;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use futures::future::join_all;

use tastebridge_core::model::{Artist, TimeWindow, Track};
use tastebridge_core::store::{load_json, save_json, KeyValueStore};
use tastebridge_core::{Clock, FallbackNotice, PlayHistory, StatusBoard};

use crate::client::CatalogApi;
use crate::error::{CatalogError, SyncResult};
use crate::resilience::Cooldown;
use crate::settings::CacheSettings;

use entry::EntrySlot;

pub const TOP_KEY: &str = "profile.top";
pub const FOLLOWED_KEY: &str = "profile.followed";
pub const RELATED_KEY: &str = "profile.related";

/// Quality of the current top-items entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheQuality {
    Missing,
    Degraded,
    Full,
}

/// What the Tier-2 pass produced.
#[derive(Debug, Default)]
struct Tier2Outcome {
    windows: Vec<WindowItems>,
    /// Why Tier 2 was skipped or cut short.
    shortfall: Option<String>,
}

impl Tier2Outcome {
    fn contributed(&self) -> bool {
        self.windows
            .iter()
            .any(|w| !w.tracks.is_empty() || !w.artists.is_empty())
    }
}

/// Process-wide taste-source cache.
#[derive(Debug)]
pub struct ProfileCache {
    api: Arc<dyn CatalogApi>,
    history: Arc<dyn PlayHistory>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    status: Arc<StatusBoard>,
    settings: CacheSettings,
    top: EntrySlot<TopItems>,
    followed: EntrySlot<Vec<Artist>>,
    related: EntrySlot<Vec<String>>,
    cooldown: Mutex<Cooldown>,
}

impl ProfileCache {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        history: Arc<dyn PlayHistory>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        status: Arc<StatusBoard>,
        settings: CacheSettings,
    ) -> Self {
        let cooldown = Cooldown::new(
            Duration::seconds(settings.cooldown_base_secs),
            Duration::seconds(settings.cooldown_max_secs),
        );
        Self {
            api,
            history,
            store,
            clock,
            status,
            settings,
            top: EntrySlot::new(),
            followed: EntrySlot::new(),
            related: EntrySlot::new(),
            cooldown: Mutex::new(cooldown),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // -- reads --------------------------------------------------------------

    pub async fn top_tracks(&self, limit: usize) -> Vec<Track> {
        self.top_entry()
            .await
            .map(|e| e.value.tracks.into_iter().take(limit).collect())
            .unwrap_or_default()
    }

    pub async fn top_artists(&self, limit: usize) -> Vec<Artist> {
        self.top_entry()
            .await
            .map(|e| e.value.artists.into_iter().take(limit).collect())
            .unwrap_or_default()
    }

    /// Top tracks for one window.
    ///
    /// When the per-window source did not answer, the merged list stands in
    /// for the medium window and the other windows are empty.
    pub async fn window_top_tracks(&self, window: TimeWindow, limit: usize) -> Vec<Track> {
        self.top_entry()
            .await
            .map(|e| window_slice(&e.value, window, |w| &w.tracks, |t| &t.tracks, limit))
            .unwrap_or_default()
    }

    /// Top artists for one window, with the same fallback as
    /// [`window_top_tracks`](Self::window_top_tracks).
    pub async fn window_top_artists(&self, window: TimeWindow, limit: usize) -> Vec<Artist> {
        self.top_entry()
            .await
            .map(|e| window_slice(&e.value, window, |w| &w.artists, |t| &t.artists, limit))
            .unwrap_or_default()
    }

    pub async fn followed_artists(&self, limit: usize) -> Vec<Artist> {
        self.followed_entry()
            .await
            .map(|e| e.value.into_iter().take(limit).collect())
            .unwrap_or_default()
    }

    /// Normalized names of artists related to the first `seed_limit`
    /// followed artists.
    pub async fn related_artist_names(&self, seed_limit: usize) -> Vec<String> {
        self.related_entry(seed_limit)
            .await
            .map(|e| e.value)
            .unwrap_or_default()
    }

    /// Fresh top tracks without touching any lock or the network.
    pub fn cached_top_tracks(&self, limit: usize) -> Option<Vec<Track>> {
        self.fresh_top()
            .map(|e| e.value.tracks.into_iter().take(limit).collect())
    }

    pub fn cached_top_artists(&self, limit: usize) -> Option<Vec<Artist>> {
        self.fresh_top()
            .map(|e| e.value.artists.into_iter().take(limit).collect())
    }

    pub fn cached_followed_artists(&self, limit: usize) -> Option<Vec<Artist>> {
        fresh(&self.followed, self.clock.now(), |_| self.settings.followed_ttl())
            .map(|e| e.value.into_iter().take(limit).collect())
    }

    pub fn top_quality(&self) -> CacheQuality {
        match self.top.snapshot() {
            None => CacheQuality::Missing,
            Some(e) if e.high_fidelity => CacheQuality::Full,
            Some(_) => CacheQuality::Degraded,
        }
    }

    /// When the current top-items entry was refreshed, if any.
    pub fn top_refreshed_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.top.snapshot().map(|e| e.refreshed_at)
    }

    /// Remaining Tier-2 cooldown, if one is active.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.lock_cooldown().remaining(self.clock.now())
    }

    // -- maintenance --------------------------------------------------------

    /// Refresh every entry from the network now, ignoring freshness.
    pub async fn force_refresh(&self) {
        {
            let _guard = self.top.lock().await;
            self.refresh_top_locked().await;
        }
        {
            let _guard = self.followed.lock().await;
            self.refresh_followed_locked().await;
        }
        let _guard = self.related.lock().await;
        self.refresh_related_locked(self.settings.related_seed_limit)
            .await;
    }

    /// Load every durably stored entry that is newer than what is in memory.
    /// No network access; stale entries are loaded too.
    pub fn load_stored(&self) {
        self.restore(&self.top, TOP_KEY);
        self.restore(&self.followed, FOLLOWED_KEY);
        self.restore(&self.related, RELATED_KEY);
    }

    /// Drop every entry from memory and durable storage.
    pub fn invalidate(&self) {
        self.top.clear();
        self.followed.clear();
        self.related.clear();
        for key in [TOP_KEY, FOLLOWED_KEY, RELATED_KEY] {
            if let Err(e) = self.store.remove(key) {
                log::warn!("failed to remove cached {key}: {e}");
            }
        }
        log::info!("profile cache invalidated");
    }

    // -- entry plumbing -----------------------------------------------------

    fn top_ttl(&self, entry: &CacheEntry<TopItems>) -> Duration {
        if entry.high_fidelity {
            self.settings.full_ttl()
        } else {
            self.settings.degraded_ttl()
        }
    }

    fn fresh_top(&self) -> Option<CacheEntry<TopItems>> {
        fresh(&self.top, self.clock.now(), |e| self.top_ttl(e))
    }

    async fn top_entry(&self) -> Option<CacheEntry<TopItems>> {
        if let Some(entry) = self.fresh_top() {
            return Some(entry);
        }
        let _guard = self.top.lock().await;
        if let Some(entry) = self.fresh_top() {
            return Some(entry);
        }
        self.restore(&self.top, TOP_KEY);
        if let Some(entry) = self.fresh_top() {
            log::debug!("top items restored from storage");
            return Some(entry);
        }
        self.refresh_top_locked().await;
        self.top.snapshot()
    }

    async fn followed_entry(&self) -> Option<CacheEntry<Vec<Artist>>> {
        let ttl = self.settings.followed_ttl();
        if let Some(entry) = fresh(&self.followed, self.clock.now(), |_| ttl) {
            return Some(entry);
        }
        let _guard = self.followed.lock().await;
        if let Some(entry) = fresh(&self.followed, self.clock.now(), |_| ttl) {
            return Some(entry);
        }
        self.restore(&self.followed, FOLLOWED_KEY);
        if let Some(entry) = fresh(&self.followed, self.clock.now(), |_| ttl) {
            return Some(entry);
        }
        self.refresh_followed_locked().await;
        self.followed.snapshot()
    }

    async fn related_entry(&self, seed_limit: usize) -> Option<CacheEntry<Vec<String>>> {
        let ttl = self.settings.related_ttl();
        if let Some(entry) = fresh(&self.related, self.clock.now(), |_| ttl) {
            return Some(entry);
        }
        let _guard = self.related.lock().await;
        if let Some(entry) = fresh(&self.related, self.clock.now(), |_| ttl) {
            return Some(entry);
        }
        self.restore(&self.related, RELATED_KEY);
        if let Some(entry) = fresh(&self.related, self.clock.now(), |_| ttl) {
            return Some(entry);
        }
        self.refresh_related_locked(seed_limit).await;
        self.related.snapshot()
    }

    /// Offer the durably stored entry to the slot. Unreadable entries are
    /// treated as absent.
    fn restore<T: CacheValue>(&self, slot: &EntrySlot<T>, key: &str) {
        match load_json::<CacheEntry<T>>(self.store.as_ref(), key) {
            Ok(Some(entry)) => slot.offer(entry),
            Ok(None) => {}
            Err(e) => log::warn!("ignoring unreadable cache entry {key}: {e}"),
        }
    }

    fn persist<T: CacheValue>(&self, slot: &EntrySlot<T>, key: &str, entry: CacheEntry<T>) {
        if let Err(e) = save_json(self.store.as_ref(), key, &entry) {
            log::warn!("failed to persist {key}: {e}");
        }
        slot.replace(entry);
    }

    fn lock_cooldown(&self) -> std::sync::MutexGuard<'_, Cooldown> {
        self.cooldown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -- refreshes (caller holds the entry lock) ----------------------------

    async fn refresh_top_locked(&self) {
        let now = self.clock.now();
        log::info!("refreshing top items");

        let tier1 = match self.api.saved_tracks(self.settings.saved_tracks_limit).await {
            Ok(tracks) => tracks,
            Err(e) => {
                log::warn!("saved tracks unavailable: {e}");
                Vec::new()
            }
        };

        let tier2 = self.fetch_tier2().await;
        let contributed = tier2.contributed();

        let tier2_tracks = tier2.windows.iter().flat_map(|w| w.tracks.iter().cloned());
        let tier2_artists: Vec<Artist> = tiers::dedupe_artists(
            tier2.windows.iter().flat_map(|w| w.artists.iter().cloned()),
        );
        let mut tracks = tiers::dedupe_tracks(tier2_tracks.chain(tier1.iter().cloned()));

        if tracks.is_empty() {
            tracks = self.history_tracks().await;
            if !tracks.is_empty() {
                log::info!("top items built from local play history only");
            }
        } else if !tier1.is_empty() && !contributed {
            let played = self.played().await;
            if !played.is_empty() {
                tracks = tiers::reorder_by_play_rank(tracks, &played);
            }
        }

        let artists = tiers::rank_artists(&tracks, &tier2_artists);
        let high_fidelity = contributed && tier2.shortfall.is_none();
        let value = TopItems {
            tracks,
            artists,
            windows: if contributed { tier2.windows } else { Vec::new() },
        };

        if value.is_empty_value() {
            log::warn!("top-items refresh yielded nothing; keeping previous entry");
            self.status.publish_fallback(FallbackNotice::active(
                tier2
                    .shortfall
                    .unwrap_or_else(|| "no listening data available".to_string()),
            ));
            return;
        }

        log::info!(
            "top items refreshed: {} tracks, {} artists, high fidelity: {}",
            value.tracks.len(),
            value.artists.len(),
            high_fidelity
        );
        self.persist(&self.top, TOP_KEY, CacheEntry::new(value, now, high_fidelity));

        if high_fidelity {
            self.status.publish_fallback(FallbackNotice::cleared());
        } else {
            self.status.publish_fallback(FallbackNotice::active(
                tier2
                    .shortfall
                    .unwrap_or_else(|| "personal top items unavailable".to_string()),
            ));
        }
    }

    /// Run the six Tier-2 sub-requests in sequence, stopping at the first
    /// failure that starts a cooldown.
    async fn fetch_tier2(&self) -> Tier2Outcome {
        if let Some(remaining) = self.cooldown_remaining() {
            log::debug!(
                "skipping top items, cooldown active for {}s",
                remaining.num_seconds()
            );
            return Tier2Outcome {
                windows: Vec::new(),
                shortfall: Some(format!(
                    "top items rate limited, retrying in {} min",
                    remaining.num_minutes().max(1)
                )),
            };
        }

        let limit = self.settings.top_items_limit;
        let mut outcome = Tier2Outcome::default();

        for window in TimeWindow::ALL {
            let tracks = match self.tier2_call(self.api.top_tracks(window, limit)).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    if self.note_tier2_failure(&e, &mut outcome) {
                        return outcome;
                    }
                    Vec::new()
                }
            };
            let artists = match self.tier2_call(self.api.top_artists(window, limit)).await {
                Ok(artists) => artists,
                Err(e) => {
                    outcome.windows.push(WindowItems {
                        window,
                        tracks,
                        artists: Vec::new(),
                    });
                    if self.note_tier2_failure(&e, &mut outcome) {
                        return outcome;
                    }
                    continue;
                }
            };
            outcome.windows.push(WindowItems {
                window,
                tracks,
                artists,
            });
        }

        if outcome.shortfall.is_none() {
            self.lock_cooldown().record_success();
        }
        outcome
    }

    async fn tier2_call<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        tokio::time::timeout(self.settings.tier2_timeout(), call)
            .await
            .unwrap_or_else(|_| Err(CatalogError::Timeout))
    }

    /// Record a Tier-2 failure. Returns `true` when the remaining
    /// sub-requests must be skipped.
    fn note_tier2_failure(&self, err: &CatalogError, outcome: &mut Tier2Outcome) -> bool {
        if err.starts_cooldown() {
            let now = self.clock.now();
            let mut cooldown = self.lock_cooldown();
            cooldown.record_failure(now, err.retry_after());
            let remaining = cooldown.remaining(now).unwrap_or_else(Duration::zero);
            log::warn!(
                "top items failed ({err}); cooling down for {}s",
                remaining.num_seconds()
            );
            outcome.shortfall = Some(format!(
                "top items rate limited, retrying in {} min",
                remaining.num_minutes().max(1)
            ));
            return true;
        }

        log::warn!("top items request failed: {err}");
        outcome
            .shortfall
            .get_or_insert_with(|| format!("top items incomplete: {err}"));
        err.is_credential_dead()
    }

    async fn played(&self) -> Vec<tastebridge_core::PlayedTrack> {
        let since = self.clock.now() - Duration::days(self.settings.history_lookback_days);
        match self
            .history
            .most_played(since, self.settings.history_limit)
            .await
        {
            Ok(played) => played,
            Err(e) => {
                log::warn!("local play history unavailable: {e}");
                Vec::new()
            }
        }
    }

    async fn history_tracks(&self) -> Vec<Track> {
        tiers::dedupe_tracks(self.played().await.into_iter().map(|p| p.track))
    }

    async fn refresh_followed_locked(&self) {
        let now = self.clock.now();
        match self.api.followed_artists(self.settings.followed_limit).await {
            Ok(artists) if artists.is_empty() => {
                log::info!("no followed artists returned; keeping previous entry");
            }
            Ok(artists) => {
                log::info!("followed artists refreshed: {}", artists.len());
                self.persist(&self.followed, FOLLOWED_KEY, CacheEntry::new(artists, now, true));
            }
            Err(e) => log::warn!("followed artists unavailable: {e}"),
        }
    }

    async fn refresh_related_locked(&self, seed_limit: usize) {
        let now = self.clock.now();
        let seeds = self.followed_artists(seed_limit).await;
        if seeds.is_empty() {
            log::info!("no followed artists to derive related names from");
            return;
        }

        let lookups = seeds.iter().map(|artist| async move {
            (artist, self.api.related_artist_names(&artist.id).await)
        });
        let mut names = BTreeSet::new();
        let mut failures = 0_usize;
        for (artist, result) in join_all(lookups).await {
            match result {
                Ok(related) => names.extend(related.iter().map(|n| normalize_name(n))),
                Err(e) => {
                    failures += 1;
                    log::warn!("related artists for {} unavailable: {e}", artist.name);
                }
            }
        }
        names.remove("");

        if names.is_empty() {
            log::warn!("related-name refresh yielded nothing; keeping previous entry");
            return;
        }
        log::info!("related artist names refreshed: {}", names.len());
        let value: Vec<String> = names.into_iter().collect();
        self.persist(
            &self.related,
            RELATED_KEY,
            CacheEntry::new(value, now, failures == 0),
        );
    }
}

/// Fresh, non-empty snapshot of a slot.
fn fresh<T: CacheValue>(
    slot: &EntrySlot<T>,
    now: chrono::DateTime<chrono::Utc>,
    ttl: impl Fn(&CacheEntry<T>) -> Duration,
) -> Option<CacheEntry<T>> {
    slot.snapshot()
        .filter(|e| !e.value.is_empty_value() && e.is_fresh(now, ttl(e)))
}

fn window_slice<T: Clone>(
    items: &TopItems,
    window: TimeWindow,
    per_window: impl Fn(&WindowItems) -> &Vec<T>,
    merged: impl Fn(&TopItems) -> &Vec<T>,
    limit: usize,
) -> Vec<T> {
    let source = match items.window(window) {
        Some(w) => per_window(w),
        None if items.windows.is_empty() && window == TimeWindow::Medium => merged(items),
        None => return Vec::new(),
    };
    source.iter().take(limit).cloned().collect()
}
