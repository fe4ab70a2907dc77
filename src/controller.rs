use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::debounce::Debouncer;
use crate::filters::{EffectiveFilter, FilterState, SearchQuery};
use crate::formats::{BookSummary, SearchPage, SearchSnapshot};
use crate::openlibrary::{FetchError, SearchApi};
use crate::store::{self, KeyValueStore};

/// Maximum number of cards surfaced at once.
pub const RESULT_CAP: usize = 40;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_BLUR_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Quiet period applied to title edits.
    pub debounce: Duration,
    /// Delay between losing focus and closing the suggestion list.
    pub blur_grace: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            blur_grace: DEFAULT_BLUR_GRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Debouncing,
    Fetching,
}

/// Everything a renderer needs, published after every handled event.
#[derive(Debug, Clone, Default)]
pub struct ReadModel {
    pub filters: FilterState,
    pub effective: EffectiveFilter,
    pub results: Vec<BookSummary>,
    pub result_count: usize,
    pub total_matches: Option<u64>,
    pub loading: bool,
    pub error: Option<String>,
    pub suggestions: Vec<String>,
    pub phase: Phase,
    /// Set while the results shown were restored from storage rather than fetched.
    pub restored: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ReadModel {
    pub fn visible_results(&self) -> &[BookSummary] {
        &self.results[..self.results.len().min(RESULT_CAP)]
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// A constrained search finished and matched nothing.
    pub fn is_empty_result(&self) -> bool {
        !self.effective.is_empty() && self.results.is_empty() && !self.loading && !self.has_error()
    }
}

#[derive(Debug)]
enum Command {
    SetTitle(String),
    SetYear(String),
    SetLanguage(String),
    FocusTitle,
    BlurTitle,
    SelectSuggestion(usize),
    Sync(oneshot::Sender<()>),
}

#[derive(Debug)]
enum Internal {
    TitleSettled(u64),
    BlurElapsed(u64),
    FetchFinished {
        token: u64,
        filter: EffectiveFilter,
        outcome: Result<SearchPage, FetchError>,
    },
}

/// Cloneable front door to a running [`SearchController`].
///
/// The controller task stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    model: watch::Receiver<ReadModel>,
}

impl ControllerHandle {
    pub fn set_title(&self, title: impl Into<String>) -> anyhow::Result<()> {
        self.send(Command::SetTitle(title.into()))
    }

    pub fn set_year(&self, year: impl Into<String>) -> anyhow::Result<()> {
        self.send(Command::SetYear(year.into()))
    }

    pub fn set_language(&self, language: impl Into<String>) -> anyhow::Result<()> {
        self.send(Command::SetLanguage(language.into()))
    }

    pub fn focus_title(&self) -> anyhow::Result<()> {
        self.send(Command::FocusTitle)
    }

    pub fn blur_title(&self) -> anyhow::Result<()> {
        self.send(Command::BlurTitle)
    }

    pub fn select_suggestion(&self, index: usize) -> anyhow::Result<()> {
        self.send(Command::SelectSuggestion(index))
    }

    pub fn read_model(&self) -> watch::Receiver<ReadModel> {
        self.model.clone()
    }

    pub fn current(&self) -> ReadModel {
        self.model.borrow().clone()
    }

    /// Waits until every command sent so far has been handled and no
    /// debounce or fetch is pending.
    pub async fn settle(&self) -> anyhow::Result<ReadModel> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Sync(ack_tx))?;
        ack_rx.await.context("search controller stopped")?;

        let mut model = self.model.clone();
        let settled = model
            .wait_for(|m| m.phase == Phase::Idle)
            .await
            .context("search controller stopped")?;
        Ok(settled.clone())
    }

    fn send(&self, command: Command) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow::anyhow!("search controller stopped"))
    }
}

pub struct SearchController {
    api: Arc<dyn SearchApi>,
    store: Arc<dyn KeyValueStore>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    title_debounce: Debouncer<Internal>,
    blur_grace: Debouncer<Internal>,

    filters: FilterState,
    debounced_title: String,
    results: Vec<BookSummary>,
    total_matches: Option<u64>,
    error: Option<String>,
    suggestions_open: bool,
    restored: bool,
    fetched_at: Option<DateTime<Utc>>,

    next_token: u64,
    in_flight: Option<(u64, JoinHandle<()>)>,
    last_requested: Option<EffectiveFilter>,

    model_tx: watch::Sender<ReadModel>,
}

impl SearchController {
    /// Restores the last snapshot, issues the startup fetch when nothing was
    /// restored, and spawns the event loop.
    pub async fn start(
        config: ControllerConfig,
        api: Arc<dyn SearchApi>,
        store: Arc<dyn KeyValueStore>,
    ) -> ControllerHandle {
        Self::start_with_filters(config, api, store, None).await
    }

    /// Like [`SearchController::start`], but `filters` replace the restored
    /// ones before the startup decision, without debounce. The startup fetch
    /// then runs for them directly unless the restored results were fetched
    /// for the same filter.
    pub async fn start_with_filters(
        config: ControllerConfig,
        api: Arc<dyn SearchApi>,
        store: Arc<dyn KeyValueStore>,
        filters: Option<FilterState>,
    ) -> ControllerHandle {
        let snapshot = match store::load_snapshot(store.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(?err, "failed to restore last search; starting empty");
                SearchSnapshot::default()
            }
        };

        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (model_tx, model_rx) = watch::channel(ReadModel::default());

        let replaced = filters.is_some();
        let filters = filters.unwrap_or(snapshot.filters);
        let mut controller = Self {
            api,
            store,
            title_debounce: Debouncer::new(config.debounce, internal_tx.clone()),
            blur_grace: Debouncer::new(config.blur_grace, internal_tx.clone()),
            internal_tx,
            debounced_title: filters.title.clone(),
            filters,
            results: Vec::new(),
            total_matches: None,
            error: None,
            suggestions_open: false,
            restored: false,
            fetched_at: None,
            next_token: 0,
            in_flight: None,
            last_requested: None,
            model_tx,
        };
        if replaced {
            controller.persist_filters().await;
        }

        let effective = controller.effective();
        let current = !snapshot.results.is_empty()
            && snapshot.fetched_for.as_ref() == Some(&effective);
        if !snapshot.results.is_empty() {
            controller.results = snapshot.results;
            controller.restored = true;
            controller.fetched_at = snapshot.fetched_at;
        }
        if current {
            tracing::info!(
                count = controller.results.len(),
                "restored cached results; skipping startup search"
            );
            controller.last_requested = Some(effective);
        } else {
            tracing::debug!(
                ?effective,
                cached = controller.results.len(),
                "no cached results for this filter; running startup search"
            );
            let query = effective.to_query_or_default();
            controller.dispatch_fetch(effective, query);
        }
        controller.publish();

        tokio::spawn(controller.run(commands_rx, internal_rx));

        ControllerHandle {
            commands: commands_tx,
            model: model_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Sync(ack)) => {
                        let _ = ack.send(());
                        continue;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = internal.recv() => self.handle_internal(event).await,
            }
            self.publish();
        }

        if let Some((_, handle)) = self.in_flight.take() {
            handle.abort();
        }
        tracing::debug!("search controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetTitle(title) => self.edit_title(title).await,
            Command::SetYear(year) => {
                self.filters.year = year;
                self.persist_filters().await;
                self.apply_effective().await;
            }
            Command::SetLanguage(language) => {
                self.filters.language = language;
                self.persist_filters().await;
                self.apply_effective().await;
            }
            Command::FocusTitle => {
                self.blur_grace.cancel();
                self.suggestions_open = true;
            }
            Command::BlurTitle => {
                self.blur_grace.reset(Internal::BlurElapsed);
            }
            Command::SelectSuggestion(index) => {
                let suggestions = self.suggestions();
                let Some(title) = suggestions.get(index).cloned() else {
                    tracing::warn!(index, available = suggestions.len(), "no such suggestion");
                    return;
                };
                self.suggestions_open = false;
                self.blur_grace.cancel();
                self.edit_title(title).await;
            }
            Command::Sync(_) => {}
        }
    }

    async fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::TitleSettled(generation) => {
                if !self.title_debounce.finish(generation) {
                    return;
                }
                self.debounced_title = self.filters.title.clone();
                self.apply_effective().await;
            }
            Internal::BlurElapsed(generation) => {
                if self.blur_grace.finish(generation) {
                    self.suggestions_open = false;
                }
            }
            Internal::FetchFinished {
                token,
                filter,
                outcome,
            } => self.finish_fetch(token, filter, outcome).await,
        }
    }

    async fn edit_title(&mut self, title: String) {
        self.filters.title = title;
        self.persist_filters().await;
        let generation = self.title_debounce.reset(Internal::TitleSettled);
        tracing::debug!(
            generation,
            delay_ms = self.title_debounce.delay().as_millis() as u64,
            "title edit debounced"
        );
    }

    async fn apply_effective(&mut self) {
        let effective = self.effective();
        if self.last_requested.as_ref() == Some(&effective) {
            tracing::debug!(?effective, "filter unchanged; not searching");
            return;
        }

        let Some(query) = effective.to_query() else {
            tracing::debug!("all filters cleared; dropping results");
            self.cancel_in_flight();
            self.last_requested = Some(effective.clone());
            self.results.clear();
            self.total_matches = None;
            self.error = None;
            self.restored = false;
            self.fetched_at = None;
            self.persist_snapshot(effective).await;
            return;
        };
        self.dispatch_fetch(effective, query);
    }

    fn dispatch_fetch(&mut self, filter: EffectiveFilter, query: SearchQuery) {
        self.cancel_in_flight();
        self.next_token += 1;
        let token = self.next_token;
        self.last_requested = Some(filter.clone());
        tracing::debug!(token, ?query, "dispatching search");

        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = api.search(&query).await;
            let _ = tx.send(Internal::FetchFinished {
                token,
                filter,
                outcome,
            });
        });
        self.in_flight = Some((token, handle));
    }

    fn cancel_in_flight(&mut self) {
        if let Some((token, handle)) = self.in_flight.take() {
            tracing::debug!(token, "superseding in-flight search");
            handle.abort();
        }
    }

    async fn finish_fetch(
        &mut self,
        token: u64,
        filter: EffectiveFilter,
        outcome: Result<SearchPage, FetchError>,
    ) {
        match &self.in_flight {
            Some((current, _)) if *current == token => {}
            _ => {
                tracing::warn!(token, ?filter, "discarding stale search response");
                return;
            }
        }
        self.in_flight = None;

        match outcome {
            Ok(page) => {
                tracing::info!(
                    token,
                    count = page.books.len(),
                    total = page.total_matches,
                    "search completed"
                );
                self.results = page.books;
                self.total_matches = page.total_matches;
                self.error = None;
                self.restored = false;
                self.fetched_at = Some(Utc::now());
                self.persist_snapshot(filter).await;
            }
            Err(err) => {
                tracing::warn!(token, ?filter, error = %err, "search failed; keeping previous results");
                self.error = Some(err.to_string());
            }
        }
    }

    async fn persist_filters(&self) {
        if let Err(err) = store::save_filters(self.store.as_ref(), &self.filters).await {
            tracing::warn!(?err, "failed to persist filters");
        }
    }

    async fn persist_snapshot(&self, fetched_for: EffectiveFilter) {
        let snapshot = SearchSnapshot {
            filters: self.filters.clone(),
            results: self.results.clone(),
            fetched_for: Some(fetched_for),
            fetched_at: self.fetched_at,
        };
        if let Err(err) = store::save_snapshot(self.store.as_ref(), &snapshot).await {
            tracing::warn!(?err, "failed to persist search snapshot");
        }
    }

    fn effective(&self) -> EffectiveFilter {
        FilterState {
            title: self.debounced_title.clone(),
            year: self.filters.year.clone(),
            language: self.filters.language.clone(),
        }
        .effective()
    }

    fn suggestions(&self) -> Vec<String> {
        if !self.suggestions_open || self.effective().title.is_none() {
            return Vec::new();
        }
        self.results.iter().map(|book| book.title.clone()).collect()
    }

    fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Fetching
        } else if self.title_debounce.is_pending() {
            Phase::Debouncing
        } else {
            Phase::Idle
        }
    }

    fn publish(&self) {
        let model = ReadModel {
            filters: self.filters.clone(),
            effective: self.effective(),
            results: self.results.clone(),
            result_count: self.results.len(),
            total_matches: self.total_matches,
            loading: self.in_flight.is_some(),
            error: self.error.clone(),
            suggestions: self.suggestions(),
            phase: self.phase(),
            restored: self.restored,
            fetched_at: self.fetched_at,
        };
        self.model_tx.send_replace(model);
    }
}
