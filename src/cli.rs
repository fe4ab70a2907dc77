use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Search endpoint [env: BOOKFINDER_API_URL] (default: Open Library search.json).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Host serving cover images [env: BOOKFINDER_COVER_HOST].
    #[arg(long, global = true)]
    pub cover_host: Option<String>,

    /// File holding the last search [env: BOOKFINDER_STATE] (default: bookfinder-state.json).
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// Keep the last search in memory only.
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Quiet period before a title edit triggers a search.
    #[arg(long, global = true, default_value_t = 500)]
    pub debounce_ms: u64,

    /// Maximum results requested per search.
    #[arg(long, global = true, default_value_t = 100)]
    pub limit: usize,

    /// HTTP timeout for one search request.
    #[arg(long, global = true, default_value_t = 20)]
    pub timeout_secs: u64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one search and print the result cards.
    Search(SearchArgs),
    /// Edit filters line by line and watch results update.
    Interactive,
    /// Inspect or forget the persisted last search.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
    /// List language codes accepted by `--language`.
    Languages,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Title keywords.
    #[arg(long)]
    pub title: Option<String>,

    /// Exact first-publish year.
    #[arg(long)]
    pub year: Option<String>,

    /// Language code (see `languages`).
    #[arg(long)]
    pub language: Option<String>,

    /// Print results as JSON instead of cards.
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn has_filters(&self) -> bool {
        self.title.is_some() || self.year.is_some() || self.language.is_some()
    }
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Print the persisted last search.
    Show,
    /// Forget the persisted last search.
    Clear,
}
