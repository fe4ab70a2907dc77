use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::cli::SettingsArgs;
use crate::controller::{ControllerConfig, DEFAULT_BLUR_GRACE};
use crate::openlibrary::{
    DEFAULT_COVER_HOST, DEFAULT_SEARCH_URL, OpenLibraryClient, SearchApi,
};
use crate::store::{KeyValueStore, LocalFsKeyValueStore, MemoryKeyValueStore};

pub const DEFAULT_STATE_FILE: &str = "bookfinder-state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: Url,
    pub cover_host: String,
    /// `None` keeps state in memory.
    pub state_path: Option<PathBuf>,
    pub debounce: Duration,
    pub limit: usize,
    pub timeout: Duration,
}

impl Settings {
    pub fn from_args(args: &SettingsArgs) -> anyhow::Result<Self> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    /// Flags win over environment variables, which win over defaults.
    pub fn resolve(
        args: &SettingsArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let lookup = |flag: &Option<String>, key: &str| {
            flag.clone()
                .or_else(|| env(key))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let raw_url = lookup(&args.api_url, "BOOKFINDER_API_URL")
            .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_owned());
        let api_url =
            Url::parse(&raw_url).with_context(|| format!("invalid search endpoint: {raw_url}"))?;
        if api_url.scheme() != "http" && api_url.scheme() != "https" {
            anyhow::bail!("search endpoint must be http/https: {api_url}");
        }

        let cover_host = lookup(&args.cover_host, "BOOKFINDER_COVER_HOST")
            .unwrap_or_else(|| DEFAULT_COVER_HOST.to_owned());
        if cover_host.contains("://") {
            anyhow::bail!("cover host must be a bare host name: {cover_host}");
        }

        let state_path = if args.no_persist {
            None
        } else {
            Some(PathBuf::from(
                lookup(&args.state, "BOOKFINDER_STATE")
                    .unwrap_or_else(|| DEFAULT_STATE_FILE.to_owned()),
            ))
        };

        if args.limit == 0 {
            anyhow::bail!("--limit must be at least 1");
        }
        if args.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be at least 1");
        }

        Ok(Self {
            api_url,
            cover_host,
            state_path,
            debounce: Duration::from_millis(args.debounce_ms),
            limit: args.limit,
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }

    pub fn search_api(&self) -> anyhow::Result<Arc<dyn SearchApi>> {
        let client = OpenLibraryClient::new(self.api_url.clone(), self.limit, self.timeout)
            .context("create search client")?;
        Ok(Arc::new(client))
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        match &self.state_path {
            Some(path) => Arc::new(LocalFsKeyValueStore::new(path.clone())),
            None => Arc::new(MemoryKeyValueStore::new()),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            debounce: self.debounce,
            blur_grace: DEFAULT_BLUR_GRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SettingsArgs {
        SettingsArgs {
            api_url: None,
            cover_host: None,
            state: None,
            no_persist: false,
            debounce_ms: 500,
            limit: 100,
            timeout_secs: 20,
        }
    }

    #[test]
    fn defaults_without_flags_or_env() {
        let settings = Settings::resolve(&args(), |_| None).unwrap();
        assert_eq!(settings.api_url.as_str(), DEFAULT_SEARCH_URL);
        assert_eq!(settings.cover_host, DEFAULT_COVER_HOST);
        assert_eq!(
            settings.state_path,
            Some(PathBuf::from(DEFAULT_STATE_FILE))
        );
        assert_eq!(settings.debounce, Duration::from_millis(500));
    }

    #[test]
    fn env_fills_missing_flags_and_flags_win() {
        let env = |key: &str| match key {
            "BOOKFINDER_API_URL" => Some("http://127.0.0.1:9/search.json".to_owned()),
            "BOOKFINDER_STATE" => Some("from-env.json".to_owned()),
            _ => None,
        };
        let mut flags = args();
        flags.state = Some("from-flag.json".to_owned());

        let settings = Settings::resolve(&flags, env).unwrap();
        assert_eq!(settings.api_url.as_str(), "http://127.0.0.1:9/search.json");
        assert_eq!(settings.state_path, Some(PathBuf::from("from-flag.json")));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let settings = Settings::resolve(&args(), |_| Some("  ".to_owned())).unwrap();
        assert_eq!(settings.cover_host, DEFAULT_COVER_HOST);
    }

    #[test]
    fn no_persist_drops_state_path() {
        let mut flags = args();
        flags.no_persist = true;
        flags.state = Some("ignored.json".to_owned());
        let settings = Settings::resolve(&flags, |_| None).unwrap();
        assert_eq!(settings.state_path, None);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut flags = args();
        flags.api_url = Some("not a url".to_owned());
        let err = Settings::resolve(&flags, |_| None).unwrap_err().to_string();
        assert!(err.contains("invalid search endpoint"));

        let mut flags = args();
        flags.cover_host = Some("https://covers.example.com".to_owned());
        let err = Settings::resolve(&flags, |_| None).unwrap_err().to_string();
        assert!(err.contains("bare host name"));

        let mut flags = args();
        flags.limit = 0;
        assert!(Settings::resolve(&flags, |_| None).is_err());
    }
}
