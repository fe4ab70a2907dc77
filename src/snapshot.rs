use std::io::Write as _;

use anyhow::Context as _;

use crate::config::Settings;
use crate::render;
use crate::store;

pub async fn show(settings: Settings) -> anyhow::Result<()> {
    let store = settings.store();
    let snapshot = store::load_snapshot(store.as_ref())
        .await
        .context("load snapshot")?;

    let mut out = String::new();
    out.push_str(&format!("title: {}\n", snapshot.filters.title));
    out.push_str(&format!("year: {}\n", snapshot.filters.year));
    out.push_str(&format!("language: {}\n", snapshot.filters.language));
    match snapshot.fetched_at {
        Some(ts) => out.push_str(&format!("fetched_at: {}\n", ts.to_rfc3339())),
        None => out.push_str("fetched_at: never\n"),
    }
    out.push_str(&format!("results: {}\n", snapshot.result_count()));
    for (idx, book) in snapshot.results.iter().enumerate() {
        out.push('\n');
        out.push_str(&render::render_card(idx + 1, book, &settings.cover_host));
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes()).context("write snapshot")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

pub async fn clear(settings: Settings) -> anyhow::Result<()> {
    let store = settings.store();
    store::clear_snapshot(store.as_ref())
        .await
        .context("clear snapshot")?;
    tracing::info!(path = ?settings.state_path, "cleared last search");
    Ok(())
}
