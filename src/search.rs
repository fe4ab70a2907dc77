use std::io::Write as _;

use anyhow::Context as _;

use crate::cli::SearchArgs;
use crate::config::Settings;
use crate::controller::SearchController;
use crate::filters::FilterState;

pub async fn run(settings: Settings, args: SearchArgs) -> anyhow::Result<()> {
    let api = settings.search_api()?;
    let store = settings.store();

    // Given flags replace the whole filter; without flags the restored view is shown.
    let filters = args.has_filters().then(|| {
        FilterState::new(
            args.title.clone().unwrap_or_default(),
            args.year.clone().unwrap_or_default(),
            args.language.clone().unwrap_or_default(),
        )
    });
    let handle =
        SearchController::start_with_filters(settings.controller_config(), api, store, filters)
            .await;
    let model = handle.settle().await.context("wait for search")?;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, model.visible_results())
            .context("write results json")?;
        stdout.write_all(b"\n").context("write newline")?;
    } else {
        let text = crate::render::render_model(&model, &settings.cover_host);
        stdout.write_all(text.as_bytes()).context("write results")?;
    }
    stdout.flush().context("flush stdout")?;

    if let Some(error) = model.error {
        anyhow::bail!("search failed: {error}");
    }
    Ok(())
}
