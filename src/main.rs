use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookfinder::logging::init().context("init logging")?;

    let cli = bookfinder::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    if let bookfinder::cli::Command::Languages = cli.command {
        for (code, name) in bookfinder::languages::LANGUAGES {
            println!("{code}\t{name}");
        }
        return Ok(());
    }

    let settings = bookfinder::config::Settings::from_args(&cli.settings).context("settings")?;
    tracing::debug!(?settings, "resolved settings");

    match cli.command {
        bookfinder::cli::Command::Search(args) => {
            bookfinder::search::run(settings, args)
                .await
                .context("search")?;
        }
        bookfinder::cli::Command::Interactive => {
            bookfinder::interactive::run(settings)
                .await
                .context("interactive")?;
        }
        bookfinder::cli::Command::Snapshot {
            command: bookfinder::cli::SnapshotCommand::Show,
        } => {
            bookfinder::snapshot::show(settings)
                .await
                .context("snapshot show")?;
        }
        bookfinder::cli::Command::Snapshot {
            command: bookfinder::cli::SnapshotCommand::Clear,
        } => {
            bookfinder::snapshot::clear(settings)
                .await
                .context("snapshot clear")?;
        }
        bookfinder::cli::Command::Languages => {}
    }

    Ok(())
}
