use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};

use crate::config::Settings;
use crate::controller::{ControllerHandle, SearchController};

const HELP: &str = "\
commands:
  title <text>   set the title filter (debounced)
  year <yyyy>    set the first-publish year filter
  lang <code>    set the language filter
  focus | blur   focus or leave the title field
  pick <n>       choose suggestion n
  show           print the current results
  help           print this help
  quit           exit
a filter command without a value clears that filter
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Title(String),
    Year(String),
    Language(String),
    Focus,
    Blur,
    Pick(usize),
    Show,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> anyhow::Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "title" | "t" => Input::Title(rest.to_owned()),
        "year" | "y" => Input::Year(rest.to_owned()),
        "lang" | "language" | "l" => Input::Language(rest.to_owned()),
        "focus" => Input::Focus,
        "blur" => Input::Blur,
        "pick" | "p" => {
            let index = rest
                .parse::<usize>()
                .with_context(|| format!("pick expects a suggestion number, got {rest:?}"))?;
            Input::Pick(index)
        }
        "show" | "s" => Input::Show,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => anyhow::bail!("unknown command: {other} (try `help`)"),
    };
    Ok(Some(input))
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let api = settings.search_api()?;
    let store = settings.store();
    let handle = SearchController::start(settings.controller_config(), api, store).await;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_model(&mut stdout, &handle, &settings).await?;
    loop {
        stdout.write_all(b"> ").await.context("write prompt")?;
        stdout.flush().await.context("flush stdout")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = match parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(err) => {
                stdout
                    .write_all(format!("{err:#}\n").as_bytes())
                    .await
                    .context("write error")?;
                continue;
            }
        };
        tracing::debug!(?input, "interactive input");

        match input {
            Input::Title(title) => handle.set_title(title)?,
            Input::Year(year) => handle.set_year(year)?,
            Input::Language(language) => handle.set_language(language)?,
            Input::Focus => handle.focus_title()?,
            Input::Blur => handle.blur_title()?,
            Input::Pick(index) => handle.select_suggestion(index)?,
            Input::Show => {}
            Input::Help => {
                stdout.write_all(HELP.as_bytes()).await.context("write help")?;
                continue;
            }
            Input::Quit => break,
        }
        print_model(&mut stdout, &handle, &settings).await?;
    }

    stdout.flush().await.context("flush stdout")?;
    Ok(())
}

async fn print_model(
    stdout: &mut tokio::io::Stdout,
    handle: &ControllerHandle,
    settings: &Settings,
) -> anyhow::Result<()> {
    let model = handle.settle().await?;
    let text = crate::render::render_model(&model, &settings.cover_host);
    stdout
        .write_all(text.as_bytes())
        .await
        .context("write results")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filter_commands() {
        assert_eq!(
            parse_line("title  the left hand of darkness ").unwrap(),
            Some(Input::Title("the left hand of darkness".to_owned()))
        );
        assert_eq!(
            parse_line("y 1969").unwrap(),
            Some(Input::Year("1969".to_owned()))
        );
        assert_eq!(
            parse_line("LANG eng").unwrap(),
            Some(Input::Language("eng".to_owned()))
        );
    }

    #[test]
    fn filter_command_without_value_clears() {
        assert_eq!(
            parse_line("title").unwrap(),
            Some(Input::Title(String::new()))
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn pick_requires_a_number() {
        assert_eq!(parse_line("pick 2").unwrap(), Some(Input::Pick(2)));
        let err = parse_line("pick two").unwrap_err().to_string();
        assert!(err.contains("suggestion number"));
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse_line("fetch dune").unwrap_err().to_string();
        assert!(err.contains("unknown command: fetch"));
    }
}
