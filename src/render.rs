use std::fmt::Write as _;

use crate::controller::ReadModel;
use crate::formats::BookSummary;
use crate::languages;
use crate::openlibrary;

pub fn render_model(model: &ReadModel, cover_host: &str) -> String {
    let mut out = String::new();

    if model.loading {
        out.push_str("Searching...\n");
        return out;
    }
    if let Some(error) = &model.error {
        let _ = writeln!(out, "Search failed: {error}");
    }
    if model.is_empty_result() {
        out.push_str("No books found\n");
        return out;
    }

    let visible = model.visible_results();
    if !visible.is_empty() {
        let _ = write!(out, "{} books", model.result_count);
        if let Some(total) = model
            .total_matches
            .filter(|t| *t != model.result_count as u64)
        {
            let _ = write!(out, " ({total} matches)");
        }
        if visible.len() < model.result_count {
            let _ = write!(out, ", showing {}", visible.len());
        }
        if model.restored {
            out.push_str(", restored from cache");
        }
        out.push('\n');
    }

    for (idx, book) in visible.iter().enumerate() {
        out.push('\n');
        out.push_str(&render_card(idx + 1, book, cover_host));
    }

    if !model.suggestions.is_empty() {
        out.push_str("\nSuggestions:\n");
        for (idx, title) in model.suggestions.iter().enumerate() {
            let _ = writeln!(out, "  {idx}: {title}");
        }
    }

    out
}

pub fn render_card(position: usize, book: &BookSummary, cover_host: &str) -> String {
    let mut out = String::new();
    let title = if book.title.trim().is_empty() {
        "(untitled)"
    } else {
        book.title.as_str()
    };
    let _ = writeln!(out, "[{position}] {title}");
    if let Some(author) = &book.author_name {
        let _ = writeln!(out, "    by {author}");
    }
    if let Some(year) = book.first_publish_year {
        let _ = writeln!(out, "    first published {year}");
    }
    if !book.languages.is_empty() {
        let _ = writeln!(out, "    languages: {}", render_languages(&book.languages));
    }
    match openlibrary::cover_url(cover_host, book.cover_id) {
        Some(url) => {
            let _ = writeln!(out, "    cover: {url}");
        }
        None => out.push_str("    cover: No Cover\n"),
    }
    out
}

fn render_languages(codes: &[String]) -> String {
    codes
        .iter()
        .map(|code| match languages::display_name(code) {
            Some(name) => format!("{} ({name})", code.to_uppercase()),
            None => code.to_uppercase(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
