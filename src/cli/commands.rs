use crate::app::{AppContext, GitaError, Result};
use crate::domain::{Persona, Theme};
use crate::reader::VerseRef;
use crate::store::PreferencesExt;
use crate::worker::WorkerHandle;

const PREVIEW_CHARS: usize = 100;

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

fn print_verse_card(location: &VerseRef) {
    println!(
        "Chapter {}, Verse {}",
        location.chapter, location.verse.verse_number
    );
    println!("  {}", location.verse.primary_text);
    println!("  {}", preview(location.verse.translation_text()));
}

pub async fn list_chapters(ctx: &AppContext) -> Result<()> {
    for meta in ctx.reader.chapters().await {
        println!(
            "{:>2}. {} ({}) - {} verses",
            meta.number, meta.title, meta.native_title, meta.verse_count
        );
    }

    if let Some(last) = ctx.reader.last_read()? {
        println!(
            "\nContinue reading: {} {}.{}",
            last.chapter_title, last.chapter, last.verse
        );
    }
    Ok(())
}

pub async fn show_chapter(ctx: &AppContext, number: u32) -> Result<()> {
    let chapter = ctx.reader.chapter(number).await?;

    println!("Chapter {}: {}", chapter.number, chapter.title);
    println!("{}\n", chapter.native_title);
    if !chapter.introduction.is_empty() {
        println!("{}\n", chapter.introduction);
    }

    for verse in &chapter.verses {
        println!("Verse {}: {}", verse.verse_number, verse.primary_text);
    }
    Ok(())
}

pub async fn show_verse(
    ctx: &AppContext,
    chapter: u32,
    verse: u32,
    persona: Option<Persona>,
) -> Result<()> {
    let detail = ctx.reader.verse(chapter, verse, persona).await?;
    let location = &detail.location;
    let star = if detail.bookmarked { " *" } else { "" };

    println!(
        "Chapter {}, Verse {}{}\n",
        location.chapter, location.verse.verse_number, star
    );
    println!("{}\n", location.verse.primary_text);
    if let Some(transliteration) = &location.verse.transliteration {
        println!("{}\n", transliteration);
    }
    if let Some(translation) = &location.verse.translation {
        println!("Translation\n{}\n", translation);
    }
    if let Some(explanation) = &detail.explanation {
        println!("For our generation ({})\n{}\n", detail.persona, explanation);
    }

    let nav: Vec<String> = [
        detail.previous.map(|v| format!("previous: {}.{}", location.chapter, v)),
        detail.next.map(|v| format!("next: {}.{}", location.chapter, v)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !nav.is_empty() {
        println!("[{}]", nav.join(" | "));
    }
    Ok(())
}

pub async fn search(ctx: &AppContext, query: &str) -> Result<()> {
    let hits = ctx.reader.search(query).await;
    if hits.is_empty() {
        println!("No results");
        return Ok(());
    }

    for hit in &hits {
        print_verse_card(hit);
    }
    Ok(())
}

pub async fn daily(ctx: &AppContext) -> Result<()> {
    match ctx.reader.verse_of_the_day().await {
        Some(location) => print_verse_card(&location),
        None => println!("Verse of the day is not available offline yet"),
    }
    Ok(())
}

pub async fn share(ctx: &AppContext, chapter: u32, verse: u32) -> Result<()> {
    let detail = ctx.reader.verse(chapter, verse, None).await?;
    println!("{}", detail.location.share_text());
    Ok(())
}

pub fn toggle_bookmark(ctx: &AppContext, chapter: u32, verse: u32) -> Result<()> {
    if ctx.reader.toggle_bookmark(chapter, verse)? {
        println!("Bookmarked {}.{}", chapter, verse);
    } else {
        println!("Removed bookmark {}.{}", chapter, verse);
    }
    Ok(())
}

pub async fn list_bookmarks(ctx: &AppContext) -> Result<()> {
    let bookmarks = ctx.reader.bookmarks().await?;
    if bookmarks.is_empty() {
        println!("No bookmarks yet. Start exploring!");
        return Ok(());
    }

    for (_, location) in &bookmarks {
        print_verse_card(location);
    }
    Ok(())
}

pub fn set_theme(ctx: &AppContext, theme: Option<Theme>) -> Result<()> {
    let theme = match theme {
        Some(theme) => theme,
        None => ctx.preferences.theme()?.toggled(),
    };
    ctx.preferences.set_theme(theme)?;
    println!("Theme: {}", theme);
    Ok(())
}

pub async fn push(worker: &WorkerHandle, payload: Option<String>) -> Result<()> {
    worker.push(payload.map(String::into_bytes)).await;
    // Events are handled in order, so the push is done once the worker stops
    worker.terminate().await;
    worker.terminated().await;
    Ok(())
}

pub async fn refresh(ctx: &AppContext) -> Result<()> {
    let outcome = ctx.refresh.refresh().await;
    if outcome.is_success() {
        Ok(())
    } else {
        Err(GitaError::Other(format!(
            "{} refresh step(s) failed",
            outcome.failed_steps.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_text() {
        assert_eq!(preview("short"), "short");
        let long = "a".repeat(150);
        let cut = preview(&long);
        assert_eq!(cut.len(), PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
    }
}
