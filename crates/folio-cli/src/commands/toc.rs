//! Table of contents

use anyhow::Result;
use colored::Colorize;
use folio_core::{Config, Viewport};
use serde_json::json;

use crate::output::{OutputFormat, print_json};

/// Print chapters with their 1-based start pages.
pub fn execute(config: &Config, format: OutputFormat) -> Result<()> {
    let document = &config.document;
    match format {
        OutputFormat::Json => {
            let chapters: Vec<_> = document
                .chapters
                .iter()
                .map(|chapter| {
                    json!({
                        "title": chapter.title,
                        "page": chapter.page,
                        "index": Viewport::chapter_start(chapter),
                    })
                })
                .collect();
            print_json(&json!({
                "totalPages": document.total_pages,
                "chapters": chapters,
            }))?;
        },
        OutputFormat::Text => {
            if document.chapters.is_empty() {
                println!("No chapters ({} pages)", document.total_pages);
                return Ok(());
            }
            let width = document.chapters.len().to_string().len();
            for (n, chapter) in document.chapters.iter().enumerate() {
                println!(
                    "{:>width$}. {} {}",
                    n + 1,
                    chapter.title.bold(),
                    format!("(page {})", chapter.page).dimmed()
                );
            }
        },
    }
    Ok(())
}
