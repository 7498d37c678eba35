//! Single page load

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use folio_core::LoadedPage;
use serde::Serialize;

use crate::context::App;
use crate::output::{OutputFormat, print_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageSummary<'a> {
    page: usize,
    key: String,
    mime: &'a str,
    bytes: usize,
    origin: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    written_to: Option<String>,
}

impl<'a> PageSummary<'a> {
    fn new(page: &'a LoadedPage, out: Option<&Path>) -> Self {
        Self {
            page: page.index + 1,
            key: folio_core::PageKey::from_index(page.index).to_string(),
            mime: page.blob.mime(),
            bytes: page.blob.len(),
            origin: page.origin.as_str(),
            written_to: out.map(|p| p.display().to_string()),
        }
    }
}

/// Load a 1-based page through the cache, optionally writing the image to `out`.
pub async fn execute(app: &App, number: u64, out: Option<&Path>, format: OutputFormat) -> Result<()> {
    let total = app.config.document.total_pages;
    let index = i64::try_from(number)
        .context("page number too large")?
        .saturating_sub(1);

    let Some(page) = app.loader()?.load_page(index).await? else {
        bail!("page {number} is outside the document (1..={total})");
    };

    if let Some(path) = out {
        std::fs::write(path, page.blob.bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let summary = PageSummary::new(&page, out);
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            let origin = match page.origin {
                folio_core::LoadOrigin::Cache => summary.origin.green(),
                folio_core::LoadOrigin::Network => summary.origin.cyan(),
            };
            print!(
                "{} page {}/{total}: {} bytes {} from {origin}",
                "✓".green(),
                summary.page,
                summary.bytes,
                summary.mime,
            );
            match &summary.written_to {
                Some(path) => println!(" → {path}"),
                None => println!(),
            }
        },
    }
    Ok(())
}
