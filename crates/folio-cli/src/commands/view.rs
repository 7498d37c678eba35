//! Scripted viewer: step a viewport through moves and show what each slot renders

use anyhow::{Result, bail};
use colored::Colorize;
use folio_core::{LoadedPage, PageLoader, PageSource, Slot, Viewport};
use futures::future::join_all;
use serde::Serialize;

use crate::cli::Move;
use crate::context::App;
use crate::output::{OutputFormat, print_json};

/// What a slot displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SlotView {
    /// Bound but no result yet
    Placeholder,
    /// Outside the document
    Empty,
    Page {
        page: usize,
        bytes: usize,
        origin: &'static str,
    },
    /// Load failed; retrying is loading the page again
    Error { page: usize, message: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    /// Move that produced this frame; `None` for the starting position
    #[serde(rename = "move")]
    step: Option<String>,
    moved: bool,
    page: usize,
    chapter: Option<String>,
    slots: Vec<SlotFrame>,
}

#[derive(Debug, Clone, Serialize)]
struct SlotFrame {
    slot: String,
    #[serde(flatten)]
    view: SlotView,
}

/// Start on `start` (1-based), render, then apply each move and render again.
pub async fn execute(app: &App, start: u64, moves: &[Move], format: OutputFormat) -> Result<()> {
    let total = app.config.document.total_pages;
    let mut viewport = Viewport::for_document(app.config.document.clone());
    let start_index = usize::try_from(start).unwrap_or(usize::MAX).saturating_sub(1);
    if start_index >= total {
        bail!("start page {start} is outside the document (1..={total})");
    }
    viewport.go_to(start_index);

    let loader = app.loader()?;
    let mut frames = vec![render(&mut viewport, &loader, None).await];

    for step in moves {
        let moved = match *step {
            Move::Next => viewport.next(),
            Move::Previous => viewport.previous(),
            Move::GoTo(page) => viewport.go_to(page - 1),
        };
        let label = Some(describe_move(*step));
        let frame = if moved {
            render(&mut viewport, &loader, label).await
        } else {
            let slots = frames.last().map(|f| f.slots.clone()).unwrap_or_default();
            Frame {
                step: label,
                moved: false,
                page: viewport.current() + 1,
                chapter: chapter_title(&viewport),
                slots,
            }
        };
        frames.push(frame);
    }

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "totalPages": total,
            "frames": frames,
            "loadedPages": viewport.loaded_count(),
        }))?,
        OutputFormat::Text => {
            for frame in &frames {
                print_frame(frame, total);
            }
            println!("{} distinct pages rendered", viewport.loaded_count());
        },
    }
    Ok(())
}

async fn render<S: PageSource>(
    viewport: &mut Viewport,
    loader: &PageLoader<S>,
    step: Option<String>,
) -> Frame {
    let window = viewport.bind_window();
    let mut views = [SlotView::Placeholder, SlotView::Placeholder, SlotView::Placeholder];

    let results = join_all(window.iter().map(|&(slot, index)| async move {
        (slot, index, loader.load_page(index).await)
    }))
    .await;

    for (slot, index, result) in results {
        apply(viewport, &mut views, slot, index, result);
    }

    Frame {
        step,
        moved: true,
        page: viewport.current() + 1,
        chapter: chapter_title(viewport),
        slots: Slot::ALL
            .iter()
            .zip(views)
            .map(|(slot, view)| SlotFrame {
                slot: slot.to_string(),
                view,
            })
            .collect(),
    }
}

/// Apply a finished load to its slot unless the slot has been rebound since.
fn apply(
    viewport: &mut Viewport,
    views: &mut [SlotView; 3],
    slot: Slot,
    index: i64,
    result: folio_core::Result<Option<LoadedPage>>,
) {
    if !viewport.is_bound(slot, index) {
        tracing::debug!(%slot, index, "discarding stale page result");
        return;
    }
    let position = Slot::ALL.iter().position(|s| *s == slot).unwrap_or(1);
    views[position] = match result {
        Ok(Some(page)) => {
            viewport.mark_loaded(page.index);
            SlotView::Page {
                page: page.index + 1,
                bytes: page.blob.len(),
                origin: page.origin.as_str(),
            }
        },
        Ok(None) => SlotView::Empty,
        Err(e) => SlotView::Error {
            page: usize::try_from(index).map_or(0, |i| i + 1),
            message: e.to_string(),
        },
    };
}

fn chapter_title(viewport: &Viewport) -> Option<String> {
    viewport.current_chapter().map(|c| c.title.clone())
}

fn describe_move(step: Move) -> String {
    match step {
        Move::Next => "next".to_string(),
        Move::Previous => "previous".to_string(),
        Move::GoTo(page) => format!("go to {page}"),
    }
}

fn print_frame(frame: &Frame, total: usize) {
    if let Some(step) = &frame.step {
        if !frame.moved {
            println!("{} {step}: {}", "→".dimmed(), "no move".dimmed());
            return;
        }
        println!("{} {step}", "→".dimmed());
    }
    let chapter = frame
        .chapter
        .as_deref()
        .map(|c| format!(" · {c}"))
        .unwrap_or_default();
    println!("{}{chapter}", format!("page {}/{total}", frame.page).bold());
    for SlotFrame { slot, view } in &frame.slots {
        let line = match view {
            SlotView::Placeholder => "loading…".dimmed().to_string(),
            SlotView::Empty => "empty".dimmed().to_string(),
            SlotView::Page {
                page,
                bytes,
                origin,
            } => format!("page {page} ({origin}, {bytes} bytes)"),
            SlotView::Error { message, .. } => format!("{} {message}", "error:".red()),
        };
        println!("  {slot:<8} {line}");
    }
}
