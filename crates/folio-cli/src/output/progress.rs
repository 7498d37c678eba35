//! Progress display for the prefetch command

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar for a prefetch run.
///
/// Starts with an unknown length; the first progress report sets it to the gap
/// size. Hidden entirely when `visible` is false.
pub fn prefetch_bar(visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(0);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
