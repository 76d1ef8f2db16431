//! Progress display for long batch runs

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting matrix rows
pub fn create_progress_bar(total_rows: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_rows);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] \
             {pos}/{len} rows ({percent}%) ETA: {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
