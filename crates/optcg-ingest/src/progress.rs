//! Progress bar for bulk uploads

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::store::{ProgressObserver, UploadProgress};

/// Create a progress bar for batch uploads
pub fn create_upload_progress(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {percent}% ({msg})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_prefix(message.to_string());
    pb
}

/// Apply one progress observation to a bar
pub fn apply_progress(pb: &ProgressBar, progress: &UploadProgress) {
    if progress.current == 0 {
        pb.reset();
    }
    pb.set_length(progress.total as u64);
    pb.set_position(progress.current as u64);
    pb.set_message(format!("{} failed", progress.failed));

    if progress.current >= progress.total {
        pb.finish();
    }
}

/// Observer that drives `pb` from upload progress reports
pub fn upload_observer(pb: ProgressBar) -> ProgressObserver {
    Arc::new(move |progress: &UploadProgress| apply_progress(&pb, progress))
}
