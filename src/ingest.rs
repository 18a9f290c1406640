use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{StreamExt, stream};
use ladder_app::{
    domain::match_result::MatchResult,
    workflow::matches::apply_result::{ApplyMatchError, ApplyMatchResultUseCase},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Default)]
pub struct IngestReport {
    applied: AtomicUsize,
    duplicates: AtomicUsize,
    rejected: AtomicUsize,
    failed: AtomicUsize,
}

impl IngestReport {
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

async fn ingest_line(
    line_number: usize,
    line: String,
    use_case: &(dyn ApplyMatchResultUseCase + Send + Sync),
    report: &IngestReport,
) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let result: MatchResult = match serde_json::from_str(line) {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Line {}: malformed match result: {}", line_number, e);
            report.rejected.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    match use_case.apply_match_result(result).await {
        Ok(application) => {
            let changes: Vec<String> = application
                .updates
                .iter()
                .map(|u| format!("{} {:+}", u.player_id, u.rating_change()))
                .collect();
            log::info!(
                "Line {}: applied match {} [{}]",
                line_number,
                application.match_id,
                changes.join(", ")
            );
            report.applied.fetch_add(1, Ordering::Relaxed);
        }
        Err(ApplyMatchError::DuplicateMatch(match_id)) => {
            log::info!("Line {}: match {} already applied", line_number, match_id);
            report.duplicates.fetch_add(1, Ordering::Relaxed);
        }
        Err(
            e @ (ApplyMatchError::InvalidMatch(_)
            | ApplyMatchError::PlayerNotFound(_)
            | ApplyMatchError::PlayerInactive(_)),
        ) => {
            log::warn!("Line {}: rejected: {}", line_number, e);
            report.rejected.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            log::error!("Line {}: failed: {}", line_number, e);
            report.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Applies newline-delimited JSON match results, up to `concurrency` at a
/// time. Stops reading at the first I/O error.
pub async fn ingest<R>(
    reader: R,
    use_case: &(dyn ApplyMatchResultUseCase + Send + Sync),
    concurrency: usize,
) -> IngestReport
where
    R: AsyncBufRead + Unpin,
{
    let report = IngestReport::default();
    let lines = stream::unfold((reader.lines(), 0usize), |(mut lines, n)| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some(((n + 1, line), (lines, n + 1))),
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to read input after line {}: {}", n, e);
                None
            }
        }
    });

    lines
        .for_each_concurrent(concurrency.max(1), |(line_number, line)| {
            ingest_line(line_number, line, use_case, &report)
        })
        .await;
    report
}
