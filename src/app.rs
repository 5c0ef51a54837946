use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::domain::{IndexedRecord, Layout};
use crate::error::KiraError;
use crate::extract::extract_from_log;
use crate::fetch::{FetchOutcome, ImageClient, Pause, RetryingFetcher};
use crate::sources::{correlate, eligible, load_sources};
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub layout: Layout,
    pub delay: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct RetryRequest {
    pub sources: Vec<PathBuf>,
    pub log_file: PathBuf,
    pub options: BatchOptions,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub sources: Vec<PathBuf>,
    pub options: BatchOptions,
}

/// Success and failure only count records a fetch was attempted for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTally {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub planned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NoFailedUrls,
    NoMatchingRecords,
    NoEligibleRecords,
}

impl RunStatus {
    pub fn aborted_early(&self) -> bool {
        !matches!(self, RunStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub command: String,
    pub status: RunStatus,
    pub output_dir: String,
    pub layout: Layout,
    pub dry_run: bool,
    pub failed_urls: Option<usize>,
    pub records_loaded: usize,
    pub records_selected: usize,
    pub tally: BatchTally,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Skipped,
    Downloaded,
    Failed,
    Planned,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { total: usize },
    Item { file_name: String, action: ItemAction },
    Finished,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: ImageClient, P: Pause> {
    store: Store,
    fetcher: RetryingFetcher<C, P>,
}

impl<C: ImageClient, P: Pause> App<C, P> {
    pub fn new(store: Store, fetcher: RetryingFetcher<C, P>) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn fetcher(&self) -> &RetryingFetcher<C, P> {
        &self.fetcher
    }

    /// Re-fetches only the images a previous run logged as failed.
    pub fn retry_failed(
        &self,
        request: &RetryRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, KiraError> {
        let started_at = Utc::now();
        let mut report = self.empty_report("retry", request.options, started_at);

        let failed = extract_from_log(&request.log_file)?;
        info!(
            urls = failed.len(),
            log = %request.log_file.display(),
            "extracted image URLs from log"
        );
        report.failed_urls = Some(failed.len());
        if failed.is_empty() {
            error!(log = %request.log_file.display(), "no image URLs found in the log file");
            return Ok(finish(report, RunStatus::NoFailedUrls));
        }

        let records = load_sources(&request.sources)?;
        report.records_loaded = records.len();
        let subset = correlate(&records, &failed);
        info!(rows = subset.len(), "source rows matching failed URLs");
        report.records_selected = subset.len();
        if subset.is_empty() {
            error!("none of the failed URLs appear in the source tables");
            return Ok(finish(report, RunStatus::NoMatchingRecords));
        }

        report.tally = self.run_batch(&subset, request.options, sink)?;
        Ok(finish(report, RunStatus::Completed))
    }

    /// Fetches every eligible record in the sources.
    pub fn download_all(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, KiraError> {
        let started_at = Utc::now();
        let mut report = self.empty_report("download", request.options, started_at);

        let records = load_sources(&request.sources)?;
        report.records_loaded = records.len();
        let selected = eligible(&records);
        report.records_selected = selected.len();
        if selected.is_empty() {
            error!("no source rows have both scientific_name and image_url");
            return Ok(finish(report, RunStatus::NoEligibleRecords));
        }

        if !request.options.dry_run && request.options.layout == Layout::Nested {
            self.store.ensure_root()?;
            let created = self.store.ensure_taxon_dirs(&selected);
            info!(created, "created species directories");
        }

        report.tally = self.run_batch(&selected, request.options, sink)?;
        Ok(finish(report, RunStatus::Completed))
    }

    /// Drives the fetcher over `records` one at a time. A file already at the
    /// destination is left alone and only counted as skipped. Only a missing
    /// output root stops the batch; anything that goes wrong for a single
    /// record is counted as a failure.
    pub fn run_batch(
        &self,
        records: &[IndexedRecord],
        options: BatchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BatchTally, KiraError> {
        let mut tally = BatchTally::default();
        if !options.dry_run {
            self.store.ensure_root()?;
        }
        sink.event(ProgressEvent::Started {
            total: records.len(),
        });

        for indexed in records {
            let Some(image_url) = indexed.record.image_url.as_deref() else {
                continue;
            };
            if indexed.record.scientific_name.is_none() {
                continue;
            }
            let destination = self.store.destination(options.layout, indexed);
            let file_name = indexed.file_name();

            if Store::exists(&destination) {
                debug!(path = %destination, "skipping existing file");
                tally.skipped += 1;
                sink.event(ProgressEvent::Item {
                    file_name,
                    action: ItemAction::Skipped,
                });
                continue;
            }

            if options.dry_run {
                info!(url = image_url, path = %destination, "would download");
                tally.planned += 1;
                sink.event(ProgressEvent::Item {
                    file_name,
                    action: ItemAction::Planned,
                });
                continue;
            }

            if let Err(err) = Store::ensure_parent(&destination) {
                error!(path = %destination, error = %err, "cannot prepare destination");
                tally.failure += 1;
                sink.event(ProgressEvent::Item {
                    file_name,
                    action: ItemAction::Failed,
                });
                continue;
            }
            let action = match self.fetcher.fetch(image_url, destination.as_std_path()) {
                FetchOutcome::Downloaded { .. } => {
                    tally.success += 1;
                    ItemAction::Downloaded
                }
                FetchOutcome::Failed { .. } => {
                    tally.failure += 1;
                    ItemAction::Failed
                }
            };
            sink.event(ProgressEvent::Item { file_name, action });
            self.fetcher.idle(options.delay);
        }

        sink.event(ProgressEvent::Finished);
        info!(
            success = tally.success,
            failure = tally.failure,
            skipped = tally.skipped,
            "downloads complete"
        );
        Ok(tally)
    }

    fn empty_report(
        &self,
        command: &str,
        options: BatchOptions,
        started_at: DateTime<Utc>,
    ) -> RunReport {
        RunReport {
            command: command.to_string(),
            status: RunStatus::Completed,
            output_dir: self.store.root().to_string(),
            layout: options.layout,
            dry_run: options.dry_run,
            failed_urls: None,
            records_loaded: 0,
            records_selected: 0,
            tally: BatchTally::default(),
            started_at,
            finished_at: started_at,
        }
    }
}

fn finish(mut report: RunReport, status: RunStatus) -> RunReport {
    report.status = status;
    report.finished_at = Utc::now();
    report
}
