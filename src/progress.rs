//! Terminal progress bar for batch runs.

use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::app::{ItemAction, ProgressEvent, ProgressSink};

pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        Self::with_target(label, ProgressDrawTarget::stderr())
    }

    pub fn hidden(label: &str) -> Self {
        Self::with_target(label, ProgressDrawTarget::hidden())
    }

    fn with_target(label: &str, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix:.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_prefix(label.to_string());
        Self { bar }
    }

    pub fn set_label(&self, label: &str) {
        self.bar.set_prefix(label.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Wraps `inner` so every log event is written with the bar cleared and
    /// redrawn below it.
    pub fn log_writer<M>(&self, inner: M) -> BarLogWriter<M> {
        BarLogWriter {
            bar: self.bar.clone(),
            inner,
        }
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

pub struct BarLogWriter<M> {
    bar: ProgressBar,
    inner: M,
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for BarLogWriter<M> {
    type Writer = SuspendedWrite<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendedWrite {
            bar: self.bar.clone(),
            inner: self.inner.make_writer(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event and hands it to the inner writer on drop.
pub struct SuspendedWrite<W: Write> {
    bar: ProgressBar,
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> Write for SuspendedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for SuspendedWrite<W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        let inner = &mut self.inner;
        self.bar.suspend(|| {
            let _ = inner.write_all(&buf);
            let _ = inner.flush();
        });
    }
}

impl ProgressSink for BarProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::Item { file_name, action } => {
                let verb = match action {
                    ItemAction::Skipped => "exists",
                    ItemAction::Downloaded => "saved",
                    ItemAction::Failed => "failed",
                    ItemAction::Planned => "planned",
                };
                self.bar.set_message(format!("{verb} {file_name}"));
                self.bar.inc(1);
            }
            ProgressEvent::Finished => self.bar.finish_and_clear(),
        }
    }
}
