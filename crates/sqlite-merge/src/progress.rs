//! Progress reporting for long-running merges.
//!
//! The engine reports through the [`ProgressReporter`] trait so that
//! embedders can plug in their own sink. [`TermProgress`] renders an
//! indicatif bar when attached to a terminal and falls back to plain
//! console lines otherwise (progress bars render nothing useful in CI
//! logs). [`NullProgress`] discards everything.

use std::io::{self, IsTerminal};

use indicatif::{ProgressBar, ProgressStyle};

/// Sink for per-model merge progress.
///
/// The merge driver calls `begin` once per model with the summed row count
/// of all sources, `advance` after every batch commit with the number of
/// rows it contributed, and `complete` when the model is done.
pub trait ProgressReporter {
    fn begin(&mut self, model: &str, total_rows: u64);
    fn advance(&mut self, rows: u64);
    fn complete(&mut self);
}

/// Reporter that discards all updates.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn begin(&mut self, _model: &str, _total_rows: u64) {}
    fn advance(&mut self, _rows: u64) {}
    fn complete(&mut self) {}
}

/// Terminal reporter: progress bar, or console lines when stdin is not a
/// terminal.
#[derive(Debug, Default)]
pub struct TermProgress {
    bar: Option<ProgressBar>,
    model: String,
    total_rows: u64,
    count: u64,
}

impl TermProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn print_line(&self) {
        println!(
            "{}: Processed {}/{} records",
            self.model, self.count, self.total_rows
        );
    }

    fn begin_mode(&mut self, model: &str, total_rows: u64, terminal: bool) {
        self.model = model.to_string();
        self.total_rows = total_rows;
        self.count = 0;
        self.bar = None;

        if terminal {
            let bar = ProgressBar::new(total_rows);

            let template = format!(
                "{{spinner:.green}} {} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {{pos}}/{{len}}",
                model
            );

            if let Ok(style) = ProgressStyle::with_template(&template) {
                bar.set_style(style.progress_chars("#>-"));
            }

            self.bar = Some(bar);
        }
    }
}

impl ProgressReporter for TermProgress {
    fn begin(&mut self, model: &str, total_rows: u64) {
        self.begin_mode(model, total_rows, io::stdin().is_terminal());
    }

    fn advance(&mut self, rows: u64) {
        match &self.bar {
            Some(bar) => bar.inc(rows),
            None => {
                self.count += rows;

                if rows != 0 {
                    self.print_line();
                }
            }
        }
    }

    fn complete(&mut self) {
        match self.bar.take() {
            Some(bar) => bar.finish(),
            None => {
                self.count = self.total_rows;
                self.print_line();
            }
        }
    }
}
