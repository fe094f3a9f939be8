//! Progress reporting (OBS): the phases a long-running volume operation passes through, and an
//! `indicatif`-backed sink the CLI hands the engine. The engine itself never touches a terminal;
//! it only calls `ProgressSink::on_progress`.

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compress,
    Combine,
    Denial,
    Encrypt,
    Decrypt,
    Repair,
    Split,
    Recombine,
    Unpack,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Compress => "Compressing",
            Phase::Combine => "Combining inputs",
            Phase::Denial => "Wrapping deniability layer",
            Phase::Encrypt => "Encrypting",
            Phase::Decrypt => "Decrypting",
            Phase::Repair => "Repairing (Reed-Solomon)",
            Phase::Split => "Splitting",
            Phase::Recombine => "Recombining",
            Phase::Unpack => "Unpacking",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

/// Callback the volume engine drives at every 1 MiB block boundary. The CLI supplies one backed
/// by `indicatif`; tests typically supply a closure that just records events.
pub trait ProgressSink {
    fn on_progress(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn on_progress(&mut self, event: ProgressEvent) {
        self(event)
    }
}

pub struct NullProgress;
impl ProgressSink for NullProgress {
    fn on_progress(&mut self, _event: ProgressEvent) {}
}

const PROGRESS_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// A terminal progress bar driven by `ProgressEvent`s, one per `Phase` encountered.
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    phase: Option<Phase>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self { bar: None, phase: None }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&mut self, event: ProgressEvent) {
        if self.phase != Some(event.phase) {
            if let Some(bar) = self.bar.take() {
                bar.finish_and_clear();
            }
            let bar = ProgressBar::new(event.bytes_total);
            if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
                bar.set_style(style.progress_chars("##-"));
            }
            bar.set_message(event.phase.label());
            self.bar = Some(bar);
            self.phase = Some(event.phase);
        }
        if let Some(bar) = &self.bar {
            bar.set_position(event.bytes_done);
            if event.bytes_done >= event.bytes_total {
                bar.finish();
            }
        }
    }
}
