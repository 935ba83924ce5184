//! Progress bar for conversions.

use indicatif::{ProgressBar, ProgressStyle};

use metarepo::engine::{ComponentStatus, ConversionObserver};
use metarepo::output::OutputConfig;

/// Renders engine events as an indicatif bar on interactive terminals.
pub struct ProgressObserver {
    bar: Option<ProgressBar>,
    enabled: bool,
}

impl ProgressObserver {
    pub fn new(out: &OutputConfig) -> Self {
        Self {
            bar: None,
            enabled: out.interactive,
        }
    }

    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl ConversionObserver for ProgressObserver {
    fn conversion_started(&mut self, total: usize) {
        if !self.enabled {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        self.bar = Some(bar);
    }

    fn component_started(&mut self, name: &str, _index: usize, _total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_message(name.to_string());
        }
    }

    fn component_finished(&mut self, _name: &str, _status: ComponentStatus) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        self.finish();
    }
}
