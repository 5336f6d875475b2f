#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `access_map` binary.
//!
//! [`init_logger`] routes `log` output through `indicatif-log-bridge`, and
//! [`IndicatifProgress`] adapts an `indicatif` bar to the pipeline's
//! [`ProgressCallback`].

use std::sync::Arc;
use std::time::Duration;

use access_map_pipeline::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(120);

const PASS_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const GROUPS_TEMPLATE: &str =
    "  {msg} {wide_bar:.cyan/dim} {pos}/{len} groups [{elapsed_precise}]";
const FILES_TEMPLATE: &str = "{msg} {wide_bar:.green/dim} {pos}/{len} files";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).map_or_else(
        |_| ProgressStyle::default_bar(),
        |style| style.progress_chars("=> "),
    )
}

/// Progress reporting backed by a bar inside a [`MultiProgress`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied when the pipeline announces a total.
    sized: ProgressStyle,
}

impl IndicatifProgress {
    fn attach(
        multi: &MultiProgress,
        bar: ProgressBar,
        message: &str,
        sized: ProgressStyle,
    ) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(bar);
        bar.set_message(message.to_string());
        Arc::new(Self { bar, sized })
    }

    /// A spinner naming the current analysis pass. It turns into a
    /// per-group bar once clustering reports how many groups there are.
    #[must_use]
    pub fn passes_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = ProgressBar::new_spinner().with_style(style(PASS_TEMPLATE));
        bar.enable_steady_tick(TICK);
        Self::attach(multi, bar, message, style(GROUPS_TEMPLATE))
    }

    /// A bar over a known number of output files.
    #[must_use]
    pub fn steps_bar(
        multi: &MultiProgress,
        message: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        let sized = style(FILES_TEMPLATE);
        let bar = ProgressBar::new(total).with_style(sized.clone());
        Self::attach(multi, bar, message, sized)
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.sized.clone());
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge` and returns the [`MultiProgress`] every bar
/// must be added to. A second call leaves the existing logger in place.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_timed_builder()
        .parse_env("RUST_LOG")
        .build();
    let max_level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}
