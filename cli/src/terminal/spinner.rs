// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

//! # Terminal UI & Logging
//!
//! Wires up the global `tracing` subscriber and owns the progress spinner
//! shown while a network is being built.
//!
//! Log lines are written through the indicatif layer's stderr writer so they
//! always land above the spinner line instead of tearing through it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use colored::*;
use indicatif::ProgressStyle;
use tracing::Span;
use tracing_indicatif::{IndicatifLayer, span_ext::IndicatifSpanExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::terminal::logging;

const TICK: Duration = Duration::from_millis(100);

const TICK_STRINGS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

/// Installs the layer stack: filter, [`logging::VnetFormatter`], indicatif.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str, verbosity: u8) {
    let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICK_STRINGS);
    let indicatif_layer = IndicatifLayer::new().with_progress_style(style);

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .event_format(logging::VnetFormatter {
            max_verbosity: verbosity,
        })
        .with_writer(indicatif_layer.get_stderr_writer());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(formatting_layer)
        .with(indicatif_layer)
        .init();
}

fn run_spinner_loop<F>(span: Span, running: Arc<AtomicBool>, status_fn: F)
where
    F: Fn() -> ColoredString,
{
    let mut last_text = String::new();

    while running.load(Ordering::Relaxed) {
        let current_text = status_fn().to_string();
        // Only redraw when the text changed.
        if current_text != last_text {
            span.pb_set_message(&current_text);
            last_text = current_text;
        }
        thread::sleep(TICK);
    }
}

/// Keeps the spinner message fresh until dropped.
pub struct SpinnerGuard {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SpinnerGuard {
    pub fn with_status<F>(span: Span, status_fn: F) -> Self
    where
        F: Fn() -> ColoredString + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let run_clone = running.clone();

        let handle = thread::spawn(move || run_spinner_loop(span, run_clone, status_fn));

        Self {
            running,
            handle: Some(handle),
        }
    }
}

impl Drop for SpinnerGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
