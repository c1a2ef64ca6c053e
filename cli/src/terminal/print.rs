// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use std::sync::OnceLock;

use anyhow::bail;
use colored::*;
use unicode_width::UnicodeWidthStr;
use vnet_common::config::Config;
use vnet_common::success;

use crate::commands::run::DatapathResult;
use crate::terminal::colors;

pub const TOTAL_WIDTH: usize = 64;

/// Target of raw terminal lines, printed without a status symbol.
pub const PRINT_TARGET: &str = "vnet::print";

static PRINT: OnceLock<Print> = OnceLock::new();

#[macro_export]
macro_rules! vprint {
    () => {
        $crate::vprint!("");
    };
    ($($arg:tt)*) => {
        tracing::info!(
            target: "vnet::print",
            raw_msg = %format_args!($($arg)*)
        );
    };
}

pub struct Print {
    no_banner: bool,
    q_level: u8,
}

impl Print {
    fn new(cfg: &Config) -> Self {
        Self {
            no_banner: cfg.no_banner,
            q_level: cfg.quiet,
        }
    }

    pub fn init(cfg: &Config) -> anyhow::Result<()> {
        let term = Self::new(cfg);
        if PRINT.set(term).is_err() {
            bail!("terminal has already been initialized")
        }
        Ok(())
    }

    fn get() -> &'static Self {
        PRINT.get().expect("terminal has not been initialized")
    }

    pub fn banner() {
        let p = Self::get();
        if p.no_banner || p.q_level > 0 {
            return;
        }

        let text_content = format!("⟦ VNET v{} ⟧ ", env!("CARGO_PKG_VERSION"));
        let text_width = UnicodeWidthStr::width(text_content.as_str());
        let text = text_content.bright_green().bold();
        let sep = "═"
            .repeat(TOTAL_WIDTH.saturating_sub(text_width) / 2)
            .bright_black();

        vprint!("{}{}{}", sep, text, sep);
        centerln(&"Welcome to vnet!".color(colors::LABEL).to_string());
        centerln(
            &"hosts, switches and a controller on one machine"
                .color(colors::TEXT_DEFAULT)
                .italic()
                .to_string(),
        );
    }

    /// Summary of every ping test, e.g. `{kernel: "0% dropped"}`.
    pub fn results(results: &[DatapathResult]) {
        let p = Self::get();
        let summary = format_results(results);

        match p.q_level {
            0 => {
                header("test results");
                for (mode, loss) in results {
                    let value = match loss {
                        Some(0) => dropped(*loss).color(colors::LOSS_NONE).bold(),
                        Some(_) => dropped(*loss).color(colors::LOSS_SOME).bold(),
                        None => dropped(*loss).color(colors::SEPARATOR),
                    };
                    aligned_line(&mode.to_string(), value);
                }
                vprint!();
                success!("Test results: {summary}");
            }
            _ => success!("Test results: {summary}"),
        }
    }

    pub fn end_of_program() {
        let p = Self::get();
        if p.q_level > 0 {
            return;
        }
        divider();
    }
}

pub fn header(msg: &str) {
    if PRINT.get().is_some_and(|p| p.q_level > 0) {
        vprint!();
        return;
    }

    let formatted = format!("⟦ {} ⟧", msg);
    let msg_len = formatted.chars().count();

    let dash_count = TOTAL_WIDTH.saturating_sub(msg_len);
    let left = dash_count / 2;
    let right = dash_count - left;

    let line = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    vprint!("{}", line);
}

pub fn divider() {
    vprint!("{}", "═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR));
}

pub fn aligned_line(key: &str, value: ColoredString) {
    let dots = ".".repeat(12usize.saturating_sub(key.len()));
    vprint!(
        "{} {}{}{} {}",
        ">".color(colors::SEPARATOR),
        key.color(colors::LABEL),
        dots.color(colors::SEPARATOR),
        ":".color(colors::SEPARATOR),
        value
    );
}

pub fn centerln(msg: &str) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    vprint!("{}{}{}", space, msg, space);
}

fn dropped(loss: Option<u32>) -> String {
    match loss {
        Some(loss) => format!("{loss}% dropped"),
        None => "no pings".to_string(),
    }
}

fn format_results(results: &[DatapathResult]) -> String {
    let entries: Vec<String> = results
        .iter()
        .map(|(mode, loss)| format!("{mode}: \"{}\"", dropped(*loss)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
