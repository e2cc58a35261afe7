// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

const LEVEL_NAMES: &str = "trace, debug, info, warn, error";

/// Parse a log level name, case-insensitive.
pub fn parse_level(name: &str) -> Result<Level, String> {
    name.trim().parse::<Level>().map_err(|_| {
        format!(
            "unknown log level '{}' (expected one of: {})",
            name, LEVEL_NAMES
        )
    })
}

/// Install the global fmt subscriber, INFO when no level is given.
///
/// An unparsable level falls back to INFO with a warning. Returns false
/// when a subscriber was already installed.
pub fn init_logging(log_level: Option<&str>) -> bool {
    let parsed = log_level.map(parse_level).transpose();
    let level = parsed.clone().ok().flatten().unwrap_or(Level::INFO);

    let installed = FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .try_init()
        .is_ok();
    if let Err(e) = parsed {
        warn!("{}, logging at info", e);
    }
    installed
}
