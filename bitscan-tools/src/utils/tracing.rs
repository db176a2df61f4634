/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Install a subscriber logging to `stdout` that respects the `RUST_LOG` environment
/// variable, falling back to the "info" level when it is unset.
pub fn init_subscriber() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .init();
}

/// Install a subscriber for the current test thread only.
///
/// Output goes through the test harness writer, so it is captured per test. The subscriber
/// is removed when the returned guard is dropped.
pub fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_test_writer())
        .set_default()
}
