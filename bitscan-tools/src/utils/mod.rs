/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
pub mod tracing;

pub mod input;
pub use input::*;

pub mod runner;
pub use runner::*;
