/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub mod defaults;

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//////////////////
// LaunchConfig //
//////////////////

/// Launch geometry for the fused bias-add + top-k kernel.
///
/// Rows are assigned to execution groups of [`rows_per_group`](Self::rows_per_group) rows.
/// Inside a group, each row is split into at most [`lanes`](Self::lanes) contiguous column
/// slices, and each lane streams its slice through a staging buffer of
/// [`tile`](Self::tile) values.
///
/// The geometry affects performance only. Results are identical for every valid
/// configuration.
///
/// Construct through [`Builder`] or deserialize; both paths validate the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Builder", into = "Builder")]
pub struct LaunchConfig {
    lanes: NonZeroUsize,
    tile: NonZeroUsize,
    rows_per_group: NonZeroUsize,
}

impl LaunchConfig {
    /// Return a [`Builder`] initialized with the default parameters.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Attempt to construct a [`LaunchConfig`] from a builder.
    ///
    /// See: [`Builder::build`].
    pub fn try_from_builder(builder: Builder) -> Result<Self, ConfigError> {
        let lanes = nonzero("lanes", builder.lanes, defaults::LANES)?;
        if lanes.get() > defaults::MAX_LANES {
            return Err(ConfigErrorInner::TooLarge("lanes", lanes.get(), defaults::MAX_LANES).into());
        }

        let tile = nonzero("tile", builder.tile, defaults::TILE)?;
        if tile.get() > defaults::MAX_TILE {
            return Err(ConfigErrorInner::TooLarge("tile", tile.get(), defaults::MAX_TILE).into());
        }

        let rows_per_group = nonzero(
            "rows_per_group",
            builder.rows_per_group,
            defaults::ROWS_PER_GROUP,
        )?;

        Ok(Self {
            lanes,
            tile,
            rows_per_group,
        })
    }

    //-----------//
    // Accessors //
    //-----------//

    pub fn lanes(&self) -> NonZeroUsize {
        self.lanes
    }

    pub fn tile(&self) -> NonZeroUsize {
        self.tile
    }

    pub fn rows_per_group(&self) -> NonZeroUsize {
        self.rows_per_group
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            lanes: defaults::LANES,
            tile: defaults::TILE,
            rows_per_group: defaults::ROWS_PER_GROUP,
        }
    }
}

impl TryFrom<Builder> for LaunchConfig {
    type Error = ConfigError;
    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        Self::try_from_builder(builder)
    }
}

fn nonzero(
    param: &'static str,
    value: Option<usize>,
    default: NonZeroUsize,
) -> Result<NonZeroUsize, ConfigErrorInner> {
    match value {
        None => Ok(default),
        Some(value) => NonZeroUsize::new(value).ok_or(ConfigErrorInner::Zero(param)),
    }
}

/////////////
// Builder //
/////////////

/// A builder for [`LaunchConfig`]. Parameters left unset take the values in [`defaults`].
///
/// This is also the serialized form of [`LaunchConfig`], so every field is optional in
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Builder {
    #[serde(skip_serializing_if = "Option::is_none")]
    lanes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tile: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_per_group: Option<usize>,
}

impl Builder {
    /// Construct a builder with every parameter unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of lanes each row is partitioned into. Must be in `1..=1024`.
    pub fn lanes(&mut self, lanes: usize) -> &mut Self {
        self.lanes = Some(lanes);
        self
    }

    /// Set the number of columns a lane stages at a time. Must be in `1..=2^24`.
    pub fn tile(&mut self, tile: usize) -> &mut Self {
        self.tile = Some(tile);
        self
    }

    /// Set the number of rows assigned to each execution group. Must be non-zero.
    pub fn rows_per_group(&mut self, rows_per_group: usize) -> &mut Self {
        self.rows_per_group = Some(rows_per_group);
        self
    }

    /// Validate the parameters and construct a [`LaunchConfig`].
    ///
    /// # Errors
    ///
    /// Fails if any parameter is zero, if `lanes` exceeds [`defaults::MAX_LANES`], or if
    /// `tile` exceeds [`defaults::MAX_TILE`].
    pub fn build(&self) -> Result<LaunchConfig, ConfigError> {
        LaunchConfig::try_from_builder(self.clone())
    }
}

impl From<LaunchConfig> for Builder {
    fn from(config: LaunchConfig) -> Self {
        Self {
            lanes: Some(config.lanes.get()),
            tile: Some(config.tile.get()),
            rows_per_group: Some(config.rows_per_group.get()),
        }
    }
}

//////////////////
// DeviceConfig //
//////////////////

/// Configuration of a [`crate::Device`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Number of worker threads in the device pool. `None` lets the pool pick one per
    /// available core.
    pub num_threads: Option<NonZeroUsize>,

    /// Launch geometry used for every kernel run on the device.
    pub launch: LaunchConfig,
}

impl DeviceConfig {
    /// Construct a configuration with an explicit thread count and launch geometry.
    pub fn new(num_threads: Option<NonZeroUsize>, launch: LaunchConfig) -> Self {
        Self {
            num_threads,
            launch,
        }
    }
}

////////////
// Errors //
////////////

/// Errors that can occur when building a [`LaunchConfig`].
///
/// See [`Builder::build`] for possible failure modes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(transparent)]
pub struct ConfigError {
    #[from]
    inner: ConfigErrorInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum ConfigErrorInner {
    #[error("parameter \"{0}\" invalid because it cannot be zero")]
    Zero(&'static str),
    #[error("parameter \"{0}\" ({1}) must not exceed {2}")]
    TooLarge(&'static str, usize, usize),
}

///////////
// Tests //
///////////
