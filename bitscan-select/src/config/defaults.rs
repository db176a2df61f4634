/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::num::NonZeroUsize;

/// The number of contiguous column slices a row is partitioned into. Each lane keeps its
/// own running top-k structure, and the lane results are merged pairwise afterwards.
pub const LANES: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// The number of columns a lane stages at a time. At 4 bytes per value, the default tile
/// comfortably fits in the L1 data cache.
pub const TILE: NonZeroUsize = NonZeroUsize::new(2048).unwrap();

/// Conservatively assign one row to each execution group.
pub const ROWS_PER_GROUP: NonZeroUsize = NonZeroUsize::new(1).unwrap();

/// Upper bound on the number of lanes, matching the largest thread block of common
/// accelerators.
pub const MAX_LANES: usize = 1024;

/// Upper bound on the tile length.
pub const MAX_TILE: usize = 1 << 24;
