/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::cmp::Ordering;

/// A biased distance tagged with the column it came from.
///
/// Candidates are totally ordered by distance and then by column index, so the smallest
/// `k` candidates of a row are unique and a tie always favors the lower column.
///
/// Distances are canonicalized on construction: `-0.0` becomes `+0.0` and every NaN becomes
/// the positive quiet NaN. Under IEEE total ordering this places NaN after `+inf`, so a NaN
/// is only ever selected once every real value of the row has been selected.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    distance: f32,
    index: u32,
}

impl Candidate {
    #[inline(always)]
    pub(crate) fn new(distance: f32, index: u32) -> Self {
        Self {
            distance: canonicalize(distance),
            index,
        }
    }

    pub(crate) fn distance(&self) -> f32 {
        self.distance
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }
}

#[inline(always)]
fn canonicalize(x: f32) -> f32 {
    if x.is_nan() {
        f32::NAN
    } else if x == 0.0 {
        0.0
    } else {
        x
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

///////////
// Tests //
///////////
