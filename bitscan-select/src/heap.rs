/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use crate::candidate::Candidate;

/// A bounded max-heap of candidates that operates in place on a caller-provided slice.
///
/// The capacity is the length of the slice. While the heap has free space every pushed
/// candidate is kept. Once full, a pushed candidate replaces the current maximum if it is
/// smaller and is discarded otherwise, so the heap always holds the smallest candidates
/// seen so far.
pub(crate) struct BoundedHeap<'a> {
    data: &'a mut [Candidate],
    len: usize,
}

impl<'a> BoundedHeap<'a> {
    /// Create an empty heap using `data` as storage.
    pub(crate) fn new(data: &'a mut [Candidate]) -> Self {
        Self { data, len: 0 }
    }

    /// Return the number of candidates in the heap.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Return the maximum number of candidates the heap can hold.
    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Return the largest retained candidate, or `None` if the heap is empty.
    #[cfg(test)]
    pub(crate) fn peek(&self) -> Option<&Candidate> {
        self.data[..self.len].first()
    }

    /// Offer `candidate` to the heap.
    #[inline]
    pub(crate) fn push(&mut self, candidate: Candidate) {
        if self.len < self.capacity() {
            self.data[self.len] = candidate;
            self.sift_up(self.len);
            self.len += 1;
        } else if let Some(root) = self.data.first_mut() {
            if candidate < *root {
                *root = candidate;
                self.sift_down(0);
            }
        }
    }

    /// Sort the retained candidates in ascending order and return them.
    pub(crate) fn into_sorted(self) -> &'a mut [Candidate] {
        let Self { data, len } = self;
        let retained = &mut data[..len];
        retained.sort_unstable();
        retained
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.data[parent] >= self.data[pos] {
                return;
            }
            self.data.swap(parent, pos);
            pos = parent;
        }
    }

    /// Restore the heap property below `pos` over the first `self.len` elements.
    fn sift_down(&mut self, mut pos: usize) {
        let len = self.len;
        let mut child = 2 * pos + 1;

        // Loop Invariant: child == 2 * pos + 1
        while child < len {
            // Compare with the greater of the two children.
            if child + 1 < len && self.data[child] < self.data[child + 1] {
                child += 1;
            }

            // If we are already in order, stop.
            if self.data[pos] >= self.data[child] {
                return;
            }

            self.data.swap(pos, child);
            pos = child;
            child = 2 * pos + 1;
        }
    }
}

///////////
// Tests //
///////////
