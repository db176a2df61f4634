/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::sync::Arc;

use thiserror::Error;

/// The length of a buffer did not match the requested matrix shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
#[error(
    "tried to construct a matrix view with {nrows} rows and {ncols} columns over a slice \
     of length {len}"
)]
pub struct TryFromError {
    len: usize,
    nrows: usize,
    ncols: usize,
}

////////////////
// MatrixView //
////////////////

/// A borrowed, row-major, dense matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    nrows: usize,
    ncols: usize,
}

impl<'a, T> MatrixView<'a, T> {
    /// Try to construct a `MatrixView` over `data`.
    ///
    /// The length of `data` must be equal to `nrows * ncols`.
    pub fn try_from(data: &'a [T], nrows: usize, ncols: usize) -> Result<Self, TryFromError> {
        let len = data.len();
        if nrows.checked_mul(ncols) != Some(len) {
            Err(TryFromError { len, nrows, ncols })
        } else {
            Ok(Self { data, nrows, ncols })
        }
    }

    /// Return the number of columns in the matrix.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Return the number of rows in the matrix.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return the underlying data as a slice.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Return row `row` as a slice, or `None` if `row` is out of bounds.
    pub fn get_row(&self, row: usize) -> Option<&'a [T]> {
        if row < self.nrows {
            let start = row * self.ncols;
            self.data.get(start..start + self.ncols)
        } else {
            None
        }
    }
}

//////////////////////
// Device Resources //
//////////////////////

/// A row-major `f32` matrix shared with the device.
///
/// The contents are immutable and reference counted, so a launch holding a handle can never
/// observe a concurrent write. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct DeviceMatrix {
    data: Arc<[f32]>,
    nrows: usize,
    ncols: usize,
}

impl DeviceMatrix {
    /// Upload `data` as an `nrows x ncols` row-major matrix.
    pub fn try_from<T>(data: T, nrows: usize, ncols: usize) -> Result<Self, TryFromError>
    where
        T: Into<Arc<[f32]>>,
    {
        let data = data.into();
        MatrixView::try_from(&*data, nrows, ncols)?;
        Ok(Self { data, nrows, ncols })
    }

    /// Return the number of columns in the matrix.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Return the number of rows in the matrix.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return a borrowed view of the matrix.
    pub fn view(&self) -> MatrixView<'_, f32> {
        MatrixView {
            data: &self.data,
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }
}

/// An `f32` vector shared with the device.
#[derive(Debug, Clone)]
pub struct DeviceVector {
    data: Arc<[f32]>,
}

impl DeviceVector {
    /// Upload `data`.
    pub fn new<T>(data: T) -> Self
    where
        T: Into<Arc<[f32]>>,
    {
        Self { data: data.into() }
    }

    /// Return the number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return `true` if the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the contents as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

///////////
// Tests //
///////////
