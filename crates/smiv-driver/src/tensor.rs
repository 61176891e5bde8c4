// SPDX-License-Identifier: AGPL-3.0-only

//! Strided 4-D views over flat `f32` storage.
//!
//! Every host and accelerator tensor in this crate is a flat slice whose
//! logical shape is `[images][channels][rows][cols + pad]`. The views give
//! bounds-checked multi-dimensional access without reinterpreting pointers;
//! indexing past any axis panics the same way slice indexing does, and the
//! `get`/`range` accessors report it instead.

use crate::error::{Result, SmivError};
use smiv_models::Dims;
use std::ops::{Index, IndexMut};

/// Row-major strides for `shape`.
const fn strides_for(shape: [usize; 4]) -> [usize; 4] {
    [
        shape[1] * shape[2] * shape[3],
        shape[2] * shape[3],
        shape[3],
        1,
    ]
}

fn element_count(shape: [usize; 4]) -> usize {
    shape.iter().product()
}

/// Offset of `idx` in a tensor of `shape`, or `None` if any axis overflows.
fn offset_of(shape: [usize; 4], strides: [usize; 4], idx: [usize; 4]) -> Option<usize> {
    idx.iter()
        .zip(shape)
        .zip(strides)
        .try_fold(0, |acc, ((&i, n), s)| (i < n).then_some(acc + i * s))
}

/// Shape of `images` images with per-image `dims`.
pub const fn shape_of(images: usize, dims: Dims) -> [usize; 4] {
    [images, dims.height, dims.rows, dims.cols + dims.align_pad]
}

/// Read-only view.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    data: &'a [f32],
    shape: [usize; 4],
    strides: [usize; 4],
}

impl<'a> TensorView<'a> {
    /// View the front of `data` as `shape`.
    ///
    /// # Errors
    ///
    /// Returns error if `data` is shorter than the shape requires.
    pub fn new(data: &'a [f32], shape: [usize; 4]) -> Result<Self> {
        let needed = element_count(shape);
        let data = data.get(..needed).ok_or(SmivError::SizeMismatch {
            what: "tensor view",
            got: data.len(),
            expected: needed,
        })?;
        Ok(Self {
            data,
            shape,
            strides: strides_for(shape),
        })
    }

    /// View `images` images laid out per `dims`.
    ///
    /// # Errors
    ///
    /// Returns error if `data` is too short.
    pub fn from_dims(data: &'a [f32], images: usize, dims: Dims) -> Result<Self> {
        Self::new(data, shape_of(images, dims))
    }

    /// Logical shape.
    pub const fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Element at `idx`, if in bounds.
    pub fn get(&self, idx: [usize; 4]) -> Option<f32> {
        offset_of(self.shape, self.strides, idx).map(|o| self.data[o])
    }

    /// Contiguous run of `count` channels of image `image`, starting at
    /// channel `first`.
    ///
    /// # Errors
    ///
    /// Returns error if the channel range leaves the view.
    pub fn channels(&self, image: usize, first: usize, count: usize) -> Result<&'a [f32]> {
        let end = first + count;
        if image >= self.shape[0] || end > self.shape[1] {
            return Err(SmivError::OutOfBounds {
                index: [image, end, 0, 0],
                shape: self.shape,
            });
        }
        let start = image * self.strides[0] + first * self.strides[1];
        Ok(&self.data[start..start + count * self.strides[1]])
    }

    /// The whole viewed storage.
    pub const fn as_slice(&self) -> &'a [f32] {
        self.data
    }
}

impl Index<[usize; 4]> for TensorView<'_> {
    type Output = f32;

    fn index(&self, idx: [usize; 4]) -> &f32 {
        match offset_of(self.shape, self.strides, idx) {
            Some(o) => &self.data[o],
            None => panic!("index {idx:?} out of bounds for shape {:?}", self.shape),
        }
    }
}

/// Mutable view.
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    data: &'a mut [f32],
    shape: [usize; 4],
    strides: [usize; 4],
}

impl<'a> TensorViewMut<'a> {
    /// View the front of `data` as `shape`.
    ///
    /// # Errors
    ///
    /// Returns error if `data` is shorter than the shape requires.
    pub fn new(data: &'a mut [f32], shape: [usize; 4]) -> Result<Self> {
        let needed = element_count(shape);
        let got = data.len();
        let data = data.get_mut(..needed).ok_or(SmivError::SizeMismatch {
            what: "tensor view",
            got,
            expected: needed,
        })?;
        Ok(Self {
            data,
            shape,
            strides: strides_for(shape),
        })
    }

    /// View `images` images laid out per `dims`.
    ///
    /// # Errors
    ///
    /// Returns error if `data` is too short.
    pub fn from_dims(data: &'a mut [f32], images: usize, dims: Dims) -> Result<Self> {
        Self::new(data, shape_of(images, dims))
    }

    /// Logical shape.
    pub const fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Mutable element at `idx`, if in bounds.
    pub fn get_mut(&mut self, idx: [usize; 4]) -> Option<&mut f32> {
        offset_of(self.shape, self.strides, idx).map(|o| &mut self.data[o])
    }

    /// Mutable run of `count` channels of image `image`, starting at
    /// channel `first`.
    ///
    /// # Errors
    ///
    /// Returns error if the channel range leaves the view.
    pub fn channels_mut(&mut self, image: usize, first: usize, count: usize) -> Result<&mut [f32]> {
        let end = first + count;
        if image >= self.shape[0] || end > self.shape[1] {
            return Err(SmivError::OutOfBounds {
                index: [image, end, 0, 0],
                shape: self.shape,
            });
        }
        let start = image * self.strides[0] + first * self.strides[1];
        Ok(&mut self.data[start..start + count * self.strides[1]])
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Read-only reborrow.
    pub fn as_view(&self) -> TensorView<'_> {
        TensorView {
            data: &*self.data,
            shape: self.shape,
            strides: self.strides,
        }
    }
}

impl Index<[usize; 4]> for TensorViewMut<'_> {
    type Output = f32;

    fn index(&self, idx: [usize; 4]) -> &f32 {
        match offset_of(self.shape, self.strides, idx) {
            Some(o) => &self.data[o],
            None => panic!("index {idx:?} out of bounds for shape {:?}", self.shape),
        }
    }
}

impl IndexMut<[usize; 4]> for TensorViewMut<'_> {
    fn index_mut(&mut self, idx: [usize; 4]) -> &mut f32 {
        match offset_of(self.shape, self.strides, idx) {
            Some(o) => &mut self.data[o],
            None => panic!("index {idx:?} out of bounds for shape {:?}", self.shape),
        }
    }
}
