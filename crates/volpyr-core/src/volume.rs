//! Volume - dense in-memory voxel buffer
//!
//! `Volume<T>` is the in-memory counterpart of a chunked store: every block
//! read from a store comes back as a `Volume`, and every block write takes
//! one. A 2D slice is a `Volume` of depth 1.
//!
//! # Memory Layout
//!
//! Data is stored in C order with no padding. The voxel at (z, y, x) is at
//! index `(z * height + y) * width + x`.
//!
//! # Examples
//!
//! ```
//! use volpyr_core::{Shape3, Volume};
//!
//! let mut vol = Volume::<u16>::new(Shape3::new(2, 3, 4)).unwrap();
//! vol.set(1, 2, 3, 500).unwrap();
//! assert_eq!(vol.get(1, 2, 3), Some(500));
//! assert_eq!(vol.plane(1).len(), 12);
//! ```

use crate::error::{Error, Result};
use crate::shape::{Region, Shape3};
use crate::voxel::Voxel;

/// Dense (Z, Y, X) voxel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume<T: Voxel> {
    shape: Shape3,
    data: Vec<T>,
}

impl<T: Voxel> Volume<T> {
    /// Create a volume with every voxel set to zero
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidShape` if any axis has zero length.
    pub fn new(shape: Shape3) -> Result<Self> {
        Self::filled(shape, T::default())
    }

    /// Create a volume with every voxel set to `value`
    pub fn filled(shape: Shape3, value: T) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::InvalidShape {
                context: "volume",
                shape,
            });
        }
        Ok(Self {
            shape,
            data: vec![value; shape.len()],
        })
    }

    /// Create a volume from C-order data
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is empty or `data.len()` does not
    /// match the number of voxels.
    pub fn from_data(shape: Shape3, data: Vec<T>) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::InvalidShape {
                context: "volume",
                shape,
            });
        }
        if data.len() != shape.len() {
            return Err(Error::InvalidParameter(format!(
                "data length {} doesn't match {} = {}",
                data.len(),
                shape,
                shape.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Create a volume by evaluating `f(z, y, x)` at every voxel
    pub fn from_fn<F>(shape: Shape3, mut f: F) -> Result<Self>
    where
        F: FnMut(u64, u64, u64) -> T,
    {
        if shape.is_empty() {
            return Err(Error::InvalidShape {
                context: "volume",
                shape,
            });
        }
        let mut data = Vec::with_capacity(shape.len());
        for z in 0..shape.z {
            for y in 0..shape.y {
                for x in 0..shape.x {
                    data.push(f(z, y, x));
                }
            }
        }
        Ok(Self { shape, data })
    }

    /// Create a single-slice volume from row-major 2D data
    pub fn from_slice_data(height: u64, width: u64, data: Vec<T>) -> Result<Self> {
        Self::from_data(Shape3::new(1, height, width), data)
    }

    /// Stack same-shaped volumes along Z
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidShape` if `parts` is empty or the (Y, X)
    /// extents differ.
    pub fn stack(parts: &[Volume<T>]) -> Result<Self> {
        let first = parts.first().ok_or(Error::InvalidShape {
            context: "stack of zero volumes",
            shape: Shape3::zero(),
        })?;
        let (height, width) = (first.height(), first.width());
        let mut depth = 0;
        for p in parts {
            if p.height() != height || p.width() != width {
                return Err(Error::InvalidShape {
                    context: "stacked volume",
                    shape: p.shape,
                });
            }
            depth += p.depth();
        }
        let mut data = Vec::with_capacity((depth * height * width) as usize);
        for p in parts {
            data.extend_from_slice(&p.data);
        }
        Ok(Self {
            shape: Shape3::new(depth, height, width),
            data,
        })
    }

    #[inline]
    pub fn shape(&self) -> Shape3 {
        self.shape
    }

    /// Number of slices (Z extent)
    #[inline]
    pub fn depth(&self) -> u64 {
        self.shape.z
    }

    /// Number of rows (Y extent)
    #[inline]
    pub fn height(&self) -> u64 {
        self.shape.y
    }

    /// Number of columns (X extent)
    #[inline]
    pub fn width(&self) -> u64 {
        self.shape.x
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Size of the voxel data in bytes
    pub fn nbytes(&self) -> u64 {
        self.shape.num_elements() * T::DTYPE.size() as u64
    }

    #[inline]
    fn index(&self, z: u64, y: u64, x: u64) -> usize {
        ((z * self.shape.y + y) * self.shape.x + x) as usize
    }

    /// Get the voxel at (z, y, x), or `None` if out of range
    #[inline]
    pub fn get(&self, z: u64, y: u64, x: u64) -> Option<T> {
        if Shape3::new(z, y, x).all_lt(self.shape) {
            Some(self.data[self.index(z, y, x)])
        } else {
            None
        }
    }

    /// Set the voxel at (z, y, x)
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfBounds` if the coordinate is outside the volume.
    #[inline]
    pub fn set(&mut self, z: u64, y: u64, x: u64, value: T) -> Result<()> {
        let at = Shape3::new(z, y, x);
        if !at.all_lt(self.shape) {
            return Err(Error::OutOfBounds {
                region: Region::new(at, Shape3::splat(1)),
                shape: self.shape,
            });
        }
        let idx = self.index(z, y, x);
        self.data[idx] = value;
        Ok(())
    }

    /// Borrow slice `z` as a row-major `height * width` buffer
    ///
    /// # Panics
    ///
    /// Panics if `z >= depth()`.
    pub fn plane(&self, z: u64) -> &[T] {
        let n = (self.shape.y * self.shape.x) as usize;
        let start = z as usize * n;
        &self.data[start..start + n]
    }

    /// Copy slice `z` out as a depth-1 volume
    pub fn slice(&self, z: u64) -> Result<Volume<T>> {
        self.sub_volume(Region::new(
            Shape3::new(z, 0, 0),
            Shape3::new(1, self.shape.y, self.shape.x),
        ))
    }

    /// Copy a region out into a new volume
    pub fn sub_volume(&self, region: Region) -> Result<Volume<T>> {
        if region.is_empty() {
            return Err(Error::InvalidShape {
                context: "sub-volume",
                shape: region.size,
            });
        }
        if !region.fits_within(self.shape) {
            return Err(Error::OutOfBounds {
                region,
                shape: self.shape,
            });
        }
        let mut out = Volume::new(region.size)?;
        copy_box(
            &self.data,
            self.shape,
            region.origin,
            &mut out.data,
            region.size,
            Shape3::zero(),
            region.size,
        );
        Ok(out)
    }

    /// Copy `src` into this volume with its first voxel at `origin`
    pub fn paste(&mut self, origin: Shape3, src: &Volume<T>) -> Result<()> {
        let region = Region::new(origin, src.shape);
        if !region.fits_within(self.shape) {
            return Err(Error::OutOfBounds {
                region,
                shape: self.shape,
            });
        }
        copy_box(
            &src.data,
            src.shape,
            Shape3::zero(),
            &mut self.data,
            self.shape,
            origin,
            src.shape,
        );
        Ok(())
    }
}

/// Copy a `size` box between two C-order buffers.
///
/// `src_origin`/`dst_origin` are the box's first voxel within each buffer.
/// The caller guarantees both boxes fit their buffers.
pub(crate) fn copy_box<T: Copy>(
    src: &[T],
    src_shape: Shape3,
    src_origin: Shape3,
    dst: &mut [T],
    dst_shape: Shape3,
    dst_origin: Shape3,
    size: Shape3,
) {
    let row = size.x as usize;
    for z in 0..size.z {
        for y in 0..size.y {
            let s = (((src_origin.z + z) * src_shape.y + src_origin.y + y) * src_shape.x
                + src_origin.x) as usize;
            let d = (((dst_origin.z + z) * dst_shape.y + dst_origin.y + y) * dst_shape.x
                + dst_origin.x) as usize;
            dst[d..d + row].copy_from_slice(&src[s..s + row]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty() {
        assert!(Volume::<u16>::new(Shape3::new(0, 4, 4)).is_err());
        assert!(Volume::<u16>::new(Shape3::new(4, 4, 0)).is_err());
    }

    #[test]
    fn test_from_fn_layout() {
        let vol = Volume::<u16>::from_fn(Shape3::new(2, 2, 3), |z, y, x| {
            (z * 100 + y * 10 + x) as u16
        })
        .unwrap();
        assert_eq!(vol.data()[0], 0);
        assert_eq!(vol.data()[5], 12);
        assert_eq!(vol.data()[6], 100);
        assert_eq!(vol.get(1, 1, 2), Some(112));
        assert_eq!(vol.get(2, 0, 0), None);
    }

    #[test]
    fn test_sub_volume_and_paste() {
        let vol = Volume::<u8>::from_fn(Shape3::new(3, 4, 5), |z, y, x| (z * 20 + y * 5 + x) as u8)
            .unwrap();
        let region = Region::new(Shape3::new(1, 1, 2), Shape3::new(2, 2, 3));
        let sub = vol.sub_volume(region).unwrap();
        assert_eq!(sub.shape(), Shape3::new(2, 2, 3));
        assert_eq!(sub.get(0, 0, 0), vol.get(1, 1, 2));
        assert_eq!(sub.get(1, 1, 2), vol.get(2, 2, 4));

        let mut blank = Volume::<u8>::new(vol.shape()).unwrap();
        blank.paste(region.origin, &sub).unwrap();
        assert_eq!(blank.get(2, 2, 4), vol.get(2, 2, 4));
        assert_eq!(blank.get(0, 0, 0), Some(0));

        let too_far = Region::new(Shape3::new(2, 0, 0), Shape3::new(2, 1, 1));
        assert!(vol.sub_volume(too_far).is_err());
    }

    #[test]
    fn test_stack() {
        let a = Volume::<u16>::filled(Shape3::new(1, 2, 2), 1).unwrap();
        let b = Volume::<u16>::filled(Shape3::new(2, 2, 2), 2).unwrap();
        let s = Volume::stack(&[a, b]).unwrap();
        assert_eq!(s.shape(), Shape3::new(3, 2, 2));
        assert_eq!(s.plane(0), &[1, 1, 1, 1]);
        assert_eq!(s.plane(2), &[2, 2, 2, 2]);

        let c = Volume::<u16>::new(Shape3::new(1, 3, 2)).unwrap();
        assert!(Volume::stack(&[s, c]).is_err());
        assert!(Volume::<u16>::stack(&[]).is_err());
    }
}
