//! Core data types for images and cameras.
//!
//! Images are stored channels-last with values in the normalized `[0, 1]`
//! range, matching the layout of the training batch.

use glam::{Affine3A, Quat, Vec3};
use image::RgbImage;
use ndarray::{Array3, ArrayView3, ArrayViewMut3};
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::resample::resize_hwc;

/// An `H x W x C` image tensor of normalized `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array3<f32>,
}

impl ImageTensor {
    /// Wrap a channels-last array.
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// An all-zero image.
    pub fn zeros(height: usize, width: usize, channels: usize) -> Self {
        Self::new(Array3::zeros((height, width, channels)))
    }

    /// An image filled with a single value.
    pub fn filled(height: usize, width: usize, channels: usize, value: f32) -> Self {
        Self::new(Array3::from_elem((height, width, channels), value))
    }

    /// Build from a channels-first `(c, h, w)` array.
    pub fn from_chw(chw: Array3<f32>) -> Self {
        Self::new(
            chw.permuted_axes([1, 2, 0])
                .as_standard_layout()
                .to_owned(),
        )
    }

    /// Convert to a channels-first `(c, h, w)` array.
    pub fn to_chw(&self) -> Array3<f32> {
        self.data
            .view()
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .to_owned()
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Spatial resolution as `(height, width)`.
    pub fn resolution(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Full shape as `[height, width, channels]`.
    pub fn shape(&self) -> [usize; 3] {
        let (h, w, c) = self.data.dim();
        [h, w, c]
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }

    /// Bilinearly resample to `(height, width)`, keeping channels.
    pub fn resized(&self, height: usize, width: usize) -> Result<Self, DataError> {
        if self.resolution() == (height, width) {
            return Ok(self.clone());
        }
        Ok(Self::new(resize_hwc(self.data.view(), height, width)?))
    }

    /// Decode an 8-bit RGB image into normalized values.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let data = Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
            image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Self::new(data)
    }

    /// Encode into an 8-bit RGB image, clamping to `[0, 1]`.
    pub fn to_rgb(&self) -> Result<RgbImage, DataError> {
        if self.channels() != 3 {
            return Err(DataError::Conversion(format!(
                "expected 3 channels, got {}",
                self.channels()
            )));
        }
        let (h, w, _) = self.data.dim();
        let mut raw = Vec::with_capacity(h * w * 3);
        raw.extend(
            self.data
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8),
        );
        RgbImage::from_raw(w as u32, h as u32, raw)
            .ok_or_else(|| DataError::Conversion("RGB buffer size mismatch".to_string()))
    }
}

/// A pinhole camera with a camera-to-world pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Camera orientation
    pub rotation: Quat,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl Camera {
    /// Create a camera centered on its image plane.
    pub fn new(position: Vec3, rotation: Quat, focal: f32, width: u32, height: u32) -> Self {
        Self {
            position,
            rotation,
            fx: focal,
            fy: focal,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            width,
            height,
        }
    }

    /// Camera-to-world transform.
    pub fn camera_to_world(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.position)
    }

    /// Apply a learned pose correction expressed in camera space.
    pub fn with_correction(&self, correction: &Affine3A) -> Self {
        let corrected = self.camera_to_world() * *correction;
        let (_, rotation, position) = corrected.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            ..*self
        }
    }

    /// Image resolution as `(height, width)`.
    pub fn resolution(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }
}
