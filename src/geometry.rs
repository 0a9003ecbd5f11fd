//! Letterbox resize plans and the coordinate mapping between the original
//! image space and the letterboxed (scaled + padded) canvas.

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;

use nalgebra as na;

/// Image dimensions in pixels, both strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    width: u32,
    height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize(width, height));
        }

        Ok(Self { width, height })
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn as_vector(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.width as f32, self.height as f32)
    }
}

/// YOLO style box: center and extent normalized to the image size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: u32,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedBox {
    pub fn new(class_id: u32, x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            class_id,
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Clamps every geometric field independently to `[0, 1]`.
    pub fn clamped(&self) -> Self {
        Self {
            class_id: self.class_id,
            x_center: self.x_center.clamp(0.0, 1.0),
            y_center: self.y_center.clamp(0.0, 1.0),
            width: self.width.clamp(0.0, 1.0),
            height: self.height.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[inline]
    fn center(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.x_center, self.y_center)
    }

    #[inline]
    fn extent(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.width, self.height)
    }
}

/// Uniform scale plus centering padding taking `original_size` onto `target_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizePlan {
    scale_factor: f32,
    pad_x: u32,
    pad_y: u32,
    original_size: Size,
    target_size: Size,
}

/// Computes the letterbox plan fitting `original` into `target`.
pub fn compute_resize_plan(original: Size, target: Size) -> ResizePlan {
    ResizePlan::with_scale(original, target, fit_scale(original, target))
}

/// Maps a box from original-normalized into target-normalized coordinates.
pub fn map_box(plan: &ResizePlan, bbox: &NormalizedBox) -> NormalizedBox {
    plan.forward().apply(bbox)
}

/// Maps a box from target-normalized back into original-normalized coordinates.
pub fn unmap_box(plan: &ResizePlan, bbox: &NormalizedBox) -> NormalizedBox {
    plan.inverse().apply(bbox)
}

#[inline]
fn fit_scale(original: Size, target: Size) -> f32 {
    let sx = target.width as f32 / original.width as f32;
    let sy = target.height as f32 / original.height as f32;

    sx.min(sy)
}

impl ResizePlan {
    /// Same as [`compute_resize_plan`] but never upscales, matching a
    /// thumbnail-then-paste letterbox of the actual pixels.
    pub fn thumbnail(original: Size, target: Size) -> Self {
        Self::with_scale(original, target, fit_scale(original, target).min(1.0))
    }

    fn with_scale(original_size: Size, target_size: Size, scale_factor: f32) -> Self {
        let (sw, sh) = scaled_dims(original_size, scale_factor);

        Self {
            scale_factor,
            pad_x: target_size.width.saturating_sub(sw) / 2,
            pad_y: target_size.height.saturating_sub(sh) / 2,
            original_size,
            target_size,
        }
    }

    #[inline(always)]
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    #[inline(always)]
    pub fn pad_x(&self) -> u32 {
        self.pad_x
    }

    #[inline(always)]
    pub fn pad_y(&self) -> u32 {
        self.pad_y
    }

    #[inline(always)]
    pub fn original_size(&self) -> Size {
        self.original_size
    }

    #[inline(always)]
    pub fn target_size(&self) -> Size {
        self.target_size
    }

    /// Size of the scaled image before padding, may be zero on an axis for
    /// extreme aspect ratios.
    #[inline]
    pub fn scaled_size(&self) -> (u32, u32) {
        scaled_dims(self.original_size, self.scale_factor)
    }

    /// Maps a pixel box on the letterboxed canvas back onto the original
    /// image, clipped to its bounds.
    pub fn unletterbox_ltrb(&self, bbox: &BBox<Ltrb>) -> BBox<Ltrb> {
        let pad = self.padding();
        let bounds = self.original_size.as_vector();

        let lt = (na::Vector2::new(bbox.left(), bbox.top()) - pad) / self.scale_factor;
        let rb = (na::Vector2::new(bbox.right(), bbox.bottom()) - pad) / self.scale_factor;

        BBox::ltrb(
            lt.x.clamp(0.0, bounds.x),
            lt.y.clamp(0.0, bounds.y),
            rb.x.clamp(0.0, bounds.x),
            rb.y.clamp(0.0, bounds.y),
        )
    }

    #[inline]
    fn padding(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.pad_x as f32, self.pad_y as f32)
    }

    fn forward(&self) -> Affine {
        Affine {
            scale: self.scale_factor,
            offset: self.padding(),
            from: self.original_size.as_vector(),
            to: self.target_size.as_vector(),
        }
    }

    fn inverse(&self) -> Affine {
        Affine {
            scale: 1.0 / self.scale_factor,
            offset: -self.padding() / self.scale_factor,
            from: self.target_size.as_vector(),
            to: self.original_size.as_vector(),
        }
    }
}

#[inline]
fn scaled_dims(size: Size, scale: f32) -> (u32, u32) {
    (
        (size.width as f32 * scale).round() as u32,
        (size.height as f32 * scale).round() as u32,
    )
}

/// Denormalize by `from`, scale, shift the center by `offset`, renormalize by `to`.
struct Affine {
    scale: f32,
    offset: na::Vector2<f32>,
    from: na::Vector2<f32>,
    to: na::Vector2<f32>,
}

impl Affine {
    fn apply(&self, bbox: &NormalizedBox) -> NormalizedBox {
        let center = (bbox.center().component_mul(&self.from) * self.scale + self.offset)
            .component_div(&self.to);
        let extent = (bbox.extent().component_mul(&self.from) * self.scale).component_div(&self.to);

        NormalizedBox::new(bbox.class_id, center.x, center.y, extent.x, extent.y).clamped()
    }
}
