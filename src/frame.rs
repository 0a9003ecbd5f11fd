use crate::geometry::Size;

/// One decoded video frame travelling through a session.
pub struct Frame<T> {
    pub index: u64,
    pub size: Size,
    pub data: T,
}

impl<T> Frame<T> {
    #[inline]
    pub fn new(index: u64, size: Size, data: T) -> Self {
        Self { index, size, data }
    }

    #[inline]
    pub fn into_data(self) -> T {
        self.data
    }
}

impl Frame<image::RgbImage> {
    /// Wraps an image, `None` for an empty one.
    pub fn from_image(index: u64, image: image::RgbImage) -> Option<Self> {
        let size = Size::new(image.width(), image.height()).ok()?;

        Some(Self::new(index, size, image))
    }
}
