//! Page inputs.

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::error::Result;

/// One raster newspaper page, read-only once loaded.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Position of the page in the run (0-indexed)
    pub index: usize,
    /// Grayscale pixels
    pub image: GrayImage,
}

impl PageImage {
    /// Wrap an in-memory raster.
    pub fn new(index: usize, image: GrayImage) -> Self {
        Self { index, image }
    }

    /// Page width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Page height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Where a page comes from. File pages are decoded only when the pipeline
/// reaches them.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Image file on disk (any format the `image` crate decodes)
    Path(PathBuf),
    /// Already decoded raster
    Memory(GrayImage),
}

impl PageSource {
    /// Page from an image file.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        PageSource::Path(path.as_ref().to_path_buf())
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            PageSource::Path(path) => path.display().to_string(),
            PageSource::Memory(image) => format!("<memory {}x{}>", image.width(), image.height()),
        }
    }

    /// Decode the page as grayscale.
    pub fn load(self, index: usize) -> Result<PageImage> {
        let image = match self {
            PageSource::Path(path) => image::open(&path)?.to_luma8(),
            PageSource::Memory(image) => image,
        };
        Ok(PageImage::new(index, image))
    }
}

impl From<GrayImage> for PageSource {
    fn from(image: GrayImage) -> Self {
        PageSource::Memory(image)
    }
}

impl From<PathBuf> for PageSource {
    fn from(path: PathBuf) -> Self {
        PageSource::Path(path)
    }
}
