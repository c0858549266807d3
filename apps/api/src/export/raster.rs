//! Raster PDF export: a bitmap of the preview placed on A4 pages.
//!
//! The bitmap spans the full 210 mm page width and keeps its aspect ratio. When it is
//! taller than one page it is cut into page-height bands, one band per page, top down.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::content::Operation;
use tracing::debug;

use crate::builder::dom::Element;
use crate::builder::preview::RenderMode;
use crate::export::font_metrics::{A4_HEIGHT_PT, A4_WIDTH_PT};
use crate::export::pdf::PdfWriter;
use crate::export::{pdf_file_name, run_blocking, ExportArtifact, ExportError, PDF_CONTENT_TYPE};

const JPEG_QUALITY: u8 = 90;

/// Produces a bitmap of a rendered preview root.
///
/// `scale` is the device-pixel ratio the bitmap should be taken at. Implementations that
/// render themselves honour it; implementations that receive finished bitmaps cannot.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, root: &Element, scale: f32) -> Result<RgbImage, ExportError>;
}

/// Rasterizer backed by captures the browser took of its own preview.
///
/// Captures are PNG or JPEG images, one per render mode. The browser reads the scale to
/// capture at from the session view (`rasterScale`) and is responsible for honouring it:
/// the server never sees the preview's CSS pixel size, so a capture is used as supplied
/// at whatever resolution it arrives. Page layout depends only on its aspect ratio. The
/// capture matching the root's `data-mode` is the one returned.
#[derive(Debug, Clone, Default)]
pub struct CaptureRasterizer {
    captures: HashMap<RenderMode, Bytes>,
}

impl CaptureRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mode: RenderMode, capture: Bytes) {
        self.captures.insert(mode, capture);
    }

    pub fn with_capture(mut self, mode: RenderMode, capture: Bytes) -> Self {
        self.insert(mode, capture);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

#[async_trait]
impl Rasterizer for CaptureRasterizer {
    async fn rasterize(&self, root: &Element, scale: f32) -> Result<RgbImage, ExportError> {
        let mode = match root.get_attr("data-mode") {
            Some("ats") => RenderMode::Ats,
            _ => RenderMode::Standard,
        };
        let capture = self
            .captures
            .get(&mode)
            .cloned()
            .ok_or(ExportError::MissingCapture(mode.as_str()))?;

        let bitmap = run_blocking(move || decode_capture(&capture)).await?;
        debug!(
            "Decoded {} capture {}x{} (scale {scale})",
            mode.as_str(),
            bitmap.width(),
            bitmap.height()
        );
        Ok(bitmap)
    }
}

pub fn decode_capture(bytes: &[u8]) -> Result<RgbImage, ExportError> {
    let bitmap = image::load_from_memory(bytes)?.to_rgb8();
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(ExportError::InvalidBitmap("capture has no pixels".to_string()));
    }
    Ok(bitmap)
}

// ────────────────────────────────────────────────────────────────────────────
// Page planning
// ────────────────────────────────────────────────────────────────────────────

/// One page-height band of the bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    pub top_px: u32,
    pub height_px: u32,
    /// Drawn height on the page; the width is always the full page width.
    pub height_pt: f32,
}

/// Splits a `width_px` x `height_px` bitmap scaled to A4 width into page bands.
pub fn plan_pages(width_px: u32, height_px: u32) -> Vec<PageSlice> {
    if width_px == 0 || height_px == 0 {
        return Vec::new();
    }
    let pt_per_px = A4_WIDTH_PT / width_px as f32;
    let page_px = ((A4_HEIGHT_PT / pt_per_px).floor() as u32).max(1);

    let mut slices = Vec::new();
    let mut top = 0;
    while top < height_px {
        let height = page_px.min(height_px - top);
        slices.push(PageSlice {
            top_px: top,
            height_px: height,
            height_pt: height as f32 * pt_per_px,
        });
        top += height;
    }
    slices
}

/// Builds the PDF: each band as a JPEG image anchored to the top of its page.
pub fn assemble_pdf(bitmap: &RgbImage, title: &str) -> Result<Vec<u8>, ExportError> {
    let (width, height) = bitmap.dimensions();
    let slices = plan_pages(width, height);
    if slices.is_empty() {
        return Err(ExportError::InvalidBitmap("bitmap has no pixels".to_string()));
    }

    let mut writer = PdfWriter::new();
    for (index, slice) in slices.iter().enumerate() {
        let band = image::imageops::crop_imm(bitmap, 0, slice.top_px, width, slice.height_px).to_image();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&band)?;
        let image_id = writer.add_jpeg(jpeg, width, slice.height_px);

        let name = format!("Im{}", index + 1);
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    A4_WIDTH_PT.into(),
                    0.into(),
                    0.into(),
                    slice.height_pt.into(),
                    0.into(),
                    (A4_HEIGHT_PT - slice.height_pt).into(),
                ],
            ),
            Operation::new("Do", vec![name.as_str().into()]),
            Operation::new("Q", vec![]),
        ];
        writer.add_page(ops, &[(name.as_str(), image_id)])?;
    }
    writer.finish(title)
}

/// Raster export of an already captured bitmap, named after the person.
pub async fn export_raster(bitmap: RgbImage, person: &str, ats: bool) -> Result<ExportArtifact, ExportError> {
    let file_name = pdf_file_name(person, ats);
    let title = format!("{person} CV");
    let bytes = run_blocking(move || assemble_pdf(&bitmap, &title)).await?;
    Ok(ExportArtifact {
        file_name,
        content_type: PDF_CONTENT_TYPE,
        bytes,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn make_png(width: u32, height: u32) -> Bytes {
        let img = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_plan_single_page_keeps_aspect_ratio() {
        let slices = plan_pages(1000, 500);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].top_px, 0);
        assert_eq!(slices[0].height_px, 500);
        assert!((slices[0].height_pt - A4_WIDTH_PT / 2.0).abs() < 0.01);
    }

    #[test]
    fn test_plan_slices_tall_content_into_pages() {
        // 100 px wide: one page holds floor(841.89 / 5.9528) = 141 rows.
        let slices = plan_pages(100, 300);
        let heights: Vec<u32> = slices.iter().map(|s| s.height_px).collect();
        assert_eq!(heights, vec![141, 141, 18]);
        assert_eq!(slices[1].top_px, 141);
        assert!(slices.iter().all(|s| s.height_pt <= A4_HEIGHT_PT + 1e-3));
    }

    #[test]
    fn test_plan_empty_bitmap() {
        assert!(plan_pages(0, 10).is_empty());
        assert!(plan_pages(10, 0).is_empty());
    }

    #[test]
    fn test_assemble_pdf_writes_one_page_per_slice() {
        let bitmap = RgbImage::from_pixel(100, 300, image::Rgb([255, 255, 255]));
        let bytes = assemble_pdf(&bitmap, "Ada Lovelace CV").unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_decode_capture_rejects_garbage() {
        let err = decode_capture(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ExportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_capture_rasterizer_picks_capture_by_mode() {
        let rasterizer = CaptureRasterizer::new()
            .with_capture(RenderMode::Standard, make_png(40, 20))
            .with_capture(RenderMode::Ats, make_png(30, 60));

        let standard = Element::new("article").attr("data-mode", "standard");
        let ats = Element::new("article").attr("data-mode", "ats");

        assert_eq!(rasterizer.rasterize(&standard, 2.0).await.unwrap().dimensions(), (40, 20));
        assert_eq!(rasterizer.rasterize(&ats, 2.0).await.unwrap().dimensions(), (30, 60));
    }

    #[tokio::test]
    async fn test_capture_resolution_does_not_change_page_layout() {
        let rasterizer = CaptureRasterizer::new().with_capture(RenderMode::Standard, make_png(100, 50));
        let root = Element::new("article").attr("data-mode", "standard");
        let at_one = rasterizer.rasterize(&root, 1.0).await.unwrap();
        let at_three = rasterizer.rasterize(&root, 3.0).await.unwrap();
        assert_eq!(at_one.dimensions(), (100, 50));
        assert_eq!(at_three.dimensions(), (100, 50));

        // Same aspect ratio at twice the resolution lays out identically.
        let sharp = plan_pages(200, 100);
        let plain = plan_pages(at_one.width(), at_one.height());
        assert_eq!(sharp.len(), plain.len());
        assert!((sharp[0].height_pt - plain[0].height_pt).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_capture_rasterizer_reports_missing_mode() {
        let rasterizer = CaptureRasterizer::new().with_capture(RenderMode::Standard, make_png(4, 4));
        let ats = Element::new("article").attr("data-mode", "ats");
        let err = rasterizer.rasterize(&ats, 2.0).await.unwrap_err();
        assert!(matches!(err, ExportError::MissingCapture("ats")));
    }

    #[tokio::test]
    async fn test_export_raster_names_the_file() {
        let bitmap = RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0]));
        let artifact = export_raster(bitmap, "Ada Lovelace", true).await.unwrap();
        assert_eq!(artifact.file_name, "Ada_Lovelace_ATS_CV.pdf");
        assert_eq!(artifact.content_type, "application/pdf");
        assert!(artifact.bytes.starts_with(b"%PDF"));
    }
}
