//! Screen capture using xcap
//!
//! Areas are given in virtual-screen coordinates. A capture is taken from the
//! monitor holding the area's center and cropped to the area.

use anyhow::{anyhow, Result};
use image::{imageops, ImageEncoder, RgbaImage};
use std::io::Cursor;
use xcap::Monitor;

use super::types::{Point, Rect};

/// Screen capture utilities
pub struct ScreenCapture;

impl ScreenCapture {
    /// Capture `area` of the physical screen
    pub fn capture_area(area: Rect) -> Result<RgbaImage> {
        let bounds = PixelBounds::of(area)?;
        let monitors = Monitor::all().map_err(|e| anyhow!("Failed to get monitors: {}", e))?;

        let center = area.center();
        let monitor = monitors
            .iter()
            .find(|m| monitor_contains(m, center))
            .or_else(|| monitors.iter().find(|m| m.is_primary()))
            .ok_or_else(|| anyhow!("No monitor found for area {:?}", area))?;

        let screen = monitor
            .capture_image()
            .map_err(|e| anyhow!("Failed to capture screen: {}", e))?;

        crop(&screen, bounds.offset(-monitor.x(), -monitor.y()))
    }
}

fn monitor_contains(monitor: &Monitor, point: Point) -> bool {
    let bounds = PixelBounds {
        x: monitor.x(),
        y: monitor.y(),
        width: monitor.width(),
        height: monitor.height(),
    };
    bounds.contains(point)
}

/// Whole-pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelBounds {
    /// Round `area` to whole pixels. Empty areas cannot be captured.
    pub fn of(area: Rect) -> Result<Self> {
        let width = area.width.round();
        let height = area.height.round();
        if width < 1.0 || height < 1.0 {
            return Err(anyhow!(
                "Cannot capture an empty area ({}x{})",
                area.width,
                area.height
            ));
        }
        Ok(Self {
            x: area.x.round() as i32,
            y: area.y.round() as i32,
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..self
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        point.x >= self.x
            && i64::from(point.x) < right
            && point.y >= self.y
            && i64::from(point.y) < bottom
    }
}

/// Cut `bounds` out of `image`, clamped to the image.
pub fn crop(image: &RgbaImage, bounds: PixelBounds) -> Result<RgbaImage> {
    let clamp = |value: i64, max: u32| value.clamp(0, i64::from(max)) as u32;
    let left = clamp(i64::from(bounds.x), image.width());
    let top = clamp(i64::from(bounds.y), image.height());
    let right = clamp(i64::from(bounds.x) + i64::from(bounds.width), image.width());
    let bottom = clamp(i64::from(bounds.y) + i64::from(bounds.height), image.height());
    if right <= left || bottom <= top {
        return Err(anyhow!("Area {:?} lies outside the captured screen", bounds));
    }
    Ok(imageops::crop_imm(image, left, top, right - left, bottom - top).to_image())
}

/// Encode an image as a base64 PNG, the form screenshots travel in
pub fn image_to_base64(image: &RgbaImage) -> Result<String> {
    use base64::Engine;

    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| anyhow!("Failed to encode PNG: {}", e))?;

    Ok(base64::engine::general_purpose::STANDARD.encode(buffer.into_inner()))
}
