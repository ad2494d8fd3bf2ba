//! Output format registry.
//!
//! Formats are shared between the master configuration and request copies
//! through `Arc`; replacing the active format on one copy never disturbs
//! another.

use std::sync::Arc;

use once_cell::sync::Lazy;

/// Pixel layout produced by a format driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageMode {
    /// 8-bit palette.
    Pc256,
    #[default]
    Rgb,
    Rgba,
    Feature,
}

/// A named output format backed by a rendering driver.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    /// Registry name, e.g. "png".
    pub name: String,
    /// Driver identifier, e.g. "GD/PNG", "AGG/PNG", "GDAL/GTiff", "SVG".
    pub driver: String,
    pub mimetype: String,
    pub extension: String,
    pub imagemode: ImageMode,
    pub transparent: bool,
}

impl OutputFormat {
    pub fn new(
        name: &str,
        driver: &str,
        mimetype: &str,
        extension: &str,
        imagemode: ImageMode,
    ) -> Self {
        Self {
            name: name.to_string(),
            driver: driver.to_string(),
            mimetype: mimetype.to_string(),
            extension: extension.to_string(),
            imagemode,
            transparent: false,
        }
    }

    /// Formats usable for WMS GetMap: GD, GDAL, AGG and SVG drivers.
    pub fn is_wms_capable(&self) -> bool {
        let d = &self.driver;
        starts_ignore_case(d, "GD/")
            || starts_ignore_case(d, "GDAL/")
            || starts_ignore_case(d, "AGG/")
            || starts_ignore_case(d, "SVG")
    }

    /// Formats the legend renderer can draw into: raster GD/AGG drivers only.
    pub fn is_raster_capable(&self) -> bool {
        starts_ignore_case(&self.driver, "GD/") || starts_ignore_case(&self.driver, "AGG/")
    }

    /// Whether this format answers to `name` (registry name or MIME type).
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.mimetype.eq_ignore_ascii_case(name)
    }
}

fn starts_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

static DEFAULT_FORMATS: Lazy<Vec<Arc<OutputFormat>>> = Lazy::new(|| {
    vec![
        Arc::new(OutputFormat::new(
            "png",
            "GD/PNG",
            "image/png",
            "png",
            ImageMode::Rgba,
        )),
        Arc::new(OutputFormat::new(
            "jpeg",
            "GD/JPEG",
            "image/jpeg",
            "jpg",
            ImageMode::Rgb,
        )),
        Arc::new(OutputFormat::new(
            "gif",
            "GD/GIF",
            "image/gif",
            "gif",
            ImageMode::Pc256,
        )),
        Arc::new(OutputFormat::new(
            "wbmp",
            "GD/WBMP",
            "image/vnd.wap.wbmp",
            "wbmp",
            ImageMode::Pc256,
        )),
        Arc::new(OutputFormat::new(
            "svg",
            "SVG",
            "image/svg+xml",
            "svg",
            ImageMode::Feature,
        )),
    ]
});

/// The stock format registry used when a map declares no formats of its own.
pub fn default_formats() -> Vec<Arc<OutputFormat>> {
    DEFAULT_FORMATS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_classes() {
        let png = OutputFormat::new("png", "GD/PNG", "image/png", "png", ImageMode::Rgba);
        let tiff = OutputFormat::new("tiff", "GDAL/GTiff", "image/tiff", "tif", ImageMode::Rgb);
        let svg = OutputFormat::new("svg", "SVG", "image/svg+xml", "svg", ImageMode::Feature);
        assert!(png.is_wms_capable() && png.is_raster_capable());
        assert!(tiff.is_wms_capable() && !tiff.is_raster_capable());
        assert!(svg.is_wms_capable() && !svg.is_raster_capable());
    }

    #[test]
    fn test_matches_name_or_mime() {
        let png = OutputFormat::new("png", "GD/PNG", "image/png", "png", ImageMode::Rgba);
        assert!(png.matches("PNG"));
        assert!(png.matches("image/png"));
        assert!(!png.matches("image/jpeg"));
    }

    #[test]
    fn test_default_registry_shared() {
        let a = default_formats();
        let b = default_formats();
        assert!(Arc::ptr_eq(&a[0], &b[0]));
    }
}
