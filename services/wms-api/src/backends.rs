//! Default collaborator implementations.
//!
//! These are deliberately small: a solid-colour PNG renderer that satisfies
//! the image contracts (including in-image exceptions), an in-memory query
//! engine over inline feature tables, the two common geographic projections,
//! and an SLD engine for builds without styled-layer support.

use std::collections::HashMap;
use std::io::Write;

use bytes::Bytes;
use tracing::warn;

use map_config::{
    Color, Layer, LayerStatus, MapConfig, Projection, Rect, ResultCache, ResultMember, Shape,
};
use wms_protocol::{
    encode_html_entities, BackendError, Backends, GmlWriter, Projector, QueryEngine, QueryMode,
    QueryOutcome, RenderMode, RenderedImage, Renderer, RequestParams, SldEngine,
};

// ============================================================================
// PNG writing
// ============================================================================

/// Write a PNG chunk with CRC
fn write_chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(data);
    let mut crc_data = Vec::new();
    crc_data.extend_from_slice(name);
    crc_data.extend_from_slice(data);
    let crc = crc32fast::hash(&crc_data);
    out.extend_from_slice(&crc.to_be_bytes());
}

/// Encode an RGB pixel buffer (row major, 3 bytes per pixel) as PNG.
fn encode_png(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();

    // PNG signature
    data.extend_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);

    // IHDR chunk
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(2); // color type (truecolor)
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut data, b"IHDR", &ihdr);

    // IDAT chunk (filter byte 0 per scanline, zlib compressed)
    let stride = width as usize * 3;
    let mut raw = Vec::with_capacity((stride + 1) * height as usize);
    for row in 0..height as usize {
        raw.push(0);
        raw.extend_from_slice(&pixels[row * stride..(row + 1) * stride]);
    }
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw).unwrap();
    let compressed = encoder.finish().unwrap();
    write_chunk(&mut data, b"IDAT", &compressed);

    // IEND chunk
    write_chunk(&mut data, b"IEND", &[]);

    data
}

/// Renderer producing solid-colour canvases.
///
/// Real symbolised rendering belongs to a drawing backend; this default
/// keeps the protocol surface fully functional (images come back with the
/// right dimensions and background colour, errors get a marked canvas).
#[derive(Debug, Default)]
pub struct FlatRenderer;

impl FlatRenderer {
    fn canvas(&self, width: u32, height: u32, color: Color, error_border: bool) -> Vec<u8> {
        let width = width.max(1);
        let height = height.max(1);
        let mut pixels = vec![0u8; width as usize * height as usize * 3];
        for pixel in pixels.chunks_exact_mut(3) {
            pixel[0] = color.red;
            pixel[1] = color.green;
            pixel[2] = color.blue;
        }
        if error_border {
            let border = 4usize.min(width as usize / 2).min(height as usize / 2);
            for y in 0..height as usize {
                for x in 0..width as usize {
                    let edge = x < border
                        || y < border
                        || x >= width as usize - border
                        || y >= height as usize - border;
                    if edge {
                        let i = (y * width as usize + x) * 3;
                        pixels[i] = 0xcc;
                        pixels[i + 1] = 0x00;
                        pixels[i + 2] = 0x00;
                    }
                }
            }
        }
        encode_png(width, height, &pixels)
    }
}

impl Renderer for FlatRenderer {
    fn render_map(
        &self,
        map: &mut MapConfig,
        _mode: RenderMode<'_>,
    ) -> Result<RenderedImage, BackendError> {
        Ok(RenderedImage {
            mimetype: "image/png".to_string(),
            bytes: Bytes::from(self.canvas(map.width, map.height, map.image_color, false)),
        })
    }

    fn render_legend(
        &self,
        map: &mut MapConfig,
        _scale_independent: bool,
    ) -> Result<RenderedImage, BackendError> {
        let (width, height) = legend_layout(map);
        Ok(RenderedImage {
            mimetype: "image/png".to_string(),
            bytes: Bytes::from(self.canvas(width, height, map.legend.image_color, false)),
        })
    }

    fn render_legend_icon(
        &self,
        map: &MapConfig,
        _layer: usize,
        _class: usize,
        width: u32,
        height: u32,
    ) -> Result<RenderedImage, BackendError> {
        Ok(RenderedImage {
            mimetype: "image/png".to_string(),
            bytes: Bytes::from(self.canvas(width, height, map.legend.image_color, false)),
        })
    }

    fn render_error_image(&self, map: &MapConfig, blank: bool, message: &str) -> RenderedImage {
        if !blank {
            warn!(error = %message, "rendering in-image exception");
        }
        RenderedImage {
            mimetype: "image/png".to_string(),
            bytes: Bytes::from(self.canvas(map.width, map.height, map.image_color, !blank)),
        }
    }

    fn legend_size(&self, map: &MapConfig, layer: usize) -> Option<(u32, u32)> {
        let lp = map.layers.get(layer)?;
        let classes = lp
            .classes
            .iter()
            .filter(|c| c.name.as_deref().is_some_and(|n| !n.is_empty()))
            .count() as u32;
        if classes == 0 {
            return None;
        }
        let key_x = map.legend.key_size_x.max(1) as u32;
        let key_y = map.legend.key_size_y.max(1) as u32;
        let spacing_y = map.legend.key_spacing_y.max(0) as u32;
        // key plus room for the class label
        Some((key_x + 150, classes * (key_y + spacing_y)))
    }
}

/// Row layout of the whole-legend canvas.
fn legend_layout(map: &MapConfig) -> (u32, u32) {
    let key_y = map.legend.key_size_y.max(1) as u32;
    let spacing_y = map.legend.key_spacing_y.max(0) as u32;
    let mut rows = 0u32;
    for layer in &map.layers {
        if layer.status == LayerStatus::On || layer.status == LayerStatus::Default {
            rows += layer
                .classes
                .iter()
                .filter(|c| c.name.as_deref().is_some_and(|n| !n.is_empty()))
                .count() as u32;
        }
    }
    (map.legend.key_size_x.max(1) as u32 + 150, rows.max(1) * (key_y + spacing_y))
}

// ============================================================================
// Query engine
// ============================================================================

/// In-memory feature tables, one per layer, loaded from the map definition.
#[derive(Debug, Default)]
pub struct LocalQueryEngine {
    tables: HashMap<String, (Vec<String>, Vec<Shape>)>,
}

impl LocalQueryEngine {
    pub fn new(tables: HashMap<String, (Vec<String>, Vec<Shape>)>) -> Self {
        Self { tables }
    }
}

impl QueryEngine for LocalQueryEngine {
    fn query_by_point(
        &self,
        map: &mut MapConfig,
        mode: QueryMode,
        _point: (f64, f64),
        _buffer: f64,
        max_results: u32,
    ) -> Result<QueryOutcome, BackendError> {
        let mut any = false;
        for layer in map.layers.iter_mut() {
            if layer.status != LayerStatus::On {
                continue;
            }
            let Some((_, shapes)) = self.tables.get(&layer.name) else {
                continue;
            };
            let limit = match mode {
                QueryMode::Single => 1,
                QueryMode::Multiple => max_results as usize,
            };
            let results: Vec<ResultMember> = shapes
                .iter()
                .take(limit)
                .map(|s| ResultMember {
                    shape_index: s.index,
                    tile_index: s.tile,
                    class_index: s.class_index,
                })
                .collect();
            if !results.is_empty() {
                any = true;
                layer.result_cache = Some(ResultCache {
                    results,
                    bounds: Rect::new(0.0, 0.0, 0.0, 0.0),
                });
            }
        }
        Ok(if any {
            QueryOutcome::Hit
        } else {
            QueryOutcome::NotFound
        })
    }

    fn open_layer(&self, layer: &mut Layer) -> Result<(), BackendError> {
        let (items, _) = self
            .tables
            .get(&layer.name)
            .ok_or_else(|| BackendError::new(format!("no data source for layer {}", layer.name)))?;
        layer.items = items.clone();
        layer.opened = true;
        Ok(())
    }

    fn close_layer(&self, layer: &mut Layer) {
        layer.items.clear();
        layer.opened = false;
    }

    fn shape(&self, layer: &Layer, member: &ResultMember) -> Result<Shape, BackendError> {
        self.tables
            .get(&layer.name)
            .and_then(|(_, shapes)| shapes.iter().find(|s| s.index == member.shape_index))
            .cloned()
            .ok_or_else(|| {
                BackendError::new(format!(
                    "shape {} not found in layer {}",
                    member.shape_index, layer.name
                ))
            })
    }

    fn render_template_query(
        &self,
        _map: &MapConfig,
        _params: &RequestParams,
        _mimetype: &str,
    ) -> Result<Bytes, BackendError> {
        Err(BackendError::new(
            "Template query support is not configured on this server.",
        ))
    }
}

impl GmlWriter for LocalQueryEngine {
    fn write_query(&self, map: &MapConfig, out: &mut Vec<u8>) -> Result<(), BackendError> {
        out.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n");
        out.extend_from_slice(b"<msGMLOutput xmlns:gml=\"http://www.opengis.net/gml\">\n");
        for layer in &map.layers {
            let Some(cache) = &layer.result_cache else {
                continue;
            };
            if layer.status != LayerStatus::On || cache.results.is_empty() {
                continue;
            }
            let Some((items, _)) = self.tables.get(&layer.name) else {
                continue;
            };
            out.extend_from_slice(format!("  <{}_layer>\n", layer.name).as_bytes());
            for member in &cache.results {
                let shape = self.shape(layer, member)?;
                out.extend_from_slice(format!("    <{}_feature>\n", layer.name).as_bytes());
                for (k, item) in items.iter().enumerate() {
                    let value = shape.values.get(k).map(String::as_str).unwrap_or("");
                    out.extend_from_slice(
                        format!(
                            "      <{}>{}</{}>\n",
                            item,
                            encode_html_entities(value),
                            item
                        )
                        .as_bytes(),
                    );
                }
                out.extend_from_slice(format!("    </{}_feature>\n", layer.name).as_bytes());
            }
            out.extend_from_slice(format!("  </{}_layer>\n", layer.name).as_bytes());
        }
        out.extend_from_slice(b"</msGMLOutput>\n");
        Ok(())
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Handles the two projections every deployment needs: geographic
/// passthrough and the spherical web-mercator inverse.
#[derive(Debug, Default)]
pub struct PlateProjector;

impl Projector for PlateProjector {
    fn latlon_extent(&self, extent: &Rect, projection: &Projection) -> Option<Rect> {
        match projection.epsg_code() {
            Some(4326) | Some(4269) | None => Some(*extent),
            Some(3857) | Some(900913) => {
                let (min_x, min_y) = mercator_to_wgs84(extent.min_x, extent.min_y);
                let (max_x, max_y) = mercator_to_wgs84(extent.max_x, extent.max_y);
                Some(Rect::new(min_x, min_y, max_x, max_y))
            }
            Some(_) => {
                if projection.is_geographic() {
                    Some(*extent)
                } else {
                    None
                }
            }
        }
    }
}

/// Convert Web Mercator (EPSG:3857) coordinates to WGS84 (EPSG:4326)
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / 20037508.34) * 180.0;
    let lat = (y / 20037508.34) * 180.0;
    let lat = 180.0 / std::f64::consts::PI
        * (2.0 * (lat * std::f64::consts::PI / 180.0).exp().atan() - std::f64::consts::PI / 2.0);
    (lon, lat)
}

// ============================================================================
// SLD
// ============================================================================

/// SLD engine for builds without styled-layer support: applying a document
/// fails, generation emits one NamedLayer per ON layer.
#[derive(Debug, Default)]
pub struct NoSldEngine;

impl SldEngine for NoSldEngine {
    fn apply_sld_url(&self, _map: &mut MapConfig, _url: &str) -> Result<(), BackendError> {
        Err(BackendError::new("SLD support is not available."))
    }

    fn apply_sld_body(&self, _map: &mut MapConfig, _xml: &str) -> Result<(), BackendError> {
        Err(BackendError::new("SLD support is not available."))
    }

    fn generate_sld(&self, map: &MapConfig) -> Result<String, BackendError> {
        let mut sld = String::from(
            "<StyledLayerDescriptor version=\"1.0.0\" xmlns=\"http://www.opengis.net/sld\" \
             xmlns:gml=\"http://www.opengis.net/gml\">\n",
        );
        for layer in &map.layers {
            if layer.status != LayerStatus::On && layer.status != LayerStatus::Default {
                continue;
            }
            sld.push_str("  <NamedLayer>\n");
            sld.push_str(&format!(
                "    <Name>{}</Name>\n",
                encode_html_entities(&layer.name)
            ));
            sld.push_str("    <UserStyle>\n      <FeatureTypeStyle>\n");
            for class in &layer.classes {
                sld.push_str("        <Rule>\n");
                if let Some(name) = &class.name {
                    sld.push_str(&format!(
                        "          <Name>{}</Name>\n",
                        encode_html_entities(name)
                    ));
                }
                sld.push_str("        </Rule>\n");
            }
            sld.push_str("      </FeatureTypeStyle>\n    </UserStyle>\n");
            sld.push_str("  </NamedLayer>\n");
        }
        sld.push_str("</StyledLayerDescriptor>");
        Ok(sld)
    }
}

/// Bundle the default collaborators into a [`Backends`] borrow.
pub struct DefaultBackends {
    pub renderer: FlatRenderer,
    pub query: LocalQueryEngine,
    pub projector: PlateProjector,
    pub sld: NoSldEngine,
}

impl DefaultBackends {
    pub fn new(query: LocalQueryEngine) -> Self {
        Self {
            renderer: FlatRenderer,
            query,
            projector: PlateProjector,
            sld: NoSldEngine,
        }
    }

    pub fn as_backends(&self) -> Backends<'_> {
        Backends {
            renderer: &self.renderer,
            query: &self.query,
            projector: &self.projector,
            sld: &self.sld,
            gml: &self.query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_signature_and_chunks() {
        let png = encode_png(4, 4, &[128u8; 4 * 4 * 3]);
        assert_eq!(&png[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_flat_renderer_dimensions() {
        let mut map = MapConfig::new("demo");
        map.width = 64;
        map.height = 32;
        let img = FlatRenderer
            .render_map(&mut map, RenderMode::Full)
            .unwrap();
        assert_eq!(img.mimetype, "image/png");
        // IHDR width/height big endian at offsets 16..24
        assert_eq!(&img.bytes[16..20], &64u32.to_be_bytes());
        assert_eq!(&img.bytes[20..24], &32u32.to_be_bytes());
    }

    #[test]
    fn test_mercator_to_wgs84_known_point() {
        // New York City approximately: -74.006, 40.7128
        let (lon, lat) = mercator_to_wgs84(-8238310.0, 4970072.0);
        assert!((lon - (-74.006)).abs() < 0.01);
        assert!((lat - 40.7128).abs() < 0.01);
    }
}
