//! Mock collaborators for driving the protocol core in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;

use map_config::{Layer, LayerStatus, MapConfig, Projection, Rect, ResultCache, ResultMember,
                 Shape};
use wms_protocol::{
    BackendError, Backends, GmlWriter, Projector, QueryEngine, QueryMode, QueryOutcome,
    RenderMode, RenderedImage, Renderer, RequestParams, SldEngine,
};

/// Fake PNG payload: a real signature followed by marker bytes.
pub const MOCK_PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock-image";

/// Renderer that returns canned image bytes and records error-image calls.
#[derive(Default)]
pub struct MockRenderer {
    pub error_messages: Mutex<Vec<String>>,
}

impl Renderer for MockRenderer {
    fn render_map(
        &self,
        map: &mut MapConfig,
        _mode: RenderMode<'_>,
    ) -> Result<RenderedImage, BackendError> {
        Ok(RenderedImage {
            mimetype: map.output_format.mimetype.clone(),
            bytes: Bytes::from_static(MOCK_PNG),
        })
    }

    fn render_legend(
        &self,
        map: &mut MapConfig,
        _scale_independent: bool,
    ) -> Result<RenderedImage, BackendError> {
        Ok(RenderedImage {
            mimetype: map.output_format.mimetype.clone(),
            bytes: Bytes::from_static(MOCK_PNG),
        })
    }

    fn render_legend_icon(
        &self,
        map: &MapConfig,
        _layer: usize,
        _class: usize,
        _width: u32,
        _height: u32,
    ) -> Result<RenderedImage, BackendError> {
        Ok(RenderedImage {
            mimetype: map.output_format.mimetype.clone(),
            bytes: Bytes::from_static(MOCK_PNG),
        })
    }

    fn render_error_image(&self, map: &MapConfig, _blank: bool, message: &str) -> RenderedImage {
        self.error_messages
            .lock()
            .unwrap()
            .push(message.to_string());
        RenderedImage {
            mimetype: map.output_format.mimetype.clone(),
            bytes: Bytes::from_static(MOCK_PNG),
        }
    }

    fn legend_size(&self, _map: &MapConfig, _layer: usize) -> Option<(u32, u32)> {
        Some((24, 12))
    }
}

/// In-memory feature tables keyed by layer name.
#[derive(Default)]
pub struct MockQueryEngine {
    tables: HashMap<String, (Vec<String>, Vec<Shape>)>,
}

impl MockQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, layer: &str, items: Vec<String>, shapes: Vec<Shape>) -> Self {
        self.tables.insert(layer.to_string(), (items, shapes));
        self
    }
}

impl QueryEngine for MockQueryEngine {
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
            .ok_or_else(|| BackendError::new(format!("no table for layer {}", layer.name)))?;
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
            .ok_or_else(|| BackendError::new(format!("shape {} not found", member.shape_index)))
    }

    fn render_template_query(
        &self,
        _map: &MapConfig,
        params: &RequestParams,
        mimetype: &str,
    ) -> Result<Bytes, BackendError> {
        let layers: Vec<&str> = params
            .iter()
            .filter(|(n, _)| *n == "layer")
            .map(|(_, v)| v)
            .collect();
        Ok(Bytes::from(format!(
            "template:{}:{}",
            mimetype,
            layers.join("+")
        )))
    }
}

/// Geographic passthrough plus the spherical web-mercator inverse.
#[derive(Default)]
pub struct MockProjector;

impl Projector for MockProjector {
    fn latlon_extent(&self, extent: &Rect, projection: &Projection) -> Option<Rect> {
        match projection.epsg_code() {
            Some(4326) | Some(4269) | None => Some(*extent),
            Some(3857) | Some(900913) => {
                let (min_x, min_y) = mercator_to_wgs84(extent.min_x, extent.min_y);
                let (max_x, max_y) = mercator_to_wgs84(extent.max_x, extent.max_y);
                Some(Rect::new(min_x, min_y, max_x, max_y))
            }
            Some(_) => None,
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

/// SLD engine for builds without styled-layer support: applying fails,
/// generation emits a minimal document.
#[derive(Default)]
pub struct MockSldEngine {
    pub allow_apply: bool,
}

impl SldEngine for MockSldEngine {
    fn apply_sld_url(&self, _map: &mut MapConfig, _url: &str) -> Result<(), BackendError> {
        if self.allow_apply {
            Ok(())
        } else {
            Err(BackendError::new("SLD support is not available."))
        }
    }

    fn apply_sld_body(&self, _map: &mut MapConfig, _xml: &str) -> Result<(), BackendError> {
        if self.allow_apply {
            Ok(())
        } else {
            Err(BackendError::new("SLD support is not available."))
        }
    }

    fn generate_sld(&self, map: &MapConfig) -> Result<String, BackendError> {
        let mut sld = String::from(
            "<StyledLayerDescriptor version=\"1.0.0\" \
             xmlns=\"http://www.opengis.net/sld\">",
        );
        for layer in &map.layers {
            if layer.status == LayerStatus::On {
                sld.push_str(&format!(
                    "<NamedLayer><Name>{}</Name></NamedLayer>",
                    layer.name
                ));
            }
        }
        sld.push_str("</StyledLayerDescriptor>");
        Ok(sld)
    }
}

/// Minimal GML writer listing queried layers.
#[derive(Default)]
pub struct MockGmlWriter;

impl GmlWriter for MockGmlWriter {
    fn write_query(&self, map: &MapConfig, out: &mut Vec<u8>) -> Result<(), BackendError> {
        out.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<msGMLOutput>\n");
        for layer in &map.layers {
            let count = layer
                .result_cache
                .as_ref()
                .map(|c| c.results.len())
                .unwrap_or(0);
            if layer.status == LayerStatus::On && count > 0 {
                out.extend_from_slice(
                    format!("  <{}_layer count=\"{}\"/>\n", layer.name, count).as_bytes(),
                );
            }
        }
        out.extend_from_slice(b"</msGMLOutput>\n");
        Ok(())
    }
}

/// Owns one of every mock collaborator and lends them as [`Backends`].
#[derive(Default)]
pub struct MockBackends {
    pub renderer: MockRenderer,
    pub query: MockQueryEngine,
    pub projector: MockProjector,
    pub sld: MockSldEngine,
    pub gml: MockGmlWriter,
}

impl MockBackends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mocks preloaded with the demo street features.
    pub fn with_demo_features() -> Self {
        let (items, shapes) = crate::fixtures::street_features();
        MockBackends {
            query: MockQueryEngine::new().with_table("streets", items, shapes),
            ..MockBackends::default()
        }
    }

    pub fn as_backends(&self) -> Backends<'_> {
        Backends {
            renderer: &self.renderer,
            query: &self.query,
            projector: &self.projector,
            sld: &self.sld,
            gml: &self.gml,
        }
    }
}
