//! Collaborator contracts consumed by the operation handlers.
//!
//! Rendering, data access, reprojection, SLD handling and GML output are
//! external concerns; the protocol core only ever talks to them through the
//! traits below, bundled per request in [`Backends`].

use bytes::Bytes;
use thiserror::Error;

use map_config::{Layer, MapConfig, Projection, Rect, ResultMember, Shape};

use crate::params::RequestParams;

/// A collaborator failure; surfaced as an untyped Service Exception.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        BackendError(message.into())
    }
}

/// An encoded image plus the MIME type it was encoded as.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub mimetype: String,
    pub bytes: Bytes,
}

/// How GetMap wants the map drawn.
#[derive(Debug, Clone, Copy)]
pub enum RenderMode<'a> {
    /// Draw every layer in draw order.
    Full,
    /// SLD spatial filters were applied: the listed layers are drawn from
    /// their result caches, the rest normally.
    SldQuery(&'a [usize]),
}

/// Map, legend and error-image rendering.
pub trait Renderer {
    fn render_map(
        &self,
        map: &mut MapConfig,
        mode: RenderMode<'_>,
    ) -> Result<RenderedImage, BackendError>;

    /// Draw the legend for all ON layers. `scale_independent` skips the
    /// per-layer scale-window checks.
    fn render_legend(
        &self,
        map: &mut MapConfig,
        scale_independent: bool,
    ) -> Result<RenderedImage, BackendError>;

    /// Draw a single class key as a `width` x `height` icon.
    fn render_legend_icon(
        &self,
        map: &MapConfig,
        layer: usize,
        class: usize,
        width: u32,
        height: u32,
    ) -> Result<RenderedImage, BackendError>;

    /// Draw the error text onto a map-sized canvas; `blank` draws the bare
    /// canvas. Infallible: this is the image-mode exception path.
    fn render_error_image(&self, map: &MapConfig, blank: bool, message: &str) -> RenderedImage;

    /// Measure the legend layout for one layer, for LegendURL size hints.
    fn legend_size(&self, map: &MapConfig, layer: usize) -> Option<(u32, u32)>;
}

/// Point-query selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Stop at the first hit.
    Single,
    /// Collect up to the per-layer result limit.
    Multiple,
}

/// Whether a query produced any hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Hit,
    NotFound,
}

/// Vector/raster data source access.
pub trait QueryEngine {
    /// Query every ON layer at a map-space point, filling the per-layer
    /// result caches.
    fn query_by_point(
        &self,
        map: &mut MapConfig,
        mode: QueryMode,
        point: (f64, f64),
        buffer: f64,
        max_results: u32,
    ) -> Result<QueryOutcome, BackendError>;

    /// Open the layer's data source and populate `layer.items`.
    fn open_layer(&self, layer: &mut Layer) -> Result<(), BackendError>;

    fn close_layer(&self, layer: &mut Layer);

    /// Fetch the shape behind one result-cache member.
    fn shape(&self, layer: &Layer, member: &ResultMember) -> Result<Shape, BackendError>;

    /// Run the user template engine over a query result.
    fn render_template_query(
        &self,
        map: &MapConfig,
        params: &RequestParams,
        mimetype: &str,
    ) -> Result<Bytes, BackendError>;
}

/// Projection arithmetic.
pub trait Projector {
    /// Reproject a native extent to geographic EPSG:4326.
    fn latlon_extent(&self, extent: &Rect, projection: &Projection) -> Option<Rect>;
}

/// Styled-Layer-Descriptor handling.
pub trait SldEngine {
    fn apply_sld_url(&self, map: &mut MapConfig, url: &str) -> Result<(), BackendError>;

    fn apply_sld_body(&self, map: &mut MapConfig, xml: &str) -> Result<(), BackendError>;

    fn generate_sld(&self, map: &MapConfig) -> Result<String, BackendError>;
}

/// GML query-result serialisation.
pub trait GmlWriter {
    fn write_query(&self, map: &MapConfig, out: &mut Vec<u8>) -> Result<(), BackendError>;
}

/// All collaborators a request needs, borrowed for the request lifetime.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub renderer: &'a dyn Renderer,
    pub query: &'a dyn QueryEngine,
    pub projector: &'a dyn Projector,
    pub sld: &'a dyn SldEngine,
    pub gml: &'a dyn GmlWriter,
}
