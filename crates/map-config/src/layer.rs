//! Layer definitions and their per-request runtime state.

use crate::class::Class;
use crate::expression::Expression;
use crate::hashtable::MetadataTable;
use crate::projection::Projection;
use crate::rect::Rect;
use crate::units::Units;

/// Whether a layer takes part in the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerStatus {
    On,
    #[default]
    Off,
    /// Always drawn, first, regardless of the LAYERS parameter.
    Default,
}

/// Geometry family a layer renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerType {
    #[default]
    Point,
    Line,
    Polygon,
    Raster,
    Annotation,
    Circle,
    Query,
    TileIndex,
    Chart,
}

impl LayerType {
    /// Vector families served through WFS in DescribeLayer responses.
    pub fn is_vector(self) -> bool {
        matches!(self, LayerType::Point | LayerType::Line | LayerType::Polygon)
    }

    /// Families drawable from a query result cache.
    pub fn is_query_drawable(self) -> bool {
        matches!(
            self,
            LayerType::Point
                | LayerType::Line
                | LayerType::Polygon
                | LayerType::Annotation
                | LayerType::TileIndex
        )
    }
}

/// Where a layer's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionKind {
    /// Local data: shapefile, inline features, database, raster file.
    #[default]
    Local,
    /// Cascaded from a remote WMS server.
    Wms,
    /// Fetched from a remote WFS server.
    Wfs,
}

/// A relational join from layer features to an external table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    OneToOne,
    OneToMany,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Join {
    pub name: Option<String>,
    pub table: Option<String>,
    pub from_item: Option<String>,
    pub to_item: Option<String>,
    pub header: Option<String>,
    pub template: Option<String>,
    pub footer: Option<String>,
    pub connection: Option<String>,
    pub kind: JoinKind,
}

/// One feature pulled from a data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub index: i64,
    pub tile: i32,
    pub class_index: i32,
    /// Attribute values aligned with the owning layer's `items`.
    pub values: Vec<String>,
    pub text: Option<String>,
}

/// A query hit recorded in a layer's result cache.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResultMember {
    pub shape_index: i64,
    pub tile_index: i32,
    pub class_index: i32,
}

/// Per-request query results for one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCache {
    pub results: Vec<ResultMember>,
    pub bounds: Rect,
}

/// A drawable layer of the map configuration.
///
/// Deliberately not `Clone`: copies go through
/// [`Layer::clone_for_request`](crate::copy) so runtime state never leaks
/// into a new request.
#[derive(Debug, Default, PartialEq)]
pub struct Layer {
    /// Position inside `MapConfig::layers`; doubles as the back-reference
    /// children use to reach their parent.
    pub index: usize,
    pub name: String,
    /// Single-level group label; empty via `None`.
    pub group: Option<String>,
    pub status: LayerStatus,
    pub kind: LayerType,
    pub connection: Option<String>,
    pub connection_kind: ConnectionKind,
    pub data: Option<String>,
    pub template: Option<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub classitem: Option<String>,
    /// Active class-group filter, bound from the STYLES parameter.
    pub classgroup: Option<String>,
    pub classes: Vec<Class>,
    pub joins: Vec<Join>,
    pub features: Vec<Shape>,
    pub processing: Vec<String>,
    pub metadata: MetadataTable,
    pub projection: Projection,
    /// Whether coordinates are transformed from map to image space.
    pub transform: bool,
    /// Whether features are reprojected into the map projection.
    pub project: bool,
    pub extent: Rect,
    pub min_scale_denom: f64,
    pub max_scale_denom: f64,
    pub symbol_scale_denom: f64,
    pub scale_factor: f64,
    pub size_units: Units,
    pub tolerance: f64,
    pub tolerance_units: Units,
    pub opacity: i32,
    pub max_features: i32,
    pub filter: Expression,
    pub filter_item: Option<String>,
    pub style_item: Option<String>,
    pub label_item: Option<String>,
    pub tile_item: Option<String>,
    pub tile_index: Option<String>,
    pub requires: Option<String>,
    pub label_requires: Option<String>,
    pub dump: bool,
    pub debug: bool,

    // Runtime state, only populated between open/close on the copy that
    // serves a request. Never carried across a deep copy.
    /// Attribute names, filled by the data source on open.
    pub items: Vec<String>,
    /// Stand-in for the driver connection handle.
    pub opened: bool,
    pub result_cache: Option<ResultCache>,
}

impl Layer {
    pub fn named(name: &str) -> Self {
        Layer {
            name: name.to_string(),
            transform: true,
            opacity: 100,
            max_features: -1,
            min_scale_denom: -1.0,
            max_scale_denom: -1.0,
            symbol_scale_denom: -1.0,
            scale_factor: 1.0,
            size_units: Units::Pixels,
            tolerance: -1.0,
            tolerance_units: Units::Pixels,
            ..Layer::default()
        }
    }

    /// A layer is queryable when it or one of its classes carries a template
    /// and the layer is not a tile index.
    pub fn is_queryable(&self) -> bool {
        if self.kind == LayerType::TileIndex {
            return false;
        }
        self.template.is_some() || self.classes.iter().any(|c| c.template.is_some())
    }

    /// The distinct class-group labels, in first-appearance order, for
    /// classes that carry both a name and a group.
    pub fn class_groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for class in &self.classes {
            if class.name.is_none() {
                continue;
            }
            if let Some(group) = class.group.as_deref() {
                if !groups.iter().any(|g| g.eq_ignore_ascii_case(group)) {
                    groups.push(group);
                }
            }
        }
        groups
    }

    /// Whether any class carries a non-empty name (legend material).
    pub fn has_named_class(&self) -> bool {
        self.classes
            .iter()
            .any(|c| c.name.as_deref().is_some_and(|n| !n.is_empty()))
    }
}
