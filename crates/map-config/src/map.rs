//! The root map configuration object and its ancillary blocks.

use std::sync::Arc;

use tracing::warn;

use crate::hashtable::MetadataTable;
use crate::layer::Layer;
use crate::outputformat::{default_formats, OutputFormat};
use crate::projection::Projection;
use crate::rect::Rect;
use crate::style::{Color, LabelDef};
use crate::units::Units;

/// Web/CGI-facing settings and the map-level metadata table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebConfig {
    pub log: Option<String>,
    pub imagepath: Option<String>,
    pub imageurl: Option<String>,
    pub template: Option<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
    /// URL to redirect to when a query returns nothing.
    pub empty: Option<String>,
    pub error: Option<String>,
    pub extent: Rect,
    pub min_scale_denom: f64,
    pub max_scale_denom: f64,
    pub min_template: Option<String>,
    pub max_template: Option<String>,
    pub metadata: MetadataTable,
    pub queryformat: Option<String>,
    pub legendformat: Option<String>,
    pub browseformat: Option<String>,
}

/// Reference (overview) map block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceMap {
    pub extent: Rect,
    pub width: u32,
    pub height: u32,
    pub color: Option<Color>,
    pub outline_color: Option<Color>,
    pub image: Option<String>,
    pub enabled: bool,
    pub marker: i32,
    pub marker_name: Option<String>,
    pub marker_size: i32,
    pub min_box_size: i32,
    pub max_box_size: i32,
}

/// Scalebar block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scalebar {
    pub image_color: Color,
    pub color: Option<Color>,
    pub background_color: Option<Color>,
    pub outline_color: Option<Color>,
    pub label: LabelDef,
    pub height: u32,
    pub width: u32,
    pub style: i32,
    pub intervals: i32,
    pub units: Units,
    pub enabled: bool,
    pub position: i32,
    pub transparent: bool,
    pub post_label_cache: bool,
}

/// Legend block; key sizes drive GetLegendGraphic icon defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legend {
    pub image_color: Color,
    pub label: LabelDef,
    pub key_size_x: i32,
    pub key_size_y: i32,
    pub key_spacing_x: i32,
    pub key_spacing_y: i32,
    pub outline_color: Option<Color>,
    pub enabled: bool,
    pub height: u32,
    pub width: u32,
    pub position: i32,
    pub transparent: bool,
    pub post_label_cache: bool,
    pub template: Option<String>,
}

/// How query results are highlighted when drawing a query map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMapStyle {
    Normal,
    #[default]
    Hilite,
    /// Draw only the selected features.
    Selected,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMap {
    pub width: u32,
    pub height: u32,
    pub enabled: bool,
    pub style: QueryMapStyle,
    pub color: Option<Color>,
}

/// Font alias table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSet {
    pub filename: Option<String>,
    pub fonts: MetadataTable,
}

/// A drawable symbol definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: i32,
    pub filled: bool,
    pub sizex: f64,
    pub sizey: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolSet {
    pub filename: Option<String>,
    pub symbols: Vec<Symbol>,
}

/// One queued label, waiting for the collision pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelCacheEntry {
    pub text: String,
    pub layer_index: usize,
    pub class_index: usize,
    pub point: (f64, f64),
    pub drawn: bool,
}

/// Per-request label queue. Never carried across a deep copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelCache {
    pub labels: Vec<LabelCacheEntry>,
}

/// The root of the configuration tree.
#[derive(Debug)]
pub struct MapConfig {
    pub name: String,
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub max_size: u32,
    pub extent: Rect,
    pub cellsize: f64,
    pub units: Units,
    pub scale_denom: f64,
    /// Output DPI used by scale-hint arithmetic.
    pub resolution: f64,
    pub shapepath: Option<String>,
    pub mappath: Option<String>,
    pub image_color: Color,
    /// Name of the active output format.
    pub imagetype: String,
    pub output_formats: Vec<Arc<OutputFormat>>,
    /// Active format; always also present in `output_formats`.
    pub output_format: Arc<OutputFormat>,
    pub projection: Projection,
    pub layers: Vec<Layer>,
    /// Draw order as indices into `layers`; always a permutation.
    pub layer_order: Vec<usize>,
    pub reference: ReferenceMap,
    pub scalebar: Scalebar,
    pub legend: Legend,
    pub query_map: QueryMap,
    pub web: WebConfig,
    pub fontset: FontSet,
    pub symbolset: SymbolSet,
    pub label_cache: LabelCache,
    pub config_options: MetadataTable,
    pub debug: bool,
    /// Time pattern selected for this request from `wms_timeformat`.
    /// Request-scoped; never carried across a deep copy.
    pub time_pattern: Option<String>,
}

impl MapConfig {
    /// A map with the stock output-format registry and CGI-era defaults.
    pub fn new(name: &str) -> Self {
        let formats = default_formats();
        let active = formats[0].clone();
        MapConfig {
            name: name.to_string(),
            enabled: true,
            width: 400,
            height: 300,
            max_size: 2048,
            extent: Rect::default(),
            cellsize: 0.0,
            units: Units::DecimalDegrees,
            scale_denom: -1.0,
            resolution: 72.0,
            shapepath: None,
            mappath: None,
            image_color: Color::default(),
            imagetype: active.name.clone(),
            output_formats: formats,
            output_format: active,
            projection: Projection::empty(),
            layers: Vec::new(),
            layer_order: Vec::new(),
            reference: ReferenceMap::default(),
            scalebar: Scalebar::default(),
            legend: Legend {
                key_size_x: 20,
                key_size_y: 10,
                key_spacing_x: 5,
                key_spacing_y: 5,
                ..Legend::default()
            },
            query_map: QueryMap::default(),
            web: WebConfig::default(),
            fontset: FontSet::default(),
            symbolset: SymbolSet::default(),
            label_cache: LabelCache::default(),
            config_options: MetadataTable::new(),
            debug: false,
            time_pattern: None,
        }
    }

    /// Append a layer, assigning its index and draw-order slot.
    pub fn push_layer(&mut self, mut layer: Layer) -> usize {
        let index = self.layers.len();
        layer.index = index;
        self.layers.push(layer);
        self.layer_order.push(index);
        index
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Find a registered output format by name or MIME type.
    pub fn select_output_format(&self, name: &str) -> Option<Arc<OutputFormat>> {
        self.output_formats
            .iter()
            .find(|f| f.matches(name))
            .cloned()
    }

    /// Make `format` the active output format, optionally overriding its
    /// transparency. An override copies the format so shared registrations
    /// stay untouched, and the copy replaces the original's registry slot.
    pub fn apply_output_format(&mut self, format: Arc<OutputFormat>, transparent: Option<bool>) {
        let chosen = match transparent {
            Some(t) if t != format.transparent => {
                let mut copy = (*format).clone();
                copy.transparent = t;
                Arc::new(copy)
            }
            _ => format,
        };
        match self
            .output_formats
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(&chosen.name))
        {
            Some(i) => self.output_formats[i] = chosen.clone(),
            None => self.output_formats.push(chosen.clone()),
        }
        self.output_format = chosen;
    }

    /// Deduplicated MIME types of formats advertisable for GetMap.
    pub fn wms_format_mimes(&self) -> Vec<String> {
        self.format_mimes(|f| f.is_wms_capable())
    }

    /// Deduplicated MIME types of raster formats usable for legends.
    pub fn gd_format_mimes(&self) -> Vec<String> {
        self.format_mimes(|f| f.is_raster_capable())
    }

    fn format_mimes(&self, accept: impl Fn(&OutputFormat) -> bool) -> Vec<String> {
        let mut mimes: Vec<String> = Vec::new();
        for format in &self.output_formats {
            if format.mimetype.is_empty() || !accept(format.as_ref()) {
                continue;
            }
            if !mimes.iter().any(|m| m.eq_ignore_ascii_case(&format.mimetype)) {
                mimes.push(format.mimetype.clone());
            }
        }
        mimes
    }

    /// Test a boolean config option ("YES"/"ON"/"TRUE" are truthy).
    pub fn config_option_enabled(&self, name: &str) -> bool {
        self.config_options
            .get(name)
            .map(|v| {
                v.eq_ignore_ascii_case("yes")
                    || v.eq_ignore_ascii_case("on")
                    || v.eq_ignore_ascii_case("true")
            })
            .unwrap_or(false)
    }

    pub fn set_config_option(&mut self, name: &str, value: &str) {
        self.config_options.set(name, value);
    }

    /// Give every layer a usable, unique name.
    ///
    /// Unnamed layers become `layer_<index>`; a duplicate gets `_<index>`
    /// appended. Run before dispatching any WMS operation so that LAYERS
    /// tokens resolve unambiguously.
    pub fn uniquify_layer_names(&mut self) {
        let mut seen: Vec<String> = Vec::new();
        for i in 0..self.layers.len() {
            let mut name = self.layers[i].name.clone();
            if name.is_empty() {
                name = format!("layer_{}", i);
            }
            if seen.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
                let renamed = format!("{}_{}", name, i);
                warn!(layer = %name, renamed = %renamed, "duplicate layer name");
                name = renamed;
            }
            seen.push(name.to_ascii_lowercase());
            self.layers[i].name = name;
        }
    }

    /// Startup sanity checks; logs problems rather than failing.
    pub fn validate(&self) {
        if !self.layer_order_is_permutation() {
            warn!(map = %self.name, "layerorder is not a permutation of the layer indices");
        }
        if !self
            .output_formats
            .iter()
            .any(|f| f.name.eq_ignore_ascii_case(&self.output_format.name))
        {
            warn!(map = %self.name, format = %self.output_format.name,
                  "active output format is not registered");
        }
    }

    /// True when `layer_order` contains each layer index exactly once.
    pub fn layer_order_is_permutation(&self) -> bool {
        if self.layer_order.len() != self.layers.len() {
            return false;
        }
        let mut present = vec![false; self.layers.len()];
        for &i in &self.layer_order {
            if i >= present.len() || present[i] {
                return false;
            }
            present[i] = true;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    #[test]
    fn test_push_layer_maintains_order() {
        let mut map = MapConfig::new("demo");
        map.push_layer(Layer::named("a"));
        map.push_layer(Layer::named("b"));
        assert_eq!(map.layer_order, vec![0, 1]);
        assert_eq!(map.layers[1].index, 1);
        assert!(map.layer_order_is_permutation());
    }

    #[test]
    fn test_select_output_format() {
        let map = MapConfig::new("demo");
        assert!(map.select_output_format("image/png").is_some());
        assert!(map.select_output_format("PNG").is_some());
        assert!(map.select_output_format("image/tiff").is_none());
    }

    #[test]
    fn test_apply_transparent_override_copies() {
        let mut map = MapConfig::new("demo");
        let png = map.select_output_format("png").unwrap();
        map.apply_output_format(png.clone(), Some(true));
        assert!(map.output_format.transparent);
        assert!(!png.transparent);
        // registry slot was replaced by the overridden copy
        assert!(map.select_output_format("png").unwrap().transparent);
    }

    #[test]
    fn test_uniquify_layer_names() {
        let mut map = MapConfig::new("demo");
        map.push_layer(Layer::named("roads"));
        map.push_layer(Layer::named(""));
        map.push_layer(Layer::named("ROADS"));
        map.uniquify_layer_names();
        assert_eq!(map.layers[0].name, "roads");
        assert_eq!(map.layers[1].name, "layer_1");
        assert_eq!(map.layers[2].name, "ROADS_2");
    }

    #[test]
    fn test_config_option_flag() {
        let mut map = MapConfig::new("demo");
        assert!(!map.config_option_enabled("MS_NONSQUARE"));
        map.set_config_option("MS_NONSQUARE", "YES");
        assert!(map.config_option_enabled("MS_NONSQUARE"));
    }
}
