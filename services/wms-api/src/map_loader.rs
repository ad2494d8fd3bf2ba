//! Map definition loader.
//!
//! Loads the served map from a YAML document. The raw serde structs below
//! are the file schema; they are converted into the `map-config` model (and
//! the inline feature tables the local query engine serves).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use map_config::{
    Class, Color, ConnectionKind, Expression, ExpressionKind, Layer, LayerStatus, LayerType,
    MapConfig, Projection, Rect, Shape, StyleDef, Units,
};

use crate::backends::LocalQueryEngine;

/// A parsed map plus the feature tables extracted from it.
pub struct LoadedMap {
    pub map: MapConfig,
    pub tables: HashMap<String, (Vec<String>, Vec<Shape>)>,
}

impl LoadedMap {
    pub fn into_parts(self) -> (MapConfig, LocalQueryEngine) {
        (self.map, LocalQueryEngine::new(self.tables))
    }
}

#[derive(Debug, Deserialize)]
struct RawMap {
    name: String,
    #[serde(default)]
    extent: Option<[f64; 4]>,
    #[serde(default)]
    size: Option<[u32; 2]>,
    #[serde(default)]
    max_size: Option<u32>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    resolution: Option<f64>,
    #[serde(default)]
    projection: Option<String>,
    #[serde(default)]
    image_color: Option<String>,
    #[serde(default)]
    image_type: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    config: HashMap<String, String>,
    #[serde(default)]
    web: RawWeb,
    #[serde(default)]
    legend: RawLegend,
    #[serde(default)]
    layers: Vec<RawLayer>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWeb {
    #[serde(default)]
    empty: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    min_scale_denom: Option<f64>,
    #[serde(default)]
    max_scale_denom: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLegend {
    #[serde(default)]
    key_size: Option<[i32; 2]>,
    #[serde(default)]
    key_spacing: Option<[i32; 2]>,
}

#[derive(Debug, Deserialize)]
struct RawLayer {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    layer_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    projection: Option<String>,
    #[serde(default)]
    extent: Option<[f64; 4]>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    connection: Option<String>,
    #[serde(default)]
    connection_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    opacity: Option<i32>,
    #[serde(default)]
    min_scale_denom: Option<f64>,
    #[serde(default)]
    max_scale_denom: Option<f64>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(default)]
    classes: Vec<RawClass>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawClass {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    styles: Vec<RawStyle>,
}

#[derive(Debug, Deserialize)]
struct RawStyle {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    outline_color: Option<String>,
    #[serde(default)]
    size: Option<f64>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    symbol: Option<String>,
}

/// Load and convert a YAML map definition.
pub fn load_map_config(path: &Path) -> Result<LoadedMap> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading map definition {}", path.display()))?;
    let raw: RawMap = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing map definition {}", path.display()))?;
    let loaded = convert(raw)?;
    info!(
        map = %loaded.map.name,
        layers = loaded.map.layers.len(),
        "loaded map definition"
    );
    Ok(loaded)
}

fn convert(raw: RawMap) -> Result<LoadedMap> {
    let mut map = MapConfig::new(&raw.name);
    if let Some([min_x, min_y, max_x, max_y]) = raw.extent {
        map.extent = Rect::new(min_x, min_y, max_x, max_y);
    }
    if let Some([width, height]) = raw.size {
        map.width = width;
        map.height = height;
    }
    if let Some(max_size) = raw.max_size {
        map.max_size = max_size;
    }
    if let Some(units) = &raw.units {
        map.units = Units::parse(units)
            .with_context(|| format!("unknown units keyword '{}'", units))?;
    }
    if let Some(resolution) = raw.resolution {
        map.resolution = resolution;
    }
    if let Some(projection) = &raw.projection {
        map.projection = Projection::from_definition(projection)?;
    }
    if let Some(color) = &raw.image_color {
        map.image_color = parse_color(color)?;
    }
    for (key, value) in &raw.metadata {
        map.web.metadata.set(key, value);
    }
    for (key, value) in &raw.config {
        map.config_options.set(key, value);
    }
    map.web.empty = raw.web.empty;
    map.web.error = raw.web.error;
    map.web.min_scale_denom = raw.web.min_scale_denom.unwrap_or(-1.0);
    map.web.max_scale_denom = raw.web.max_scale_denom.unwrap_or(-1.0);
    if let Some([x, y]) = raw.legend.key_size {
        map.legend.key_size_x = x;
        map.legend.key_size_y = y;
    }
    if let Some([x, y]) = raw.legend.key_spacing {
        map.legend.key_spacing_x = x;
        map.legend.key_spacing_y = y;
    }

    let mut tables = HashMap::new();
    for raw_layer in raw.layers {
        let (layer, table) = convert_layer(raw_layer)?;
        if let Some(table) = table {
            tables.insert(layer.name.clone(), table);
        }
        map.push_layer(layer);
    }

    if let Some(image_type) = &raw.image_type {
        let format = map
            .select_output_format(image_type)
            .with_context(|| format!("unknown output format '{}'", image_type))?;
        map.imagetype = image_type.clone();
        map.apply_output_format(format, None);
    }

    map.uniquify_layer_names();
    map.validate();
    Ok(LoadedMap { map, tables })
}

#[allow(clippy::type_complexity)]
fn convert_layer(raw: RawLayer) -> Result<(Layer, Option<(Vec<String>, Vec<Shape>)>)> {
    let mut layer = Layer::named(&raw.name);
    if let Some(title) = &raw.title {
        layer.metadata.set("wms_title", title);
    }
    layer.kind = match raw.layer_type.as_deref() {
        None => LayerType::Point,
        Some(t) => parse_layer_type(t)?,
    };
    layer.status = match raw.status.as_deref() {
        None => LayerStatus::Off,
        Some(s) => parse_status(s)?,
    };
    layer.group = raw.group.filter(|g| !g.is_empty());
    if let Some(projection) = &raw.projection {
        layer.projection = Projection::from_definition(projection)?;
    }
    if let Some([min_x, min_y, max_x, max_y]) = raw.extent {
        layer.extent = Rect::new(min_x, min_y, max_x, max_y);
    }
    layer.template = raw.template;
    layer.connection = raw.connection;
    layer.connection_kind = match raw.connection_type.as_deref() {
        None | Some("local") => ConnectionKind::Local,
        Some("wms") => ConnectionKind::Wms,
        Some("wfs") => ConnectionKind::Wfs,
        Some(other) => bail!("unknown connection type '{}'", other),
    };
    layer.data = raw.data;
    if let Some(opacity) = raw.opacity {
        layer.opacity = opacity;
    }
    layer.min_scale_denom = raw.min_scale_denom.unwrap_or(-1.0);
    layer.max_scale_denom = raw.max_scale_denom.unwrap_or(-1.0);
    for (key, value) in &raw.metadata {
        layer.metadata.set(key, value);
    }

    for raw_class in raw.classes {
        let mut class = Class::named(raw_class.name.as_deref().unwrap_or(""));
        if raw_class.name.is_none() {
            class.name = None;
        }
        class.title = raw_class.title;
        class.group = raw_class.group;
        class.template = raw_class.template;
        if let Some(expression) = raw_class.expression {
            class.expression = Expression::new(expression, ExpressionKind::Logical);
        }
        for raw_style in raw_class.styles {
            class.styles.push(convert_style(raw_style)?);
        }
        layer.classes.push(class);
    }

    let table = if raw.fields.is_empty() {
        None
    } else {
        let shapes: Vec<Shape> = raw
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| Shape {
                index: i as i64,
                tile: -1,
                class_index: 0,
                values: f.values.clone(),
                text: None,
            })
            .collect();
        Some((raw.fields, shapes))
    };

    Ok((layer, table))
}

fn convert_style(raw: RawStyle) -> Result<StyleDef> {
    let mut style = StyleDef::default();
    if let Some(color) = &raw.color {
        style.color = Some(parse_color(color)?);
    }
    if let Some(color) = &raw.outline_color {
        style.outline_color = Some(parse_color(color)?);
    }
    style.size = raw.size.unwrap_or(0.0);
    style.width = raw.width.unwrap_or(1.0);
    style.symbol_name = raw.symbol;
    Ok(style)
}

fn parse_color(s: &str) -> Result<Color> {
    Color::from_hex(s).with_context(|| format!("invalid colour '{}' (expected 0xRRGGBB)", s))
}

fn parse_layer_type(s: &str) -> Result<LayerType> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "point" => LayerType::Point,
        "line" => LayerType::Line,
        "polygon" => LayerType::Polygon,
        "raster" => LayerType::Raster,
        "annotation" => LayerType::Annotation,
        "circle" => LayerType::Circle,
        "query" => LayerType::Query,
        "tileindex" => LayerType::TileIndex,
        "chart" => LayerType::Chart,
        other => bail!("unknown layer type '{}'", other),
    })
}

fn parse_status(s: &str) -> Result<LayerStatus> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "on" => LayerStatus::On,
        "off" => LayerStatus::Off,
        "default" => LayerStatus::Default,
        other => bail!("unknown layer status '{}'", other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: demo
extent: [-180, -90, 180, 90]
size: [800, 600]
units: dd
projection: "init=epsg:4326"
metadata:
  wms_title: Demo WMS
  wms_srs: "EPSG:4326"
layers:
  - name: streets
    type: line
    template: query.html
    metadata:
      wms_title: Street network
    fields: [id, name]
    features:
      - values: ["7", "Main"]
      - values: ["8", "Elm"]
    classes:
      - name: major
        group: main
        expression: "([class] = 1)"
        styles:
          - color: "0xCC0000"
            width: 2
  - name: relief
    type: raster
"#;

    #[test]
    fn test_convert_sample() {
        let raw: RawMap = serde_yaml::from_str(SAMPLE).unwrap();
        let loaded = convert(raw).unwrap();
        assert_eq!(loaded.map.name, "demo");
        assert_eq!(loaded.map.layers.len(), 2);
        assert_eq!(loaded.map.layers[0].name, "streets");
        assert_eq!(loaded.map.layers[0].kind, LayerType::Line);
        assert_eq!(
            loaded.map.layers[0].classes[0].group.as_deref(),
            Some("main")
        );
        assert_eq!(
            loaded.map.layers[0].classes[0].styles[0].color,
            Some(Color::new(0xCC, 0, 0))
        );
        assert!(loaded.map.layer_order_is_permutation());
        let (items, shapes) = &loaded.tables["streets"];
        assert_eq!(items, &vec!["id".to_string(), "name".to_string()]);
        assert_eq!(shapes.len(), 2);
    }

    #[test]
    fn test_bad_units_rejected() {
        let raw: RawMap = serde_yaml::from_str("name: x\nunits: lightyears").unwrap();
        assert!(convert(raw).is_err());
    }

    #[test]
    fn test_bad_layer_type_rejected() {
        let raw: RawMap =
            serde_yaml::from_str("name: x\nlayers:\n  - name: a\n    type: hologram").unwrap();
        assert!(convert(raw).is_err());
    }
}
