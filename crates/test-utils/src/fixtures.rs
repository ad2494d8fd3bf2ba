//! Canonical map configurations for tests.

use map_config::{
    Class, Layer, LayerStatus, LayerType, MapConfig, Projection, Rect, Shape,
};

/// A small two-layer map: a queryable vector layer with styled class groups
/// and a plain raster layer. Advertises EPSG:4326 only.
pub fn demo_map() -> MapConfig {
    let mut map = MapConfig::new("demo");
    map.extent = Rect::new(-180.0, -90.0, 180.0, 90.0);
    map.projection = Projection::from_definition("init=epsg:4326").unwrap();
    map.web.metadata.set("wms_title", "Demo WMS Server");
    map.web.metadata.set("wms_abstract", "Fixture map for protocol tests");
    map.web.metadata.set("wms_srs", "EPSG:4326");
    map.web
        .metadata
        .set("wms_onlineresource", "http://wms.test/ows?");

    let mut streets = Layer::named("streets");
    streets.kind = LayerType::Line;
    streets.template = Some("query.html".to_string());
    streets.metadata.set("wms_title", "Street network");
    streets.extent = Rect::new(-180.0, -90.0, 180.0, 90.0);
    let mut major = Class::named("major");
    major.group = Some("main".to_string());
    major.template = Some("query.html".to_string());
    streets.classes.push(major);
    let mut minor = Class::named("minor");
    minor.group = Some("alternate".to_string());
    streets.classes.push(minor);
    map.push_layer(streets);

    let mut relief = Layer::named("relief");
    relief.kind = LayerType::Raster;
    relief.metadata.set("wms_title", "Shaded relief");
    map.push_layer(relief);

    map
}

/// `demo_map` plus a time-aware observation layer.
pub fn timed_map() -> MapConfig {
    let mut map = demo_map();
    let mut obs = Layer::named("observations");
    obs.kind = LayerType::Point;
    obs.template = Some("query.html".to_string());
    obs.metadata.set("wms_title", "Field observations");
    obs.metadata.set("wms_timeextent", "2004-01-01/2004-12-31");
    obs.metadata.set("wms_timeitem", "obs_date");
    obs.metadata.set("wms_timedefault", "2004-06-01");
    map.push_layer(obs);
    map
}

/// Attribute rows for the `streets` layer used by [`MockQueryEngine`].
///
/// [`MockQueryEngine`]: crate::mocks::MockQueryEngine
pub fn street_features() -> (Vec<String>, Vec<Shape>) {
    let items = vec!["id".to_string(), "name".to_string()];
    let shapes = vec![
        Shape {
            index: 7,
            tile: -1,
            class_index: 0,
            values: vec!["7".to_string(), "Main".to_string()],
            text: None,
        },
        Shape {
            index: 8,
            tile: -1,
            class_index: 1,
            values: vec!["8".to_string(), "Elm".to_string()],
            text: None,
        },
    ];
    (items, shapes)
}

/// Turn a layer on by name, as the LAYERS parameter would.
pub fn enable_layer(map: &mut MapConfig, name: &str) {
    for layer in map.layers.iter_mut() {
        if layer.name.eq_ignore_ascii_case(name) {
            layer.status = LayerStatus::On;
        }
    }
}
