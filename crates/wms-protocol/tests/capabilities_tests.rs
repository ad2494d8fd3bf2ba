//! GetCapabilities document tests.

use quick_xml::events::Event;
use quick_xml::Reader;

use test_utils::{demo_map, timed_map, MockBackends};
use wms_protocol::{dispatch, Dispatch, RequestParams, WmsResponse};

fn capabilities(map: &mut map_config::MapConfig, version: Option<&str>) -> WmsResponse {
    let backends = MockBackends::new();
    let mut entries: Vec<(&str, &str)> = vec![("SERVICE", "WMS"), ("REQUEST", "GetCapabilities")];
    if let Some(version) = version {
        entries.push(("VERSION", version));
    }
    let params: RequestParams = entries.into_iter().collect();
    match dispatch(map, &params, &backends.as_backends()) {
        Dispatch::Response(resp) => resp,
        Dispatch::NotWms => panic!("capabilities request fell through"),
    }
}

fn body_text(resp: &WmsResponse) -> String {
    String::from_utf8(resp.body.to_vec()).unwrap()
}

/// Parse everything from the root element on and fail on malformed XML.
/// (The DOCTYPE with its internal subset is skipped; it is not XML proper.)
fn assert_well_formed(body: &str) -> usize {
    let start = body.find("<WMT_MS_Capabilities").expect("no root element");
    let mut reader = Reader::from_str(&body[start..]);
    let mut depth = 0usize;
    let mut elements = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                elements += 1;
            }
            Ok(Event::Empty(_)) => elements += 1,
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => break,
            Err(e) => panic!("malformed capabilities XML: {}", e),
            _ => {}
        }
    }
    assert_eq!(depth, 0, "unbalanced elements");
    elements
}

#[test]
fn test_document_well_formed_all_versions() {
    for version in [None, Some("1.0.0"), Some("1.0.7"), Some("1.1.0"), Some("1.1.1")] {
        let mut map = demo_map();
        let resp = capabilities(&mut map, version);
        assert_well_formed(&body_text(&resp));
    }
}

#[test]
fn test_doctype_urls_per_version() {
    for (version, fragment) in [
        ("1.0.0", "/wms/1.0.0/capabilities_1_0_0.dtd"),
        ("1.0.7", "/wms/1.0.7/capabilities_1_0_7.dtd"),
        ("1.1.0", "/wms/1.1.0/capabilities_1_1_0.dtd"),
        ("1.1.1", "/wms/1.1.1/WMS_MS_Capabilities.dtd"),
    ] {
        let mut map = demo_map();
        let resp = capabilities(&mut map, Some(version));
        assert!(
            body_text(&resp).contains(fragment),
            "version {} should reference {}",
            version,
            fragment
        );
    }
}

#[test]
fn test_version_flooring_in_document() {
    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.0.5"));
    assert!(body_text(&resp).contains("<WMT_MS_Capabilities version=\"1.0.0\""));
    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.3.0"));
    assert!(body_text(&resp).contains("<WMT_MS_Capabilities version=\"1.1.1\""));
}

#[test]
fn test_exception_format_advertisement() {
    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.0.0"));
    assert!(body_text(&resp).contains("<Format><BLANK /><INIMAGE /><WMS_XML /></Format>"));

    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert!(body.contains("<Format>application/vnd.ogc.se_xml</Format>"));
    assert!(body.contains("<Format>application/vnd.ogc.se_inimage</Format>"));
    assert!(body.contains("<Format>application/vnd.ogc.se_blank</Format>"));
}

#[test]
fn test_srs_emission_per_version() {
    let mut map = demo_map();
    map.web.metadata.set("wms_srs", "EPSG:4326 EPSG:3857");
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert!(body.contains("<SRS>EPSG:4326</SRS>"));
    assert!(body.contains("<SRS>EPSG:3857</SRS>"));
    assert!(!body.contains("<SRS>EPSG:4326 EPSG:3857</SRS>"));

    let mut map = demo_map();
    map.web.metadata.set("wms_srs", "EPSG:4326 EPSG:3857");
    let resp = capabilities(&mut map, Some("1.1.0"));
    assert!(body_text(&resp).contains("<SRS>EPSG:4326 EPSG:3857</SRS>"));
}

#[test]
fn test_getmap_formats_from_registry() {
    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert!(body.contains("<Format>image/png</Format>"));
    assert!(body.contains("<Format>image/svg+xml</Format>"));
    // 1.1.1 advertises the raster-only legend operation
    assert!(body.contains("<GetLegendGraphic>"));
    assert!(body.contains("<GetStyles>"));
}

#[test]
fn test_legend_graphic_absent_before_111() {
    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.1.0"));
    let body = body_text(&resp);
    assert!(!body.contains("<GetLegendGraphic>"));
    assert!(!body.contains("<GetStyles>"));
}

#[test]
fn test_style_blocks_with_synthesized_legend_urls() {
    let mut map = demo_map();
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    // one Style per class group, legend size measured by the renderer
    assert!(body.contains("<Name>main</Name>"));
    assert!(body.contains("<Name>alternate</Name>"));
    assert!(body.contains("<LegendURL width=\"24\" height=\"12\">"));
    assert!(body.contains("request=GetLegendGraphic&amp;layer=streets"));
}

#[test]
fn test_time_dimension_block() {
    let mut map = timed_map();
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert!(body.contains("<Dimension name=\"time\" units=\"ISO8601\"/>"));
    assert!(body.contains(
        "<Extent name=\"time\" default=\"2004-06-01\" nearestValue=\"0\">2004-01-01/2004-12-31</Extent>"
    ));
}

#[test]
fn test_scale_hint() {
    let mut map = demo_map();
    map.layers[0].min_scale_denom = 1000.0;
    map.layers[0].max_scale_denom = 100000.0;
    let resp = capabilities(&mut map, Some("1.1.1"));
    assert!(body_text(&resp).contains("<ScaleHint min="));
}

// ============================================================================
// Update sequence
// ============================================================================

fn capabilities_with_sequence(server: &str, requested: &str) -> WmsResponse {
    let mut map = demo_map();
    map.web.metadata.set("wms_updatesequence", server);
    let backends = MockBackends::new();
    let params: RequestParams = vec![
        ("SERVICE", "WMS"),
        ("REQUEST", "GetCapabilities"),
        ("UPDATESEQUENCE", requested),
    ]
    .into_iter()
    .collect();
    match dispatch(&mut map, &params, &backends.as_backends()) {
        Dispatch::Response(resp) => resp,
        Dispatch::NotWms => panic!("capabilities request fell through"),
    }
}

#[test]
fn test_update_sequence_equal_is_current() {
    let resp = capabilities_with_sequence("5", "5");
    let body = body_text(&resp);
    assert!(body.contains("code=\"CurrentUpdateSequence\""));
    assert!(!body.contains("<WMT_MS_Capabilities"));
}

#[test]
fn test_update_sequence_higher_is_invalid() {
    let resp = capabilities_with_sequence("5", "6");
    assert!(body_text(&resp).contains("code=\"InvalidUpdateSequence\""));
}

#[test]
fn test_update_sequence_lower_returns_document() {
    let resp = capabilities_with_sequence("5", "4");
    let body = body_text(&resp);
    assert!(body.contains("<WMT_MS_Capabilities"));
    assert!(body.contains("updateSequence=\"5\""));
}

// ============================================================================
// Layer grouping
// ============================================================================

#[test]
fn test_flat_group_encloses_members() {
    let mut map = demo_map();
    map.layers[0].group = Some("transport".to_string());
    map.layers[0]
        .metadata
        .set("wms_group_title", "Transport layers");
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert_well_formed(&body);
    assert!(body.contains("<Name>transport</Name>"));
    assert!(body.contains("<Title>Transport layers</Title>"));
    let group_pos = body.find("<Name>transport</Name>").unwrap();
    let member_pos = body.find("<Name>streets</Name>").unwrap();
    assert!(group_pos < member_pos);
}

#[test]
fn test_nested_groups_tree() {
    let mut map = demo_map();
    map.layers[0]
        .metadata
        .set("wms_layer_group", "/Infrastructure/Roads");
    map.layers[1]
        .metadata
        .set("wms_layer_group", "/Infrastructure/Terrain");
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert_well_formed(&body);
    // one shared root group, two subgroups underneath
    assert_eq!(body.matches("<Title>Infrastructure</Title>").count(), 1);
    assert!(body.contains("<Title>Roads</Title>"));
    assert!(body.contains("<Title>Terrain</Title>"));
}

#[test]
fn test_group_conflict_is_service_exception() {
    let mut map = demo_map();
    map.layers[0].group = Some("transport".to_string());
    map.layers[0]
        .metadata
        .set("wms_layer_group", "/Infrastructure/Roads");
    let resp = capabilities(&mut map, Some("1.1.1"));
    let body = body_text(&resp);
    assert!(body.contains("<ServiceExceptionReport"));
    assert!(body.contains("not allowed to set both"));
}

#[test]
fn test_unrooted_layer_group_is_service_exception() {
    let mut map = demo_map();
    map.layers[0]
        .metadata
        .set("wms_layer_group", "Infrastructure/Roads");
    let resp = capabilities(&mut map, Some("1.1.1"));
    assert!(body_text(&resp).contains("does not start with a '/'"));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_clone_serialization_idempotent() {
    let mut master = timed_map();
    master.web.metadata.set("wms_keywordlist", "maps,roads,demo");
    let mut copy = master.clone_for_request().unwrap();

    let from_master = body_text(&capabilities(&mut master, Some("1.1.1")));
    let from_copy = body_text(&capabilities(&mut copy, Some("1.1.1")));
    assert_eq!(from_master, from_copy);
}

#[test]
fn test_repeat_request_byte_identical() {
    let mut map = demo_map();
    let first = body_text(&capabilities(&mut map, Some("1.1.1")));
    let mut map = demo_map();
    let second = body_text(&capabilities(&mut map, Some("1.1.1")));
    assert_eq!(first, second);
}
