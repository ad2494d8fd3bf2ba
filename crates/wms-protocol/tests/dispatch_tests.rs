//! End-to-end dispatch tests over fixture maps and mock collaborators.

use map_config::LayerStatus;
use test_utils::{demo_map, timed_map, MockBackends, MOCK_PNG};
use wms_protocol::{dispatch, Dispatch, RequestParams, WmsResponse};

fn params(entries: &[(&str, &str)]) -> RequestParams {
    entries.iter().copied().collect()
}

fn response(dispatch: Dispatch) -> WmsResponse {
    match dispatch {
        Dispatch::Response(resp) => resp,
        Dispatch::NotWms => panic!("expected a WMS response, got the not-a-WMS sentinel"),
    }
}

fn body_text(resp: &WmsResponse) -> String {
    String::from_utf8(resp.body.to_vec()).unwrap()
}

#[test]
fn test_non_wms_request_passed_through() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let verdict = dispatch(&mut map, &params(&[("FOO", "bar")]), &backends.as_backends());
    assert!(matches!(verdict, Dispatch::NotWms));
}

#[test]
fn test_other_service_passed_through() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let verdict = dispatch(
        &mut map,
        &params(&[("SERVICE", "WFS"), ("REQUEST", "GetCapabilities")]),
        &backends.as_backends(),
    );
    assert!(matches!(verdict, Dispatch::NotWms));
}

#[test]
fn test_capabilities_default_version() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[("SERVICE", "WMS"), ("REQUEST", "GetCapabilities")]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "application/vnd.ogc.wms_xml");
    let body = body_text(&resp);
    // XML payloads lead with the declaration, matching the declared MIME
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("<WMT_MS_Capabilities version=\"1.1.1\""));
    assert!(body.contains("<Name>OGC:WMS</Name>"));
}

#[test]
fn test_capabilities_without_service_rejected() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[("REQUEST", "GetCapabilities"), ("VERSION", "1.1.1")]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("code=\"ServiceNotDefined\""));
}

#[test]
fn test_capabilities_legacy_version_mime() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("REQUEST", "capabilities"),
            ("WMTVER", "1.0.0"),
        ]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "text/xml");
    let body = body_text(&resp);
    assert!(body.contains("<WMT_MS_Capabilities version=\"1.0.0\""));
    assert!(body.contains("<Name>GetMap</Name>"));
}

#[test]
fn test_version_required_for_getmap() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[("SERVICE", "WMS"), ("REQUEST", "GetMap")]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("VERSION parameter missing"));
}

#[test]
fn test_bad_version_format() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[("SERVICE", "WMS"), ("REQUEST", "GetMap"), ("VERSION", "1.1")]),
        &backends.as_backends(),
    ));
    let body = body_text(&resp);
    assert!(body.contains("<ServiceExceptionReport"));
    assert!(body.contains("x.y.z"));
}

#[test]
fn test_unsupported_request_with_service() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetGoodness"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("Incomplete or unsupported WMS request"));
}

fn getmap_params<'a>() -> Vec<(&'a str, &'a str)> {
    vec![
        ("SERVICE", "WMS"),
        ("VERSION", "1.1.1"),
        ("REQUEST", "GetMap"),
        ("LAYERS", "streets"),
        ("STYLES", ""),
        ("SRS", "EPSG:4326"),
        ("BBOX", "-10,-10,10,10"),
        ("WIDTH", "256"),
        ("HEIGHT", "256"),
        ("FORMAT", "image/png"),
    ]
}

#[test]
fn test_getmap_success() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&getmap_params()),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "image/png");
    assert_eq!(&resp.body[..], MOCK_PNG);
    assert_eq!(map.layers[0].status, LayerStatus::On);
    assert_eq!(map.layers[1].status, LayerStatus::Off);
    assert!(map.layer_order_is_permutation());
}

#[test]
fn test_getmap_half_pixel_adjustment() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    response(dispatch(
        &mut map,
        &params(&getmap_params()),
        &backends.as_backends(),
    ));
    // WMS edge-to-edge extents shrink by half a pixel on each side
    let cell = 20.0 / 256.0;
    assert!((map.extent.min_x - (-10.0 + cell * 0.5)).abs() < 1e-9);
    assert!((map.extent.max_y - (10.0 - cell * 0.5)).abs() < 1e-9);
}

#[test]
fn test_getmap_cache_control() {
    let mut map = demo_map();
    map.web.metadata.set("wms_http_max_age", "3600");
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&getmap_params()),
        &backends.as_backends(),
    ));
    assert_eq!(resp.cache_control.as_deref(), Some("max-age=3600"));
}

#[test]
fn test_getmap_unknown_layer() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[3] = ("LAYERS", "nothere");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"LayerNotDefined\""));
}

#[test]
fn test_getmap_invalid_srs() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[5] = ("SRS", "EPSG:3857");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"InvalidSRS\""));
}

#[test]
fn test_getmap_srs_namespace_rejected() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[5] = ("SRS", "CRS:84");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"InvalidSRS\""));
}

#[test]
fn test_getmap_zero_width() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[7] = ("WIDTH", "0");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("Image size out of range"));
    // drawable defaults restored for in-image exception rendering
    assert_eq!((map.width, map.height), (400, 300));
}

#[test]
fn test_getmap_degenerate_bbox() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[6] = ("BBOX", "5,-10,5,10");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("Invalid values for BBOX"));
}

#[test]
fn test_getmap_missing_format() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries.retain(|(n, _)| !n.eq_ignore_ascii_case("FORMAT"));
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    let body = body_text(&resp);
    assert!(body.contains("code=\"MissingParameterValue\""));
    assert!(body.contains("FORMAT"));
}

#[test]
fn test_getmap_unsupported_format() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[9] = ("FORMAT", "image/tiff");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"InvalidFormat\""));
}

#[test]
fn test_getmap_nonsquare_pixels_enable_projection_propagation() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[6] = ("BBOX", "0,0,10,5");
    entries[7] = ("WIDTH", "200");
    entries[8] = ("HEIGHT", "200");
    response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(map.config_option_enabled("MS_NONSQUARE"));
    // the ON layer inherited the original map projection
    assert!(map.layers[0].projection.is_set());
    assert!(map.layers[0].project);
}

#[test]
fn test_getmap_group_token_selects_members() {
    let mut map = demo_map();
    map.layers[0].group = Some("transport".to_string());
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[3] = ("LAYERS", "transport");
    response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(map.layers[0].status, LayerStatus::On);
}

#[test]
fn test_styles_bind_classgroup() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[4] = ("STYLES", "main");
    response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(map.layers[0].classgroup.as_deref(), Some("main"));
}

#[test]
fn test_styles_unknown_group() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[4] = ("STYLES", "fancy");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"StyleNotDefined\""));
}

#[test]
fn test_exceptions_inimage_override() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries[3] = ("LAYERS", "nothere");
    entries.push(("EXCEPTIONS", "application/vnd.ogc.se_inimage"));
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(resp.content_type, "image/png");
    assert_eq!(&resp.body[..], MOCK_PNG);
    let recorded = backends.renderer.error_messages.lock().unwrap();
    assert!(recorded[0].contains("Invalid layer(s)"));
}

#[test]
fn test_sld_unavailable() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let mut entries = getmap_params();
    entries.push(("SLD", "http://example.com/style.xml"));
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("SLD support is not available."));
}

// ============================================================================
// TIME dimension
// ============================================================================

fn timed_getmap<'a>() -> Vec<(&'a str, &'a str)> {
    let mut entries = getmap_params();
    entries[3] = ("LAYERS", "observations");
    entries
}

#[test]
fn test_time_default_fallback() {
    let mut map = timed_map();
    let backends = MockBackends::new();
    response(dispatch(&mut map, &params(&timed_getmap()), &backends.as_backends()));
    let obs = map.layers.iter().find(|l| l.name == "observations").unwrap();
    assert_eq!(
        obs.filter.string.as_deref(),
        Some("([obs_date] = `2004-06-01`)")
    );
}

#[test]
fn test_time_explicit_value() {
    let mut map = timed_map();
    let backends = MockBackends::new();
    let mut entries = timed_getmap();
    entries.push(("TIME", "2004-09-21"));
    response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    let obs = map.layers.iter().find(|l| l.name == "observations").unwrap();
    assert_eq!(
        obs.filter.string.as_deref(),
        Some("([obs_date] = `2004-09-21`)")
    );
}

#[test]
fn test_time_outside_extent_falls_back_to_default() {
    let mut map = timed_map();
    let backends = MockBackends::new();
    let mut entries = timed_getmap();
    entries.push(("TIME", "2007-01-01"));
    response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    let obs = map.layers.iter().find(|l| l.name == "observations").unwrap();
    assert_eq!(
        obs.filter.string.as_deref(),
        Some("([obs_date] = `2004-06-01`)")
    );
}

#[test]
fn test_time_invalid_without_default() {
    let mut map = timed_map();
    let idx = map
        .layers
        .iter()
        .position(|l| l.name == "observations")
        .unwrap();
    map.layers[idx].metadata.remove("wms_timedefault");
    let backends = MockBackends::new();
    let mut entries = timed_getmap();
    entries.push(("TIME", "2007-01-01"));
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"InvalidDimensionValue\""));
}

#[test]
fn test_time_missing_without_default() {
    let mut map = timed_map();
    let idx = map
        .layers
        .iter()
        .position(|l| l.name == "observations")
        .unwrap();
    map.layers[idx].metadata.remove("wms_timedefault");
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&timed_getmap()),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("code=\"MissingDimensionValue\""));
}

#[test]
fn test_time_pattern_selection_is_request_scoped() {
    let mut map = timed_map();
    map.web
        .metadata
        .set("wms_timeformat", "%Y-%m-%dT%H:%M:%S, %Y-%m-%d");
    let backends = MockBackends::new();
    let mut entries = timed_getmap();
    entries.push(("TIME", "2004-09-21/2004-09-25"));
    response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(map.time_pattern.as_deref(), Some("%Y-%m-%d"));
    // the master copy is untouched by request-scoped state
    let fresh = map.clone_for_request().unwrap();
    assert!(fresh.time_pattern.is_none());
}

// ============================================================================
// GetFeatureInfo
// ============================================================================

fn featureinfo_params<'a>() -> Vec<(&'a str, &'a str)> {
    vec![
        ("SERVICE", "WMS"),
        ("VERSION", "1.1.1"),
        ("REQUEST", "GetFeatureInfo"),
        ("LAYERS", "streets"),
        ("QUERY_LAYERS", "streets"),
        ("SRS", "EPSG:4326"),
        ("BBOX", "-10,-10,10,10"),
        ("WIDTH", "256"),
        ("HEIGHT", "256"),
        ("X", "128"),
        ("Y", "128"),
        ("INFO_FORMAT", "MIME"),
        ("FEATURE_COUNT", "5"),
    ]
}

#[test]
fn test_featureinfo_plain_text() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let resp = response(dispatch(
        &mut map,
        &params(&featureinfo_params()),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "text/plain");
    let body = body_text(&resp);
    assert!(body.starts_with(
        "GetFeatureInfo results:\n\nLayer 'streets'\n  Feature 7: \n    id = '7'\n    name = 'Main'\n"
    ));
    assert!(body.contains("  Feature 8: \n"));
}

#[test]
fn test_featureinfo_single_mode_limits_results() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries.retain(|(n, _)| !n.eq_ignore_ascii_case("FEATURE_COUNT"));
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    let body = body_text(&resp);
    assert!(body.contains("  Feature 7: \n"));
    assert!(!body.contains("  Feature 8: \n"));
}

#[test]
fn test_featureinfo_include_items_filter() {
    let mut map = demo_map();
    map.layers[0].metadata.set("wms_include_items", "name");
    let backends = MockBackends::with_demo_features();
    let resp = response(dispatch(
        &mut map,
        &params(&featureinfo_params()),
        &backends.as_backends(),
    ));
    let body = body_text(&resp);
    assert!(body.contains("    name = 'Main'\n"));
    assert!(!body.contains("    id = '7'\n"));
}

#[test]
fn test_featureinfo_no_results_message() {
    let mut map = demo_map();
    // an engine with no tables still answers, with an empty result set
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&featureinfo_params()),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("\n  Search returned no results.\n"));
}

#[test]
fn test_featureinfo_gml_format() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries[11] = ("INFO_FORMAT", "GML");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(resp.content_type, "application/vnd.ogc.gml");
    assert!(body_text(&resp).contains("<msGMLOutput>"));
}

#[test]
fn test_featureinfo_not_queryable() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries[3] = ("LAYERS", "relief");
    entries[4] = ("QUERY_LAYERS", "relief");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"LayerNotQueryable\""));
}

#[test]
fn test_featureinfo_unknown_query_layer() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries[4] = ("QUERY_LAYERS", "nothere");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("code=\"LayerNotDefined\""));
}

#[test]
fn test_featureinfo_missing_xy() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries.retain(|(n, _)| !n.eq_ignore_ascii_case("X") && !n.eq_ignore_ascii_case("Y"));
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("Required X/Y parameters missing"));
}

#[test]
fn test_featureinfo_template_format() {
    let mut map = demo_map();
    map.web
        .metadata
        .set("wms_feature_info_mime_type", "text/html");
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries[11] = ("INFO_FORMAT", "text/html");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(resp.content_type, "text/html");
    assert_eq!(body_text(&resp), "template:text/html:streets");
}

#[test]
fn test_featureinfo_empty_redirect() {
    let mut map = demo_map();
    map.web
        .metadata
        .set("wms_feature_info_mime_type", "text/html");
    map.web.empty = Some("http://wms.test/empty.html".to_string());
    let backends = MockBackends::new(); // no features anywhere
    let mut entries = featureinfo_params();
    entries[11] = ("INFO_FORMAT", "text/html");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert_eq!(resp.location.as_deref(), Some("http://wms.test/empty.html"));
}

#[test]
fn test_featureinfo_unsupported_format() {
    let mut map = demo_map();
    let backends = MockBackends::with_demo_features();
    let mut entries = featureinfo_params();
    entries[11] = ("INFO_FORMAT", "application/x-whatever");
    let resp = response(dispatch(&mut map, &params(&entries), &backends.as_backends()));
    assert!(body_text(&resp).contains("Unsupported INFO_FORMAT value"));
}

// ============================================================================
// DescribeLayer / GetLegendGraphic / GetStyles
// ============================================================================

#[test]
fn test_describe_layer_ows_types() {
    let mut map = demo_map();
    map.web
        .metadata
        .set("wfs_onlineresource", "http://wms.test/wfs?");
    map.layers[1]
        .metadata
        .set("wcs_onlineresource", "http://wms.test/wcs?");
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "DescribeLayer"),
            ("LAYERS", "streets,relief"),
        ]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "text/xml");
    let body = body_text(&resp);
    assert!(body.contains("<WMS_DescribeLayerResponse version=\"1.1.1\" >"));
    assert!(body.contains("owsType=\"WFS\""));
    assert!(body.contains("owsType=\"WCS\""));
}

#[test]
fn test_describe_layer_without_ows_resources() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "DescribeLayer"),
            ("LAYERS", "streets"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("<LayerDescription name=\"streets\"></LayerDescription>"));
}

#[test]
fn test_legend_graphic_whole_layer() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetLegendGraphic"),
            ("LAYER", "streets"),
            ("FORMAT", "image/png"),
        ]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "image/png");
    assert_eq!(map.layers[0].status, LayerStatus::On);
    assert_eq!(map.layers[1].status, LayerStatus::Off);
}

#[test]
fn test_legend_graphic_requires_layer() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetLegendGraphic"),
            ("FORMAT", "image/png"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("code=\"LayerNotDefined\""));
}

#[test]
fn test_legend_graphic_svg_format_rejected() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetLegendGraphic"),
            ("LAYER", "streets"),
            ("FORMAT", "image/svg+xml"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("code=\"InvalidFormat\""));
}

#[test]
fn test_legend_graphic_rule_and_style() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetLegendGraphic"),
            ("LAYER", "streets"),
            ("FORMAT", "image/png"),
            ("STYLE", "main"),
            ("RULE", "major"),
        ]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "image/png");
    assert_eq!(map.layers[0].classgroup.as_deref(), Some("main"));
}

#[test]
fn test_legend_graphic_rule_outside_style_group() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetLegendGraphic"),
            ("LAYER", "streets"),
            ("FORMAT", "image/png"),
            ("STYLE", "main"),
            ("RULE", "minor"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("code=\"InvalidRule\""));
}

#[test]
fn test_get_styles() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetStyles"),
            ("LAYERS", "streets"),
        ]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "application/vnd.ogc.sld+xml");
    let body = body_text(&resp);
    assert!(body.contains("<StyledLayerDescriptor"));
    assert!(body.contains("<Name>streets</Name>"));
}

#[test]
fn test_get_styles_unknown_layer() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetStyles"),
            ("LAYERS", "nothere"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("code=\"LayerNotDefined\""));
}

#[test]
fn test_get_context_disabled() {
    let mut map = demo_map();
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetContext"),
        ]),
        &backends.as_backends(),
    ));
    assert!(body_text(&resp).contains("GetContext not enabled on this server."));
}

#[test]
fn test_get_context_enabled() {
    let mut map = demo_map();
    map.web.metadata.set("wms_getcontext_enabled", "1");
    let backends = MockBackends::new();
    let resp = response(dispatch(
        &mut map,
        &params(&[
            ("SERVICE", "WMS"),
            ("VERSION", "1.1.1"),
            ("REQUEST", "GetContext"),
        ]),
        &backends.as_backends(),
    ));
    assert_eq!(resp.content_type, "text/xml");
    let body = body_text(&resp);
    assert!(body.contains("<ViewContext version=\"1.1.0\""));
    assert!(body.contains("<Name>streets</Name>"));
}
