//! GetFeatureInfo.

use map_config::{LayerStatus, MapConfig, Units};

use crate::contracts::{Backends, QueryMode, QueryOutcome};
use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::version::WmsVersion;

/// Serve a GetFeatureInfo request over an already-bound map copy.
pub fn get_feature_info(
    map: &mut MapConfig,
    version: WmsVersion,
    params: &RequestParams,
    backends: &Backends<'_>,
) -> Result<WmsResponse, WmsError> {
    let custom_mime = map
        .web
        .metadata
        .ows_lookup("MO", "feature_info_mime_type")
        .map(str::to_string);

    let mut query_layers_given = false;
    let mut layers_found = 0usize;
    let mut info_format = "MIME".to_string();
    let mut feature_count: i64 = 1;
    let mut point = (-1.0_f64, -1.0_f64);

    for (name, value) in params.iter() {
        if name.eq_ignore_ascii_case("QUERY_LAYERS") {
            query_layers_given = true;
            let tokens: Vec<&str> = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.is_empty() {
                return Err(WmsError::LayerNotDefined(
                    "At least one layer name required in QUERY_LAYERS.".to_string(),
                ));
            }
            for j in 0..map.layers.len() {
                map.layers[j].status = LayerStatus::Off;
                for token in &tokens {
                    let matches = map.layers[j].name.eq_ignore_ascii_case(token)
                        || map.name.eq_ignore_ascii_case(token)
                        || map.layers[j]
                            .group
                            .as_deref()
                            .is_some_and(|g| g.eq_ignore_ascii_case(token));
                    if matches {
                        map.layers[j].status = LayerStatus::On;
                        layers_found += 1;
                    }
                }
            }
        } else if name.eq_ignore_ascii_case("INFO_FORMAT") {
            info_format = value.to_string();
        } else if name.eq_ignore_ascii_case("FEATURE_COUNT") {
            feature_count = value.trim().parse().unwrap_or(1);
        } else if name.eq_ignore_ascii_case("X") {
            point.0 = value.trim().parse().unwrap_or(-1.0);
        } else if name.eq_ignore_ascii_case("Y") {
            point.1 = value.trim().parse().unwrap_or(-1.0);
        } else if name.eq_ignore_ascii_case("RADIUS") {
            // vendor extension: a pixel tolerance applied to every layer
            let radius: f64 = value.trim().parse().unwrap_or(0.0);
            for layer in map.layers.iter_mut() {
                layer.tolerance = radius;
                layer.tolerance_units = Units::Pixels;
            }
        }
    }

    if layers_found == 0 {
        if query_layers_given {
            return Err(WmsError::LayerNotDefined(
                "Layer(s) specified in QUERY_LAYERS parameter is not offered by the service \
                 instance."
                    .to_string(),
            ));
        }
        return Err(WmsError::LayerNotDefined(
            "Required QUERY_LAYERS parameter missing for getFeatureInfo.".to_string(),
        ));
    }

    for layer in &map.layers {
        if layer.status == LayerStatus::On && !layer.is_queryable() {
            return Err(WmsError::LayerNotQueryable(
                "Requested layer(s) are not queryable.".to_string(),
            ));
        }
    }

    if point.0 == -1.0 || point.1 == -1.0 {
        return Err(WmsError::Other(
            "Required X/Y parameters missing for getFeatureInfo.".to_string(),
        ));
    }

    // pixel to map coordinates; the incoming extent is taken as-is and y
    // runs top-down in image space
    let cell_x = map.extent.width() / map.width as f64;
    let cell_y = map.extent.height() / map.height as f64;
    let map_point = (
        map.extent.min_x + cell_x * point.0,
        map.extent.max_y - cell_y * point.1,
    );

    // feature count is per layer, minimum one
    if feature_count < 1 {
        feature_count = 1;
    }
    let mode = if feature_count == 1 {
        QueryMode::Single
    } else {
        QueryMode::Multiple
    };

    let outcome = backends
        .query
        .query_by_point(map, mode, map_point, 0.0, feature_count as u32)?;

    if info_format.eq_ignore_ascii_case("MIME") || info_format.eq_ignore_ascii_case("text/plain") {
        let mut body = String::from("GetFeatureInfo results:\n");
        let results = dump_results(map, backends, &mut body)?;
        if results == 0 {
            body.push_str("\n  Search returned no results.\n");
        }
        Ok(WmsResponse::new("text/plain", body.into_bytes()))
    } else if info_format
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("GML"))
        || info_format.eq_ignore_ascii_case("application/vnd.ogc.gml")
    {
        let mimetype = if version <= WmsVersion::V1_0_7 {
            "text/xml"
        } else {
            "application/vnd.ogc.gml"
        };
        let mut body = Vec::new();
        backends.gml.write_query(map, &mut body)?;
        Ok(WmsResponse::new(mimetype, body))
    } else if custom_mime.as_deref() == Some(info_format.as_str()) {
        if outcome == QueryOutcome::NotFound {
            if let Some(empty) = map.web.empty.clone() {
                return Ok(WmsResponse::redirect(empty));
            }
        }
        let translated = translate_to_template_params(params);
        let body = backends
            .query
            .render_template_query(map, &translated, &info_format)?;
        Ok(WmsResponse::new(info_format, body))
    } else {
        Err(WmsError::Other(format!(
            "Unsupported INFO_FORMAT value ({}).",
            info_format
        )))
    }
}

/// Plain-text dump of every ON layer's result cache.
///
/// The `wms_include_items` / `wms_exclude_items` metadata filters attribute
/// output: include is a comma list or the keyword `all`; excludes are
/// applied after includes. Returns the number of features written.
fn dump_results(
    map: &mut MapConfig,
    backends: &Backends<'_>,
    out: &mut String,
) -> Result<usize, WmsError> {
    let mut total = 0usize;

    for i in 0..map.layers.len() {
        let has_results = map.layers[i]
            .result_cache
            .as_ref()
            .is_some_and(|c| !c.results.is_empty());
        if map.layers[i].status != LayerStatus::On || !has_results {
            continue;
        }

        backends.query.open_layer(&mut map.layers[i])?;

        let include: Option<Vec<String>> = map.layers[i]
            .metadata
            .ows_lookup("MO", "include_items")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect());
        let exclude: Vec<String> = map.layers[i]
            .metadata
            .ows_lookup("MO", "exclude_items")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let visible: Vec<bool> = map.layers[i]
            .items
            .iter()
            .map(|item| {
                // no include list means everything; "all" is explicit
                let mut keep = match &include {
                    None => true,
                    Some(list) if list.len() == 1 && list[0].eq_ignore_ascii_case("all") => true,
                    Some(list) => list.iter().any(|inc| inc.eq_ignore_ascii_case(item)),
                };
                if exclude.iter().any(|exc| exc.eq_ignore_ascii_case(item)) {
                    keep = false;
                }
                keep
            })
            .collect();

        out.push_str(&format!("\nLayer '{}'\n", map.layers[i].name));

        let members = map.layers[i]
            .result_cache
            .as_ref()
            .map(|c| c.results.clone())
            .unwrap_or_default();
        for member in &members {
            let shape = backends.query.shape(&map.layers[i], member)?;
            out.push_str(&format!("  Feature {}: \n", member.shape_index));
            for (k, item) in map.layers[i].items.iter().enumerate() {
                if visible.get(k).copied().unwrap_or(false) {
                    let value = shape.values.get(k).map(String::as_str).unwrap_or("");
                    out.push_str(&format!("    {} = '{}'\n", item, value));
                }
            }
            total += 1;
        }

        backends.query.close_layer(&mut map.layers[i]);
    }

    Ok(total)
}

/// Translate WMS parameters into the template engine's vocabulary.
///
/// X/Y become `img.x`/`img.y`, LAYERS and QUERY_LAYERS fan out into
/// repeated `layer`/`qlayer` entries, and BBOX becomes a space-separated
/// `imgext`.
fn translate_to_template_params(params: &RequestParams) -> RequestParams {
    let mut translated: RequestParams = params.iter().collect();
    for (name, value) in params.iter() {
        if name.eq_ignore_ascii_case("X") {
            translated.push("img.x", value);
        } else if name.eq_ignore_ascii_case("Y") {
            translated.push("img.y", value);
        } else if name.eq_ignore_ascii_case("LAYERS") {
            for token in value.split(',') {
                translated.push("layer", token);
            }
        } else if name.eq_ignore_ascii_case("QUERY_LAYERS") {
            for token in value.split(',') {
                translated.push("qlayer", token);
            }
        } else if name.eq_ignore_ascii_case("BBOX") {
            translated.push("imgext", value.replace(',', " "));
        }
    }
    translated
}
