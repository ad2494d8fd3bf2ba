//! GetMap parameter binding.
//!
//! Parses the shared GetMap/GetFeatureInfo/DescribeLayer parameters and
//! mutates the request's map copy to reflect them: layer statuses and draw
//! order, style class-groups, the requested SRS, extent, image size, output
//! format and time filters. Validation runs after the scan so errors about
//! cross-parameter consistency see the full request.

use tracing::debug;

use map_config::{Color, LayerStatus, MapConfig, Projection, Units};

use crate::contracts::Backends;
use crate::error::WmsError;
use crate::params::RequestParams;
use crate::time::apply_time;
use crate::version::WmsVersion;

/// Which operation the bound parameters will feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    GetMap,
    GetFeatureInfo,
    DescribeLayer,
}

/// Bind the request parameters onto the map copy.
///
/// On error the map may be partially mutated; the caller owns a per-request
/// copy, so that is fine.
pub fn bind_map_request(
    map: &mut MapConfig,
    _version: WmsVersion,
    params: &RequestParams,
    backends: &Backends<'_>,
    kind: BindKind,
) -> Result<(), WmsError> {
    // SLD is applied before anything else so that layers it inserts are
    // visible to the LAYERS scan below.
    for (name, value) in params.iter() {
        if value.is_empty() {
            continue;
        }
        if name.eq_ignore_ascii_case("SLD") {
            backends.sld.apply_sld_url(map, value)?;
        } else if name.eq_ignore_ascii_case("SLD_BODY") {
            backends.sld.apply_sld_body(map, value)?;
        }
    }

    let mut layer_tokens: Vec<String> = Vec::new();
    let mut valid_layers = 0usize;
    let mut invalid_layers = 0usize;
    let mut styles: Option<String> = None;
    let mut srs_definition = String::new();
    let mut epsg_token = String::new();
    let mut srs_found = false;
    let mut bbox_found = false;
    let mut adjust_extent = false;
    let mut width_found = false;
    let mut height_found = false;
    let mut requested_width: i64 = map.width as i64;
    let mut requested_height: i64 = map.height as i64;
    let mut format_found = false;
    let mut format = None;
    let mut transparent: Option<bool> = None;
    let mut time_value: Option<String> = None;
    let mut time_requested = false;

    for (name, value) in params.iter() {
        if name.eq_ignore_ascii_case("LAYERS") {
            let tokens: Vec<String> = value
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                return Err(WmsError::Other(
                    "At least one layer name required in LAYERS.".to_string(),
                ));
            }
            let (valid, invalid) = select_layers(map, &tokens);
            valid_layers = valid;
            invalid_layers = invalid;
            layer_tokens = tokens;
        } else if name.eq_ignore_ascii_case("STYLES") {
            styles = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("SRS") {
            srs_found = true;
            if let Some(code) = strip_prefix_ignore_case(value, "EPSG:") {
                srs_definition = format!("init=epsg:{}", code);
                epsg_token = format!("EPSG:{}", code);
            } else if strip_prefix_ignore_case(value, "AUTO:").is_some() {
                srs_definition = value.to_string();
            } else {
                return Err(WmsError::InvalidSrs(
                    "Unsupported SRS namespace (only EPSG and AUTO currently supported)."
                        .to_string(),
                ));
            }
        } else if name.eq_ignore_ascii_case("BBOX") {
            bbox_found = true;
            let coords: Vec<f64> = value
                .split(',')
                .map(|t| t.trim().parse::<f64>().unwrap_or(0.0))
                .collect();
            if value.split(',').count() != 4 {
                return Err(WmsError::Other(
                    "Wrong number of arguments for BBOX.".to_string(),
                ));
            }
            map.extent.min_x = coords[0];
            map.extent.min_y = coords[1];
            map.extent.max_x = coords[2];
            map.extent.max_y = coords[3];
            if map.extent.min_x >= map.extent.max_x || map.extent.min_y >= map.extent.max_y {
                return Err(WmsError::Other("Invalid values for BBOX.".to_string()));
            }
            adjust_extent = true;
        } else if name.eq_ignore_ascii_case("WIDTH") {
            width_found = true;
            requested_width = value.trim().parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("HEIGHT") {
            height_found = true;
            requested_height = value.trim().parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("FORMAT") {
            format_found = true;
            let selected = map.select_output_format(value);
            match selected {
                Some(f) if f.is_wms_capable() => {
                    map.imagetype = value.to_string();
                    format = Some(f);
                }
                _ => {
                    return Err(WmsError::InvalidFormat(format!(
                        "Unsupported output format ({}).",
                        value
                    )))
                }
            }
        } else if name.eq_ignore_ascii_case("TRANSPARENT") {
            transparent = Some(value.eq_ignore_ascii_case("TRUE"));
        } else if name.eq_ignore_ascii_case("BGCOLOR") {
            map.image_color = Color::from_hex(value).unwrap_or(Color::new(0, 0, 0));
        } else if name.eq_ignore_ascii_case("TIME") {
            // the value may be empty; defaults are resolved per layer
            time_value = Some(value.to_string());
            time_requested = true;
        }
    }

    // Selected layers with a default time are filtered even without a TIME
    // parameter in the request.
    if !time_requested {
        time_requested = map.layers.iter().any(|lp| {
            (lp.status == LayerStatus::On || lp.status == LayerStatus::Default)
                && lp.metadata.ows_lookup("MO", "timedefault").is_some()
        });
    }
    if time_requested {
        apply_time(map, time_value.as_deref())?;
    }

    if let Some(format) = format {
        map.apply_output_format(format, transparent);
    }

    if valid_layers == 0 || invalid_layers > 0 {
        return Err(WmsError::LayerNotDefined(
            "Invalid layer(s) given in the LAYERS parameter.".to_string(),
        ));
    }

    // When the requested SRS is valid for some but not all selected layers
    // the request must fail with InvalidSRS. The map-wide EPSG list short
    // circuits the per-layer scan.
    if !epsg_token.is_empty() {
        let map_codes = map_config::epsg_list(&map.projection, &map.web.metadata);
        let mut epsg_valid = list_contains(map_codes.as_deref(), &epsg_token);
        if !epsg_valid {
            for layer in &map.layers {
                if layer.status != LayerStatus::On {
                    continue;
                }
                let codes = map_config::epsg_list(&layer.projection, &layer.metadata);
                epsg_valid = list_contains(codes.as_deref(), &epsg_token);
                if !epsg_valid {
                    return Err(WmsError::InvalidSrs(
                        "Invalid SRS given : SRS must be valid for all requested layers."
                            .to_string(),
                    ));
                }
            }
        }
    }

    if requested_width < 1
        || requested_height < 1
        || requested_width > map.max_size as i64
        || requested_height > map.max_size as i64
    {
        // restore drawable defaults in case the exception goes out in-image
        map.width = 400;
        map.height = 300;
        return Err(WmsError::Other(format!(
            "Image size out of range, WIDTH and HEIGHT must be between 1 and {} pixels.",
            map.max_size
        )));
    }
    map.width = requested_width as u32;
    map.height = requested_height as u32;

    // Non-square pixel detection: up to one pixel of height error is
    // tolerated before the renderer is switched out of square-pixel mode.
    let mut nonsquare_enabled = map.config_option_enabled("MS_NONSQUARE");
    if !nonsquare_enabled {
        let dx = map.extent.width().abs();
        let dy = map.extent.height().abs();
        if dx > 0.0 {
            let required_height = map.width as f64 * dy / dx;
            if (required_height - map.height as f64).abs() > 1.0 {
                debug!(map = %map.name, "enabling non-square pixels");
                map.set_config_option("MS_NONSQUARE", "YES");
                nonsquare_enabled = true;
            }
        }
    }

    // If the request switches projections, or non-square mode kicked in,
    // layers that rely on the implicit map projection need an explicit copy
    // of it before the map projection is replaced.
    if !srs_definition.is_empty() || nonsquare_enabled {
        if !map.projection.is_set() {
            return Err(WmsError::InvalidSrs(
                "Cannot set new SRS on a map that doesn't have any projection set. Please make \
                 sure your map configuration has a projection defined at the top level."
                    .to_string(),
            ));
        }

        let new_projection = if srs_definition.is_empty() {
            Projection::empty()
        } else {
            Projection::from_definition(&srs_definition)?
        };

        if nonsquare_enabled || map.projection.differs_from(&new_projection) {
            let original = map.projection.definition();
            if let Some(original) = original {
                for layer in map.layers.iter_mut() {
                    if !layer.projection.is_set()
                        && layer.status != LayerStatus::Off
                        && layer.transform
                    {
                        layer.projection.load(&original)?;
                        layer.project = true;
                    }
                }
            }
        }
    }

    // Only now, with every layer validated, load the request SRS.
    if !srs_definition.is_empty() {
        map.projection.load(&srs_definition)?;
        map.units = if map.projection.is_geographic() {
            Units::DecimalDegrees
        } else {
            Units::Meters
        };
    }

    if let Some(styles) = styles.filter(|s| !s.is_empty()) {
        bind_styles(map, &styles, &layer_tokens)?;
    }

    // WMS extents are edge to edge while the renderer works center of pixel
    // to center of pixel; pull the requested extent in by half a pixel on
    // each side, in terms of the final width/height.
    if adjust_extent {
        let dx = map.extent.width() / map.width as f64;
        map.extent.min_x += dx * 0.5;
        map.extent.max_x -= dx * 0.5;
        let dy = map.extent.height() / map.height as f64;
        map.extent.min_y += dy * 0.5;
        map.extent.max_y -= dy * 0.5;
    }

    if kind != BindKind::DescribeLayer {
        if !srs_found {
            return Err(WmsError::MissingParameter(
                "Missing required parameter SRS".to_string(),
            ));
        }
        if !bbox_found {
            return Err(WmsError::MissingParameter(
                "Missing required parameter BBOX".to_string(),
            ));
        }
        if !format_found && kind == BindKind::GetMap {
            return Err(WmsError::MissingParameter(
                "Missing required parameter FORMAT".to_string(),
            ));
        }
        if !width_found {
            return Err(WmsError::MissingParameter(
                "Missing required parameter WIDTH".to_string(),
            ));
        }
        if !height_found {
            return Err(WmsError::MissingParameter(
                "Missing required parameter HEIGHT".to_string(),
            ));
        }
    }

    Ok(())
}

/// Rewrite layer statuses and the draw order from the LAYERS tokens.
///
/// DEFAULT layers come first in source order, requested layers follow in
/// request order, and everything still OFF trails in source order, so the
/// draw order stays a permutation of the layer indices. A token may name a
/// layer, the map itself (every layer), or a group.
///
/// Returns `(valid, invalid)` token counts.
fn select_layers(map: &mut MapConfig, tokens: &[String]) -> (usize, usize) {
    let mut order: Vec<usize> = Vec::with_capacity(map.layers.len());
    let mut valid = 0usize;
    let mut invalid = 0usize;

    for (j, layer) in map.layers.iter_mut().enumerate() {
        if layer.status != LayerStatus::Default {
            layer.status = LayerStatus::Off;
        } else {
            order.push(j);
        }
    }

    for token in tokens {
        let mut found = false;
        for j in 0..map.layers.len() {
            let matches = map.layers[j].name.eq_ignore_ascii_case(token)
                || map.name.eq_ignore_ascii_case(token)
                || map.layers[j]
                    .group
                    .as_deref()
                    .is_some_and(|g| g.eq_ignore_ascii_case(token));
            if matches {
                if map.layers[j].status == LayerStatus::Off {
                    order.push(j);
                    map.layers[j].status = LayerStatus::On;
                }
                valid += 1;
                found = true;
            }
        }
        if !found {
            invalid += 1;
        }
    }

    for (j, layer) in map.layers.iter().enumerate() {
        if layer.status == LayerStatus::Off {
            order.push(j);
        }
    }

    map.layer_order = order;
    (valid, invalid)
}

/// Bind STYLES tokens onto their positional layers' class groups.
///
/// Only named class groups are advertised as styles; empty tokens and
/// `default` leave the layer untouched.
fn bind_styles(
    map: &mut MapConfig,
    styles: &str,
    layer_tokens: &[String],
) -> Result<(), WmsError> {
    let tokens: Vec<&str> = styles.split(',').collect();

    for (i, token) in tokens.iter().enumerate() {
        let token = token.trim();
        if token.is_empty() || token.eq_ignore_ascii_case("default") {
            continue;
        }
        if layer_tokens.len() != tokens.len() {
            return Err(WmsError::StyleNotDefined(format!(
                "Invalid style ({}). This server expects an empty STYLES value (STYLES= or \
                 STYLES=,,,) or the keyword default (STYLES=default,default,...), with one entry \
                 per requested layer.",
                styles
            )));
        }
        let wanted = &layer_tokens[i];
        for j in 0..map.layers.len() {
            let matches = map.layers[j].name.eq_ignore_ascii_case(wanted)
                || map.name.eq_ignore_ascii_case(wanted)
                || map.layers[j]
                    .group
                    .as_deref()
                    .is_some_and(|g| g.eq_ignore_ascii_case(wanted));
            if !matches {
                continue;
            }
            let has_group = map.layers[j]
                .classes
                .iter()
                .any(|c| c.group.as_deref().is_some_and(|g| g.eq_ignore_ascii_case(token)));
            if !has_group {
                return Err(WmsError::StyleNotDefined(format!(
                    "Style ({}) not defined on layer.",
                    token
                )));
            }
            map.layers[j].classgroup = Some(token.to_string());
        }
    }
    Ok(())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn list_contains(list: Option<&str>, token: &str) -> bool {
    list.is_some_and(|l| {
        l.split_whitespace()
            .any(|code| code.eq_ignore_ascii_case(token))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_config::Layer;

    fn map_with_layers(names: &[&str]) -> MapConfig {
        let mut map = MapConfig::new("demo");
        for name in names {
            map.push_layer(Layer::named(name));
        }
        map
    }

    #[test]
    fn test_select_layers_order_and_status() {
        let mut map = map_with_layers(&["a", "b", "c"]);
        map.layers[2].status = LayerStatus::Default;
        let (valid, invalid) =
            select_layers(&mut map, &["b".to_string(), "a".to_string()]);
        assert_eq!((valid, invalid), (2, 0));
        assert_eq!(map.layer_order, vec![2, 1, 0]);
        assert_eq!(map.layers[0].status, LayerStatus::On);
        assert_eq!(map.layers[1].status, LayerStatus::On);
        assert_eq!(map.layers[2].status, LayerStatus::Default);
        assert!(map.layer_order_is_permutation());
    }

    #[test]
    fn test_select_layers_group_match() {
        let mut map = map_with_layers(&["a", "b", "c"]);
        map.layers[0].group = Some("base".to_string());
        map.layers[2].group = Some("base".to_string());
        let (valid, invalid) = select_layers(&mut map, &["base".to_string()]);
        assert_eq!((valid, invalid), (2, 0));
        assert_eq!(map.layers[0].status, LayerStatus::On);
        assert_eq!(map.layers[1].status, LayerStatus::Off);
        assert_eq!(map.layers[2].status, LayerStatus::On);
        assert_eq!(map.layer_order, vec![0, 2, 1]);
    }

    #[test]
    fn test_select_layers_duplicate_token_keeps_permutation() {
        let mut map = map_with_layers(&["a", "b"]);
        let (valid, invalid) =
            select_layers(&mut map, &["a".to_string(), "a".to_string()]);
        assert_eq!((valid, invalid), (2, 0));
        assert!(map.layer_order_is_permutation());
    }

    #[test]
    fn test_select_layers_unknown_token() {
        let mut map = map_with_layers(&["a"]);
        let (_, invalid) = select_layers(&mut map, &["nope".to_string()]);
        assert_eq!(invalid, 1);
    }
}
