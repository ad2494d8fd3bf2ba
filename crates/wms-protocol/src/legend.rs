//! GetLegendGraphic.

use map_config::{LayerStatus, MapConfig};

use crate::contracts::Backends;
use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::version::WmsVersion;

/// Serve a GetLegendGraphic request.
///
/// Without RULE the whole legend for the target layer is drawn (optionally
/// at a synthesized extent when SCALE is given); with RULE a single class
/// key icon is produced.
pub fn get_legend_graphic(
    map: &mut MapConfig,
    _version: WmsVersion,
    params: &RequestParams,
    backends: &Backends<'_>,
) -> Result<WmsResponse, WmsError> {
    let mut layer_name = None;
    let mut format_name = None;
    let mut rule = None;
    let mut scale = None;
    let mut style = None;
    let mut width: i64 = -1;
    let mut height: i64 = -1;

    for (name, value) in params.iter() {
        if name.eq_ignore_ascii_case("LAYER") {
            layer_name = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("WIDTH") {
            width = value.trim().parse().unwrap_or(-1);
        } else if name.eq_ignore_ascii_case("HEIGHT") {
            height = value.trim().parse().unwrap_or(-1);
        } else if name.eq_ignore_ascii_case("FORMAT") {
            format_name = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("SLD") && !value.is_empty() {
            backends.sld.apply_sld_url(map, value)?;
        } else if name.eq_ignore_ascii_case("SLD_BODY") && !value.is_empty() {
            backends.sld.apply_sld_body(map, value)?;
        } else if name.eq_ignore_ascii_case("RULE") {
            rule = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("SCALE") {
            scale = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("STYLE") {
            style = Some(value.to_string());
        }
    }

    let Some(layer_name) = layer_name else {
        return Err(WmsError::LayerNotDefined(
            "Mandatory LAYER parameter missing in GetLegendGraphic request.".to_string(),
        ));
    };
    let Some(format_name) = format_name else {
        return Err(WmsError::InvalidFormat(
            "Mandatory FORMAT parameter missing in GetLegendGraphic request.".to_string(),
        ));
    };

    // group names are not accepted here, only plain layer names
    let Some(layer_index) = map
        .layers
        .iter()
        .position(|lp| lp.name.eq_ignore_ascii_case(&layer_name))
    else {
        return Err(WmsError::LayerNotDefined(
            "Invalid layer given in the LAYER parameter.".to_string(),
        ));
    };

    // legends render through the raster backends only
    let format = map.select_output_format(&format_name);
    let format = match format {
        Some(f) if f.is_raster_capable() => f,
        _ => {
            return Err(WmsError::InvalidFormat(format!(
                "Unsupported output format ({}).",
                format_name
            )))
        }
    };
    map.apply_output_format(format, None);

    if let Some(style) = style.filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("default")) {
        let has_group = map.layers[layer_index]
            .classes
            .iter()
            .any(|c| c.group.as_deref().is_some_and(|g| g.eq_ignore_ascii_case(&style)));
        if !has_group {
            return Err(WmsError::StyleNotDefined(
                "style used in the STYLE parameter is not defined on the layer.".to_string(),
            ));
        }
        map.layers[layer_index].classgroup = Some(style);
    }

    let image = match rule {
        None => {
            // whole-layer legend: this layer on, everything else off
            for (i, layer) in map.layers.iter_mut().enumerate() {
                layer.status = if i == layer_index {
                    LayerStatus::On
                } else {
                    LayerStatus::Off
                };
            }

            match scale.and_then(|s| s.trim().parse::<f64>().ok()) {
                Some(scale) => {
                    // synthesize a square extent that produces the wanted
                    // scale denominator at a default 600x600 canvas
                    map.width = 600;
                    map.height = 600;
                    let cellsize = (scale / map.resolution) / map.units.inches_per_unit();
                    map.extent.min_x = 0.0 - cellsize * map.width as f64 / 2.0;
                    map.extent.min_y = 0.0 - cellsize * map.height as f64 / 2.0;
                    map.extent.max_x = 0.0 + cellsize * map.width as f64 / 2.0;
                    map.extent.max_y = 0.0 + cellsize * map.height as f64 / 2.0;
                    backends.renderer.render_legend(map, false)?
                }
                None => backends.renderer.render_legend(map, true)?,
            }
        }
        Some(rule) => {
            let classgroup = map.layers[layer_index].classgroup.clone();
            let class_index = map.layers[layer_index].classes.iter().position(|c| {
                if let Some(group) = &classgroup {
                    if !c
                        .group
                        .as_deref()
                        .is_some_and(|g| g.eq_ignore_ascii_case(group))
                    {
                        return false;
                    }
                }
                c.name
                    .as_deref()
                    .is_some_and(|n| !n.is_empty() && n.eq_ignore_ascii_case(&rule))
            });

            let Some(class_index) = class_index else {
                return Err(WmsError::InvalidRule(format!("Unavailable RULE ({}).", rule)));
            };

            if width < 0 {
                width = if map.legend.key_size_x > 0 {
                    map.legend.key_size_x as i64
                } else {
                    20
                };
            }
            if height < 0 {
                height = if map.legend.key_size_y > 0 {
                    map.legend.key_size_y as i64
                } else {
                    20
                };
            }

            backends
                .renderer
                .render_legend_icon(map, layer_index, class_index, width as u32, height as u32)
                .map_err(|e| WmsError::InvalidRule(format!("Unavailable RULE ({}): {}", rule, e)))?
        }
    };

    Ok(WmsResponse::new(image.mimetype, image.bytes))
}
