//! GetStyles.

use map_config::{LayerStatus, MapConfig};

use crate::contracts::Backends;
use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;

/// Serve a GetStyles request: an SLD document for the named layers.
pub fn get_styles(
    map: &mut MapConfig,
    params: &RequestParams,
    backends: &Backends<'_>,
) -> Result<WmsResponse, WmsError> {
    let mut valid_layer = false;

    for (name, value) in params.iter() {
        if !name.eq_ignore_ascii_case("LAYERS") {
            continue;
        }
        let tokens: Vec<&str> = value.split(',').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Err(WmsError::Other(
                "At least one layer name required in LAYERS.".to_string(),
            ));
        }
        for layer in map.layers.iter_mut() {
            layer.status = LayerStatus::Off;
        }
        for token in tokens {
            for layer in map.layers.iter_mut() {
                if layer.name.eq_ignore_ascii_case(token) {
                    layer.status = LayerStatus::On;
                    valid_layer = true;
                }
            }
        }
    }

    if !valid_layer {
        return Err(WmsError::LayerNotDefined(
            "Invalid layer(s) given in the LAYERS parameter.".to_string(),
        ));
    }

    let mut sld = backends.sld.generate_sld(map)?;
    sld.push('\n');
    Ok(WmsResponse::new("application/vnd.ogc.sld+xml", sld.into_bytes()))
}
