//! GetMap.

use map_config::{MapConfig, QueryMapStyle};

use crate::contracts::{Backends, RenderMode};
use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::version::WmsVersion;

/// Serve a GetMap request over an already-bound map copy.
///
/// SLD documents can carry spatial filters; applying them tags the affected
/// layers with transient `tmp_wms_sld_query` metadata, and those layers are
/// then drawn from their query result caches instead of a full draw.
pub fn get_map(
    map: &mut MapConfig,
    _version: WmsVersion,
    params: &RequestParams,
    backends: &Backends<'_>,
) -> Result<WmsResponse, WmsError> {
    let sld_requested =
        params.get_non_empty("SLD").is_some() || params.get_non_empty("SLD_BODY").is_some();

    let query_layers: Vec<usize> = if sld_requested {
        map.layers
            .iter()
            .enumerate()
            .filter(|(_, lp)| lp.metadata.contains_key("tmp_wms_sld_query"))
            .map(|(i, _)| i)
            .collect()
    } else {
        Vec::new()
    };

    let image = if !query_layers.is_empty() {
        // draw only the selected features for the filtered layers
        map.query_map.enabled = true;
        map.query_map.style = QueryMapStyle::Selected;
        let drawable: Vec<usize> = query_layers
            .into_iter()
            .filter(|&i| map.layers[i].kind.is_query_drawable())
            .collect();
        backends
            .renderer
            .render_map(map, RenderMode::SldQuery(&drawable))?
    } else {
        backends.renderer.render_map(map, RenderMode::Full)?
    };

    let mut response = WmsResponse::new(image.mimetype, image.bytes);
    if let Some(max_age) = map.web.metadata.ows_lookup("MO", "http_max_age") {
        response = response.with_cache_control(format!("max-age={}", max_age));
    }
    Ok(response)
}
