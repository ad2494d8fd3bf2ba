//! GetContext: a Web Map Context document for the current configuration.
//!
//! Not part of the WMS spec proper; disabled unless the map opts in with
//! `wms_getcontext_enabled`.

use map_config::{epsg_list, LayerStatus, MapConfig};

use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::version::WmsVersion;
use crate::xml::{encode_html_entities, online_resource, xml_prolog};

/// Serve a GetContext request.
pub fn get_context(
    map: &mut MapConfig,
    version: Option<WmsVersion>,
    _params: &RequestParams,
) -> Result<WmsResponse, WmsError> {
    // a requested VERSION is the Map Context version, not a WMS version
    if let Some(version) = version {
        map.web
            .metadata
            .set("wms_context_version", version.as_str());
    }

    let enabled = map
        .web
        .metadata
        .ows_lookup("MO", "getcontext_enabled")
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);
    if enabled == 0 {
        return Err(WmsError::Other(
            "GetContext not enabled on this server.".to_string(),
        ));
    }

    let srs = epsg_list(&map.projection, &map.web.metadata).unwrap_or_default();
    let first_srs = srs.split_whitespace().next().unwrap_or("").to_string();
    let script_url = encode_html_entities(&online_resource(map));
    let title = map
        .web
        .metadata
        .ows_lookup("MO", "title")
        .unwrap_or(&map.name);
    let title = encode_html_entities(title);

    let mut out = xml_prolog(&map.web.metadata);
    out.push_str(&format!(
        "<ViewContext version=\"1.1.0\" id=\"{}\" xmlns=\"http://www.opengis.net/context\" \
         xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n",
        encode_html_entities(&map.name)
    ));
    out.push_str("  <General>\n");
    out.push_str(&format!(
        "    <Window width=\"{}\" height=\"{}\"/>\n",
        map.width, map.height
    ));
    out.push_str(&format!(
        "    <BoundingBox SRS=\"{}\" minx=\"{}\" miny=\"{}\" maxx=\"{}\" maxy=\"{}\"/>\n",
        encode_html_entities(&first_srs),
        map.extent.min_x,
        map.extent.min_y,
        map.extent.max_x,
        map.extent.max_y
    ));
    out.push_str(&format!("    <Title>{}</Title>\n", title));
    out.push_str("  </General>\n");

    out.push_str("  <LayerList>\n");
    for lp in &map.layers {
        let hidden = if lp.status == LayerStatus::Off { 1 } else { 0 };
        let queryable = if lp.is_queryable() { 1 } else { 0 };
        out.push_str(&format!(
            "    <Layer queryable=\"{}\" hidden=\"{}\">\n",
            queryable, hidden
        ));
        out.push_str(&format!(
            "      <Server service=\"OGC:WMS\" version=\"1.1.1\" title=\"{}\">\n",
            title
        ));
        out.push_str(&format!(
            "        <OnlineResource xlink:type=\"simple\" xlink:href=\"{}\"/>\n",
            script_url
        ));
        out.push_str("      </Server>\n");
        out.push_str(&format!(
            "      <Name>{}</Name>\n",
            encode_html_entities(&lp.name)
        ));
        let layer_title = lp.metadata.ows_lookup("MO", "title").unwrap_or(&lp.name);
        out.push_str(&format!(
            "      <Title>{}</Title>\n",
            encode_html_entities(layer_title)
        ));
        if let Some(layer_srs) = epsg_list(&lp.projection, &lp.metadata).or_else(|| {
            if srs.is_empty() {
                None
            } else {
                Some(srs.clone())
            }
        }) {
            out.push_str(&format!(
                "      <SRS>{}</SRS>\n",
                encode_html_entities(&layer_srs)
            ));
        }
        out.push_str("      <FormatList>\n");
        out.push_str(&format!(
            "        <Format current=\"1\">{}</Format>\n",
            encode_html_entities(&map.output_format.mimetype)
        ));
        out.push_str("      </FormatList>\n");
        out.push_str("    </Layer>\n");
    }
    out.push_str("  </LayerList>\n");
    out.push_str("</ViewContext>\n");

    Ok(WmsResponse::xml("text/xml", out))
}
