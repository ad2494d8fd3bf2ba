//! DescribeLayer.

use map_config::{ConnectionKind, LayerType, MapConfig};

use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::xml::{encode_html_entities, schemas_location, xml_prolog};

/// Serve a DescribeLayer request.
///
/// Every named layer is described by its companion OWS service: WFS for
/// vector layers, WCS for local raster layers, nothing when neither
/// `wfs_onlineresource` nor `wcs_onlineresource` is configured. Layer-level
/// metadata overrides the map level.
pub fn describe_layer(
    map: &MapConfig,
    params: &RequestParams,
) -> Result<WmsResponse, WmsError> {
    let layers: Vec<&str> = params
        .get("LAYERS")
        .map(|v| v.split(',').collect())
        .unwrap_or_default();
    let version = params.get("VERSION").unwrap_or("");

    let map_wfs = map
        .web
        .metadata
        .ows_lookup("F", "onlineresource")
        .filter(|v| !v.is_empty());
    let map_wcs = map
        .web
        .metadata
        .ows_lookup("C", "onlineresource")
        .filter(|v| !v.is_empty());

    let mut out = xml_prolog(&map.web.metadata);
    out.push_str(&format!(
        "<!DOCTYPE WMS_DescribeLayerResponse SYSTEM \
         \"{}/wms/1.1.1/WMS_DescribeLayerResponse.dtd\">\n",
        encode_html_entities(&schemas_location(map))
    ));
    out.push_str(&format!(
        "<WMS_DescribeLayerResponse version=\"{}\" >\n",
        encode_html_entities(version)
    ));

    for token in layers {
        let Some(lp) = map
            .layers
            .iter()
            .find(|lp| lp.name.eq_ignore_ascii_case(token))
        else {
            continue;
        };

        let wfs = lp
            .metadata
            .ows_lookup("F", "onlineresource")
            .filter(|v| !v.is_empty())
            .or(map_wfs);
        let wcs = lp
            .metadata
            .ows_lookup("C", "onlineresource")
            .filter(|v| !v.is_empty())
            .or(map_wcs);

        let name = encode_html_entities(&lp.name);
        if let (Some(wfs), true) = (wfs, lp.kind.is_vector()) {
            let href = encode_html_entities(wfs);
            out.push_str(&format!(
                "<LayerDescription name=\"{}\" wfs=\"{}\" owsType=\"WFS\" owsURL=\"{}\">\n",
                name, href, href
            ));
            out.push_str(&format!("<Query typeName=\"{}\" />\n", name));
            out.push_str("</LayerDescription>\n");
        } else if let (Some(wcs), LayerType::Raster) = (wcs, lp.kind) {
            if lp.connection_kind != ConnectionKind::Wms {
                let href = encode_html_entities(wcs);
                out.push_str(&format!(
                    "<LayerDescription name=\"{}\"  owsType=\"WCS\" owsURL=\"{}\">\n",
                    name, href
                ));
                out.push_str(&format!("<Query typeName=\"{}\" />\n", name));
                out.push_str("</LayerDescription>\n");
            } else {
                out.push_str(&format!(
                    "<LayerDescription name=\"{}\"></LayerDescription>\n",
                    name
                ));
            }
        } else {
            out.push_str(&format!(
                "<LayerDescription name=\"{}\"></LayerDescription>\n",
                name
            ));
        }
    }

    out.push_str("</WMS_DescribeLayerResponse>\n");
    Ok(WmsResponse::xml("text/xml", out))
}
