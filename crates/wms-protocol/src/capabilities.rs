//! GetCapabilities emission.
//!
//! The capabilities document is assembled into a buffer so configuration
//! errors detected mid-build (conflicting grouping metadata, update-sequence
//! mismatches) can still surface as proper Service Exceptions. Element
//! shapes vary with the negotiated version: DOCTYPE URL, service name,
//! format advertisement, exception formats and SRS emission all key off it.

use map_config::{epsg_list, ConnectionKind, LayerStatus, MapConfig, MetadataTable, Projection,
                 Rect, Units};

use crate::contracts::Backends;
use crate::error::WmsError;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::version::WmsVersion;
use crate::xml::{
    encode_html_entities, is_valid_xml_name, online_resource, schemas_location,
    warn_missing_metadata, xml_prolog, DEFAULT_SCHEMAS_LOCATION,
};

/// Serve a GetCapabilities request.
pub fn get_capabilities(
    map: &mut MapConfig,
    version: WmsVersion,
    params: &RequestParams,
    backends: &Backends<'_>,
) -> Result<WmsResponse, WmsError> {
    let server_sequence = map
        .web
        .metadata
        .ows_lookup("MO", "updatesequence")
        .map(str::to_string);
    if let Some(requested) = params.get("UPDATESEQUENCE") {
        negotiate_update_sequence(requested, server_sequence.as_deref())?;
    }

    // grouping metadata conflicts abort before any output is produced
    let nested_groups = prepare_nested_groups(map)?;

    let schemas = encode_html_entities(&schemas_location(map));
    let dtd_url = dtd_url(version, &schemas, &schemas_location(map));
    let script_url = encode_html_entities(&online_resource(map));

    let mimetype = if version <= WmsVersion::V1_0_7 {
        "text/xml"
    } else {
        "application/vnd.ogc.wms_xml"
    };

    let mut out = xml_prolog(&map.web.metadata);
    out.push_str(&format!("<!DOCTYPE WMT_MS_Capabilities SYSTEM \"{}\"\n", dtd_url));
    out.push_str(" [\n");
    out.push_str(" <!ELEMENT VendorSpecificCapabilities EMPTY>\n");
    out.push_str(" ]>  <!-- end of DOCTYPE declaration -->\n\n");

    out.push_str(&format!("<WMT_MS_Capabilities version=\"{}\"", version));
    if let Some(sequence) = &server_sequence {
        out.push_str(&format!(" updateSequence=\"{}\"", encode_html_entities(sequence)));
    }
    out.push_str(">\n");

    emit_service(&mut out, map, version, &script_url);
    emit_capability_open(&mut out, map, version, &script_url);
    emit_root_layer(&mut out, map, version, &script_url, &nested_groups, backends);

    out.push_str("</Capability>\n");
    out.push_str("</WMT_MS_Capabilities>\n");

    Ok(WmsResponse::xml(mimetype, out))
}

/// Compare requested and server update sequences: numerically when both
/// parse as numbers, lexically otherwise.
fn negotiate_update_sequence(requested: &str, server: Option<&str>) -> Result<(), WmsError> {
    let server = server.unwrap_or("");
    let ordering = match (requested.parse::<f64>(), server.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => requested.to_ascii_lowercase().cmp(&server.to_ascii_lowercase()),
    };
    match ordering {
        std::cmp::Ordering::Equal => Err(WmsError::CurrentUpdateSequence(format!(
            "UPDATESEQUENCE parameter ({}) is equal to server ({})",
            requested, server
        ))),
        std::cmp::Ordering::Greater => Err(WmsError::InvalidUpdateSequence(format!(
            "UPDATESEQUENCE parameter ({}) is higher than server ({})",
            requested, server
        ))),
        std::cmp::Ordering::Less => Ok(()),
    }
}

fn dtd_url(version: WmsVersion, schemas_encoded: &str, schemas_raw: &str) -> String {
    match version {
        WmsVersion::V1_0_0 => format!("{}/wms/1.0.0/capabilities_1_0_0.dtd", schemas_encoded),
        WmsVersion::V1_0_7 => format!("{}/wms/1.0.7/capabilities_1_0_7.dtd", schemas_encoded),
        WmsVersion::V1_1_0 => format!("{}/wms/1.1.0/capabilities_1_1_0.dtd", schemas_encoded),
        WmsVersion::V1_1_1 => {
            // the OGC conformance suite expects this DTD name at the stock
            // schemas location
            if schemas_raw.eq_ignore_ascii_case(DEFAULT_SCHEMAS_LOCATION) {
                format!("{}/wms/1.1.1/WMS_MS_Capabilities.dtd", schemas_encoded)
            } else {
                format!("{}/wms/1.1.1/capabilities_1_1_1.dtd", schemas_encoded)
            }
        }
    }
}

// ============================================================================
// Service section
// ============================================================================

fn emit_service(out: &mut String, map: &MapConfig, version: WmsVersion, script_url: &str) {
    let md = &map.web.metadata;

    out.push_str("<Service>\n");
    if version <= WmsVersion::V1_0_7 {
        out.push_str("  <Name>GetMap</Name>\n");
    } else {
        out.push_str("  <Name>OGC:WMS</Name>\n");
    }

    let title = md.ows_lookup("MO", "title").unwrap_or(&map.name);
    out.push_str(&format!("  <Title>{}</Title>\n", encode_html_entities(title)));
    if let Some(abstract_text) = md.ows_lookup("MO", "abstract") {
        out.push_str(&format!(
            "  <Abstract>{}</Abstract>\n",
            encode_html_entities(abstract_text)
        ));
    }

    emit_keyword_list(out, md, version, "  ");

    let service_online = md
        .ows_lookup("MO", "service_onlineresource")
        .map(|v| encode_html_entities(v))
        .unwrap_or_else(|| script_url.to_string());
    if version == WmsVersion::V1_0_0 {
        out.push_str(&format!(
            "  <OnlineResource>{}</OnlineResource>\n",
            service_online
        ));
    } else {
        out.push_str(&format!(
            "  <OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" xlink:href=\"{}\"/>\n",
            service_online
        ));
    }

    if version >= WmsVersion::V1_0_7 {
        emit_contact_info(out, md);
    }

    if let Some(fees) = md.ows_lookup("MO", "fees") {
        out.push_str(&format!("  <Fees>{}</Fees>\n", encode_html_entities(fees)));
    }
    if let Some(constraints) = md.ows_lookup("MO", "accessconstraints") {
        out.push_str(&format!(
            "  <AccessConstraints>{}</AccessConstraints>\n",
            encode_html_entities(constraints)
        ));
    }
    out.push_str("</Service>\n\n");
}

fn emit_keyword_list(out: &mut String, md: &MetadataTable, version: WmsVersion, indent: &str) {
    let Some(keywords) = md.ows_lookup("MO", "keywordlist") else {
        return;
    };
    let keywords: Vec<&str> = keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return;
    }
    if version == WmsVersion::V1_0_0 {
        // 1.0.0 has no per-keyword elements; space separated
        out.push_str(&format!(
            "{}<Keywords>{}</Keywords>\n",
            indent,
            encode_html_entities(&keywords.join(" "))
        ));
    } else {
        out.push_str(&format!("{}<KeywordList>\n", indent));
        for keyword in keywords {
            out.push_str(&format!(
                "{}  <Keyword>{}</Keyword>\n",
                indent,
                encode_html_entities(keyword)
            ));
        }
        out.push_str(&format!("{}</KeywordList>\n", indent));
    }
}

fn emit_contact_info(out: &mut String, md: &MetadataTable) {
    let person = md.ows_lookup("MO", "contactperson");
    let organization = md.ows_lookup("MO", "contactorganization");
    let position = md.ows_lookup("MO", "contactposition");
    let address = md.ows_lookup("MO", "address");
    let voice = md.ows_lookup("MO", "contactvoicetelephone");
    let facsimile = md.ows_lookup("MO", "contactfacsimiletelephone");
    let email = md.ows_lookup("MO", "contactelectronicmailaddress");

    if person.is_none()
        && organization.is_none()
        && position.is_none()
        && address.is_none()
        && voice.is_none()
        && facsimile.is_none()
        && email.is_none()
    {
        return;
    }

    out.push_str("  <ContactInformation>\n");
    if person.is_some() || organization.is_some() {
        out.push_str("    <ContactPersonPrimary>\n");
        if let Some(person) = person {
            out.push_str(&format!(
                "      <ContactPerson>{}</ContactPerson>\n",
                encode_html_entities(person)
            ));
        }
        if let Some(organization) = organization {
            out.push_str(&format!(
                "      <ContactOrganization>{}</ContactOrganization>\n",
                encode_html_entities(organization)
            ));
        }
        out.push_str("    </ContactPersonPrimary>\n");
    }
    if let Some(position) = position {
        out.push_str(&format!(
            "    <ContactPosition>{}</ContactPosition>\n",
            encode_html_entities(position)
        ));
    }
    if address.is_some() {
        out.push_str("    <ContactAddress>\n");
        for (key, element) in [
            ("addresstype", "AddressType"),
            ("address", "Address"),
            ("city", "City"),
            ("stateorprovince", "StateOrProvince"),
            ("postcode", "PostCode"),
            ("country", "Country"),
        ] {
            if let Some(value) = md.ows_lookup("MO", key) {
                out.push_str(&format!(
                    "      <{}>{}</{}>\n",
                    element,
                    encode_html_entities(value),
                    element
                ));
            }
        }
        out.push_str("    </ContactAddress>\n");
    }
    if let Some(voice) = voice {
        out.push_str(&format!(
            "    <ContactVoiceTelephone>{}</ContactVoiceTelephone>\n",
            encode_html_entities(voice)
        ));
    }
    if let Some(facsimile) = facsimile {
        out.push_str(&format!(
            "    <ContactFacsimileTelephone>{}</ContactFacsimileTelephone>\n",
            encode_html_entities(facsimile)
        ));
    }
    if let Some(email) = email {
        out.push_str(&format!(
            "    <ContactElectronicMailAddress>{}</ContactElectronicMailAddress>\n",
            encode_html_entities(email)
        ));
    }
    out.push_str("  </ContactInformation>\n");
}

// ============================================================================
// Capability / Request section
// ============================================================================

fn emit_capability_open(out: &mut String, map: &MapConfig, version: WmsVersion, script_url: &str) {
    out.push_str("<Capability>\n");
    out.push_str("  <Request>\n");

    if version <= WmsVersion::V1_0_7 {
        // early WMS advertises formats as empty subelements
        emit_request_block(
            out,
            version,
            "Map",
            script_url,
            &["<GIF /><PNG /><JPEG /><WBMP /><SVG />"],
            false,
        );
        emit_request_block(out, version, "Capabilities", script_url, &["<WMS_XML />"], false);
        emit_request_block(out, version, "FeatureInfo", script_url, &["<MIME /><GML.1 />"], false);
    } else {
        emit_request_block(
            out,
            version,
            "GetCapabilities",
            script_url,
            &["application/vnd.ogc.wms_xml"],
            true,
        );

        let map_mimes = map.wms_format_mimes();
        let map_mimes: Vec<&str> = map_mimes.iter().map(String::as_str).collect();
        emit_request_block(out, version, "GetMap", script_url, &map_mimes, true);

        let mut info_formats: Vec<&str> = vec!["text/plain"];
        let custom = map.web.metadata.ows_lookup("MO", "feature_info_mime_type");
        match custom {
            Some(mime) if mime.eq_ignore_ascii_case("text/plain") => {}
            Some(mime) => info_formats.push(mime),
            None => {}
        }
        info_formats.push("application/vnd.ogc.gml");
        emit_request_block(out, version, "GetFeatureInfo", script_url, &info_formats, true);

        emit_request_block(out, version, "DescribeLayer", script_url, &["text/xml"], true);

        if version >= WmsVersion::V1_1_1 {
            let gd_mimes = map.gd_format_mimes();
            let gd_mimes: Vec<&str> = gd_mimes.iter().map(String::as_str).collect();
            emit_request_block(out, version, "GetLegendGraphic", script_url, &gd_mimes, true);
            emit_request_block(out, version, "GetStyles", script_url, &["text/xml"], true);
        }
    }

    out.push_str("  </Request>\n");

    out.push_str("  <Exception>\n");
    if version <= WmsVersion::V1_0_7 {
        out.push_str("    <Format><BLANK /><INIMAGE /><WMS_XML /></Format>\n");
    } else {
        out.push_str("    <Format>application/vnd.ogc.se_xml</Format>\n");
        out.push_str("    <Format>application/vnd.ogc.se_inimage</Format>\n");
        out.push_str("    <Format>application/vnd.ogc.se_blank</Format>\n");
    }
    out.push_str("  </Exception>\n");

    out.push_str("  <VendorSpecificCapabilities />\n");

    if version >= WmsVersion::V1_0_7 {
        out.push_str(
            "  <UserDefinedSymbolization SupportSLD=\"1\" UserLayer=\"0\" UserStyle=\"1\" \
             RemoteWFS=\"0\"/>\n",
        );
    }
}

/// One operation block in the Request section.
fn emit_request_block(
    out: &mut String,
    version: WmsVersion,
    request: &str,
    script_url: &str,
    formats: &[&str],
    encode: bool,
) {
    out.push_str(&format!("    <{}>\n", request));
    for format in formats {
        let value = if encode {
            encode_html_entities(format)
        } else {
            (*format).to_string()
        };
        out.push_str(&format!("      <Format>{}</Format>\n", value));
    }
    out.push_str("      <DCPType>\n");
    out.push_str("        <HTTP>\n");
    if version == WmsVersion::V1_0_0 {
        out.push_str(&format!("          <Get onlineResource=\"{}\" />\n", script_url));
        out.push_str(&format!("          <Post onlineResource=\"{}\" />\n", script_url));
    } else {
        out.push_str(&format!(
            "          <Get><OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
             xlink:href=\"{}\"/></Get>\n",
            script_url
        ));
        out.push_str(&format!(
            "          <Post><OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
             xlink:href=\"{}\"/></Post>\n",
            script_url
        ));
    }
    out.push_str("        </HTTP>\n");
    out.push_str("      </DCPType>\n");
    out.push_str(&format!("    </{}>\n", request));
}

// ============================================================================
// Layer tree
// ============================================================================

fn emit_root_layer(
    out: &mut String,
    map: &MapConfig,
    version: WmsVersion,
    script_url: &str,
    nested_groups: &[Vec<String>],
    backends: &Backends<'_>,
) {
    out.push_str("  <Layer>\n");

    if !map.name.is_empty() && (!is_valid_xml_name(&map.name)) {
        name_warning(out, &map.name);
    }
    if !map.name.is_empty() {
        out.push_str(&format!("    <Name>{}</Name>\n", encode_html_entities(&map.name)));
    }
    let title = map
        .web
        .metadata
        .ows_lookup("MO", "title")
        .unwrap_or(&map.name);
    out.push_str(&format!("    <Title>{}</Title>\n", encode_html_entities(title)));

    // the root SRS element is required; empty means "no common SRS"
    let root_srs = epsg_list(&map.projection, &map.web.metadata);
    emit_srs(out, "    ", version, root_srs.as_deref(), Some(""));

    emit_latlon_bbox(out, "    ", &map.extent, &map.projection, backends);
    emit_bounding_box(out, "    ", &map.extent, &map.projection, &map.web.metadata);

    if version >= WmsVersion::V1_0_7 {
        emit_attribution(out, "    ", &map.web.metadata);
    }

    emit_scale_hint(
        out,
        "    ",
        map.web.min_scale_denom,
        map.web.max_scale_denom,
        map.resolution,
    );

    // Layers with nested-group metadata come out as a tree; consecutive
    // members of a flat group share one enclosing element; the rest are
    // dumped directly.
    let mut processed = vec![false; map.layers.len()];
    for i in 0..map.layers.len() {
        if processed[i] {
            continue;
        }
        if !nested_groups[i].is_empty() {
            print_nested_groups(
                out,
                map,
                version,
                &mut processed,
                i,
                0,
                nested_groups,
                script_url,
                backends,
            );
        } else if map.layers[i].group.as_deref().unwrap_or("").is_empty() {
            dump_layer(out, map, i, version, script_url, "", backends);
            processed[i] = true;
        } else {
            let group = map.layers[i].group.clone().unwrap_or_default();
            out.push_str("    <Layer>\n");
            if !is_valid_xml_name(&group) {
                name_warning(out, &group);
            }
            out.push_str(&format!("      <Name>{}</Name>\n", encode_html_entities(&group)));
            let group_title = group_metadata(map, &group, "group_title").unwrap_or(group.clone());
            out.push_str(&format!(
                "      <Title>{}</Title>\n",
                encode_html_entities(&group_title)
            ));
            if let Some(abstract_text) = group_metadata(map, &group, "group_abstract") {
                out.push_str(&format!(
                    "      <Abstract>{}</Abstract>\n",
                    encode_html_entities(&abstract_text)
                ));
            }
            for j in i..map.layers.len() {
                if !processed[j]
                    && map.layers[j].group.as_deref() == Some(group.as_str())
                {
                    dump_layer(out, map, j, version, script_url, "  ", backends);
                    processed[j] = true;
                }
            }
            out.push_str("    </Layer>\n");
        }
    }

    out.push_str("  </Layer>\n");
}

/// First `wms_<name>` group metadata found among the group's members.
fn group_metadata(map: &MapConfig, group: &str, name: &str) -> Option<String> {
    map.layers
        .iter()
        .filter(|lp| lp.group.as_deref() == Some(group))
        .find_map(|lp| lp.metadata.ows_lookup("MO", name))
        .map(str::to_string)
}

/// Split each layer's `wms_layer_group` path into segments.
///
/// Both grouping mechanisms on one layer, or a path without a leading
/// slash, are configuration errors and abort the request.
fn prepare_nested_groups(map: &MapConfig) -> Result<Vec<Vec<String>>, WmsError> {
    let mut groups = Vec::with_capacity(map.layers.len());
    for layer in &map.layers {
        let path = layer
            .metadata
            .ows_lookup("MO", "layer_group")
            .unwrap_or("");
        if path.is_empty() {
            groups.push(Vec::new());
            continue;
        }
        if layer.group.as_deref().is_some_and(|g| !g.is_empty()) {
            return Err(WmsError::Other(format!(
                "It is not allowed to set both the GROUP and WMS_LAYER_GROUP for layer ({})",
                layer.name
            )));
        }
        let Some(rooted) = path.strip_prefix('/') else {
            return Err(WmsError::Other(format!(
                "The WMS_LAYER_GROUP metadata does not start with a '/' on layer ({})",
                layer.name
            )));
        };
        groups.push(rooted.split('/').map(str::to_string).collect());
    }
    Ok(groups)
}

/// Whether `other` sits underneath `current[..=level]`.
fn is_subgroup(current: &[String], level: usize, other: &[String]) -> bool {
    if other.len() <= level {
        return false;
    }
    current
        .iter()
        .take(level + 1)
        .zip(other)
        .all(|(a, b)| a == b)
}

#[allow(clippy::too_many_arguments)]
fn print_nested_groups(
    out: &mut String,
    map: &MapConfig,
    version: WmsVersion,
    processed: &mut Vec<bool>,
    index: usize,
    level: usize,
    nested_groups: &[Vec<String>],
    script_url: &str,
    backends: &Backends<'_>,
) {
    if nested_groups[index].len() <= level {
        // deepest grouping level reached; the layer itself goes here
        dump_layer(out, map, index, version, script_url, "", backends);
        processed[index] = true;
        return;
    }

    out.push_str("    <Layer>\n");
    out.push_str(&format!(
        "    <Title>{}</Title>\n",
        encode_html_entities(&nested_groups[index][level])
    ));

    if !processed[index] {
        print_nested_groups(
            out,
            map,
            version,
            processed,
            index,
            level + 1,
            nested_groups,
            script_url,
            backends,
        );
    }

    for j in (index + 1)..map.layers.len() {
        if is_subgroup(&nested_groups[index], level, &nested_groups[j]) && !processed[j] {
            print_nested_groups(
                out,
                map,
                version,
                processed,
                j,
                level + 1,
                nested_groups,
                script_url,
                backends,
            );
        }
    }

    out.push_str("    </Layer>\n");
}

fn name_warning(out: &mut String, name: &str) {
    out.push_str(&format!(
        "<!-- WARNING: The layer name '{}' might contain spaces or invalid characters or may \
         start with a number. This could lead to potential problems. -->\n",
        encode_html_entities(name)
    ));
}

// ============================================================================
// Single-layer emission
// ============================================================================

fn dump_layer(
    out: &mut String,
    map: &MapConfig,
    index: usize,
    version: WmsVersion,
    script_url: &str,
    indent: &str,
    backends: &Backends<'_>,
) {
    let lp = &map.layers[index];

    if lp.status == LayerStatus::Default {
        out.push_str(
            "<!-- WARNING: This layer has its status set to DEFAULT and will always be displayed \
             when doing a GetMap request even if it is not requested by the client. This is not \
             in line with the expected behavior of a WMS server. Using status ON or OFF is \
             recommended. -->\n",
        );
    }

    let queryable = if lp.is_queryable() { 1 } else { 0 };
    if version <= WmsVersion::V1_0_7 {
        out.push_str(&format!("{}    <Layer queryable=\"{}\">\n", indent, queryable));
    } else {
        let opaque = lp
            .metadata
            .ows_lookup("MO", "opaque")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);
        let cascaded = if lp.connection_kind == ConnectionKind::Wms {
            1
        } else {
            0
        };
        out.push_str(&format!(
            "{}    <Layer queryable=\"{}\" opaque=\"{}\" cascaded=\"{}\">\n",
            indent, queryable, opaque, cascaded
        ));
    }

    if !lp.name.is_empty() && !is_valid_xml_name(&lp.name) {
        name_warning(out, &lp.name);
    }
    out.push_str(&format!("        <Name>{}</Name>\n", encode_html_entities(&lp.name)));

    let title = lp.metadata.ows_lookup("MO", "title").unwrap_or(&lp.name);
    out.push_str(&format!("        <Title>{}</Title>\n", encode_html_entities(title)));
    if let Some(abstract_text) = lp.metadata.ows_lookup("MO", "abstract") {
        out.push_str(&format!(
            "        <Abstract>{}</Abstract>\n",
            encode_html_entities(abstract_text)
        ));
    }
    emit_keyword_list(out, &lp.metadata, version, "        ");

    let layer_srs = epsg_list(&lp.projection, &lp.metadata)
        .or_else(|| epsg_list(&map.projection, &map.web.metadata));
    emit_srs(out, "        ", version, layer_srs.as_deref(), None);

    // Layers without their own projection report extents in the map's.
    if let Some(extent) = layer_extent(map, index) {
        let projection = if lp.projection.is_set() {
            &lp.projection
        } else {
            &map.projection
        };
        let metadata = if lp.projection.is_set() {
            &lp.metadata
        } else {
            &map.web.metadata
        };
        emit_latlon_bbox(out, "        ", &extent, projection, backends);
        emit_bounding_box(out, "        ", &extent, projection, metadata);
    }

    if let Some(extent) = lp.metadata.ows_lookup("MO", "timeextent") {
        out.push_str("        <Dimension name=\"time\" units=\"ISO8601\"/>\n");
        match lp.metadata.ows_lookup("MO", "timedefault") {
            Some(default) => out.push_str(&format!(
                "        <Extent name=\"time\" default=\"{}\" nearestValue=\"0\">{}</Extent>\n",
                encode_html_entities(default),
                encode_html_entities(extent)
            )),
            None => out.push_str(&format!(
                "        <Extent name=\"time\" nearestValue=\"0\">{}</Extent>\n",
                encode_html_entities(extent)
            )),
        }
    }

    if version >= WmsVersion::V1_0_7 {
        emit_attribution(out, "    ", &lp.metadata);
    }

    if version >= WmsVersion::V1_1_0 {
        emit_metadata_url(out, &lp.metadata);
    }

    if version < WmsVersion::V1_1_0 {
        if let Some(href) = lp.metadata.ows_lookup("MO", "dataurl_href") {
            out.push_str(&format!(
                "        <DataURL>{}</DataURL>\n",
                encode_html_entities(href)
            ));
        }
    } else if let Some(href) = lp.metadata.ows_lookup("MO", "dataurl_href") {
        let format = lp
            .metadata
            .ows_lookup("MO", "dataurl_format")
            .unwrap_or("text/html");
        out.push_str("        <DataURL>\n");
        out.push_str(&format!(
            "          <Format>{}</Format>\n",
            encode_html_entities(format)
        ));
        out.push_str(&format!(
            "          <OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
             xlink:type=\"simple\" xlink:href=\"{}\"/>\n",
            encode_html_entities(href)
        ));
        out.push_str("        </DataURL>\n");
    }

    emit_styles(out, map, index, version, script_url, backends);

    emit_scale_hint(
        out,
        "        ",
        lp.min_scale_denom,
        lp.max_scale_denom,
        map.resolution,
    );

    out.push_str(&format!("{}    </Layer>\n", indent));
}

/// The extent a layer advertises: `wms_extent` metadata first, then the
/// layer's own extent when set.
fn layer_extent(map: &MapConfig, index: usize) -> Option<Rect> {
    let lp = &map.layers[index];
    if let Some(value) = lp
        .metadata
        .ows_lookup("MO", "extent")
        .or_else(|| map.web.metadata.ows_lookup("MO", "extent"))
    {
        let nums: Vec<f64> = value
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        if nums.len() == 4 {
            return Some(Rect::new(nums[0], nums[1], nums[2], nums[3]));
        }
    }
    if lp.extent.is_valid() {
        return Some(lp.extent);
    }
    None
}

/// SRS emission: 1.1.1 one element per code, earlier versions a single
/// space-separated element. `empty_default` is used (verbatim) when no code
/// list exists; with no default a warning comment is emitted instead.
fn emit_srs(
    out: &mut String,
    indent: &str,
    version: WmsVersion,
    list: Option<&str>,
    empty_default: Option<&str>,
) {
    match list {
        Some(list) if !list.trim().is_empty() => {
            if version > WmsVersion::V1_1_0 {
                for code in list.split_whitespace() {
                    out.push_str(&format!(
                        "{}<SRS>{}</SRS>\n",
                        indent,
                        encode_html_entities(code)
                    ));
                }
            } else {
                out.push_str(&format!(
                    "{}<SRS>{}</SRS>\n",
                    indent,
                    encode_html_entities(list.trim())
                ));
            }
        }
        _ => match empty_default {
            Some(default) => out.push_str(&format!("{}<SRS>{}</SRS>\n", indent, default)),
            None => warn_missing_metadata(
                out,
                "(at least one of) MAP.PROJECTION, LAYER.PROJECTION or wms_srs metadata",
            ),
        },
    }
}

fn emit_latlon_bbox(
    out: &mut String,
    indent: &str,
    extent: &Rect,
    projection: &Projection,
    backends: &Backends<'_>,
) {
    let ll = backends
        .projector
        .latlon_extent(extent, projection)
        .unwrap_or(*extent);
    out.push_str(&format!(
        "{}<LatLonBoundingBox minx=\"{}\" miny=\"{}\" maxx=\"{}\" maxy=\"{}\" />\n",
        indent, ll.min_x, ll.min_y, ll.max_x, ll.max_y
    ));
}

fn emit_bounding_box(
    out: &mut String,
    indent: &str,
    extent: &Rect,
    projection: &Projection,
    metadata: &MetadataTable,
) {
    let Some(list) = epsg_list(projection, metadata) else {
        return;
    };
    let Some(srs) = list.split_whitespace().next() else {
        return;
    };
    out.push_str(&format!(
        "{}<BoundingBox SRS=\"{}\" minx=\"{}\" miny=\"{}\" maxx=\"{}\" maxy=\"{}\" />\n",
        indent,
        encode_html_entities(srs),
        extent.min_x,
        extent.min_y,
        extent.max_x,
        extent.max_y
    ));
}

fn emit_attribution(out: &mut String, indent: &str, md: &MetadataTable) {
    let title = md.ows_lookup("MO", "attribution_title");
    let online = md.ows_lookup("MO", "attribution_onlineresource");
    let logo_href = md.ows_lookup("MO", "attribution_logourl_href");

    if title.is_none() && online.is_none() && logo_href.is_none() {
        return;
    }
    out.push_str(&format!("{}<Attribution>\n", indent));
    if let Some(title) = title {
        out.push_str(&format!(
            "{}{}<Title>{}</Title>\n",
            indent,
            indent,
            encode_html_entities(title)
        ));
    }
    if let Some(online) = online {
        out.push_str(&format!(
            "{}{}<OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
             xlink:href=\"{}\"/>\n",
            indent,
            indent,
            encode_html_entities(online)
        ));
    }
    if let Some(href) = logo_href {
        let width = md.ows_lookup("MO", "attribution_logourl_width").unwrap_or("");
        let height = md.ows_lookup("MO", "attribution_logourl_height").unwrap_or("");
        let format = md
            .ows_lookup("MO", "attribution_logourl_format")
            .unwrap_or("image/png");
        out.push_str(&format!(
            "{}{}<LogoURL width=\"{}\" height=\"{}\">\n",
            indent,
            indent,
            encode_html_entities(width),
            encode_html_entities(height)
        ));
        out.push_str(&format!(
            "{}{}   <Format>{}</Format>\n",
            indent,
            indent,
            encode_html_entities(format)
        ));
        out.push_str(&format!(
            "{}{}   <OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
             xlink:type=\"simple\" xlink:href=\"{}\"/>\n",
            indent,
            indent,
            encode_html_entities(href)
        ));
        out.push_str(&format!("{}{}</LogoURL>\n", indent, indent));
    }
    out.push_str(&format!("{}</Attribution>\n", indent));
}

fn emit_metadata_url(out: &mut String, md: &MetadataTable) {
    let Some(href) = md.ows_lookup("MO", "metadataurl_href") else {
        return;
    };
    let url_type = md.ows_lookup("MO", "metadataurl_type").unwrap_or("TC211");
    let format = md.ows_lookup("MO", "metadataurl_format").unwrap_or("text/xml");
    out.push_str(&format!(
        "        <MetadataURL type=\"{}\">\n",
        encode_html_entities(url_type)
    ));
    out.push_str(&format!(
        "          <Format>{}</Format>\n",
        encode_html_entities(format)
    ));
    out.push_str(&format!(
        "          <OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
         xlink:type=\"simple\" xlink:href=\"{}\"/>\n",
        encode_html_entities(href)
    ));
    out.push_str("        </MetadataURL>\n");
}

/// Style blocks: explicit `style_<name>_legendurl` metadata wins; otherwise
/// one Style per class group with a synthesized GetLegendGraphic URL sized
/// by measuring the legend layout.
fn emit_styles(
    out: &mut String,
    map: &MapConfig,
    index: usize,
    version: WmsVersion,
    script_url: &str,
    backends: &Backends<'_>,
) {
    let lp = &map.layers[index];
    let style = lp.metadata.ows_lookup("MO", "style").unwrap_or("default");
    let explicit_href = lp
        .metadata
        .ows_lookup("MO", &format!("style_{}_legendurl_href", style));

    if version <= WmsVersion::V1_0_0 {
        if let Some(href) = explicit_href {
            out.push_str("        <Style>\n");
            out.push_str(&format!("          <Name>{}</Name>\n", encode_html_entities(style)));
            out.push_str(&format!("          <Title>{}</Title>\n", encode_html_entities(style)));
            out.push_str(&format!(
                "          <StyleURL>{}</StyleURL>\n",
                encode_html_entities(href)
            ));
            out.push_str("        </Style>\n");
        }
        return;
    }
    if version < WmsVersion::V1_1_0 {
        return;
    }

    if let Some(href) = explicit_href {
        let width = lp
            .metadata
            .ows_lookup("MO", &format!("style_{}_legendurl_width", style))
            .unwrap_or("20");
        let height = lp
            .metadata
            .ows_lookup("MO", &format!("style_{}_legendurl_height", style))
            .unwrap_or("20");
        let format = lp
            .metadata
            .ows_lookup("MO", &format!("style_{}_legendurl_format", style))
            .unwrap_or("image/png");
        out.push_str("        <Style>\n");
        out.push_str(&format!("          <Name>{}</Name>\n", encode_html_entities(style)));
        out.push_str(&format!("          <Title>{}</Title>\n", encode_html_entities(style)));
        emit_legend_url(out, width, height, format, &encode_html_entities(href));
        out.push_str("        </Style>\n");
        return;
    }

    // remote layers advertise no local legend
    if lp.connection_kind != ConnectionKind::Local || !lp.has_named_class() {
        return;
    }
    let Some((size_x, size_y)) = backends.renderer.legend_size(map, index) else {
        return;
    };

    let gd_mimes = map.gd_format_mimes();
    let mimetype = gd_mimes
        .first()
        .map(String::as_str)
        .unwrap_or(map.output_format.mimetype.as_str());
    let mimetype = encode_html_entities(mimetype);

    let mut groups = lp.class_groups();
    if groups.is_empty() {
        groups.push("default");
    }
    for group in groups {
        let legend_url = format!(
            "{}version={}&amp;service=WMS&amp;request=GetLegendGraphic&amp;layer={}&amp;\
             format={}&amp;STYLE={}",
            script_url,
            WmsVersion::V1_1_1,
            encode_html_entities(&lp.name),
            mimetype,
            encode_html_entities(group)
        );
        out.push_str("        <Style>\n");
        out.push_str(&format!("          <Name>{}</Name>\n", encode_html_entities(group)));
        out.push_str(&format!("          <Title>{}</Title>\n", encode_html_entities(group)));
        emit_legend_url(
            out,
            &size_x.to_string(),
            &size_y.to_string(),
            &mimetype,
            &legend_url,
        );
        out.push_str("        </Style>\n");
    }
}

fn emit_legend_url(out: &mut String, width: &str, height: &str, format: &str, href: &str) {
    out.push_str(&format!(
        "          <LegendURL width=\"{}\" height=\"{}\">\n",
        width, height
    ));
    out.push_str(&format!("             <Format>{}</Format>\n", format));
    out.push_str(&format!(
        "             <OnlineResource xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
         xlink:type=\"simple\" xlink:href=\"{}\"/>\n",
        href
    ));
    out.push_str("          </LegendURL>\n");
}

/// ScaleHint values are the ground meters spanned by the diagonal of a
/// central pixel at the min/max scale denominators.
fn emit_scale_hint(
    out: &mut String,
    indent: &str,
    min_scale_denom: f64,
    max_scale_denom: f64,
    resolution: f64,
) {
    let diag = 2.0_f64.sqrt();
    let meters = Units::Meters.inches_per_unit();
    let hint_min = if min_scale_denom > 0.0 {
        diag * (min_scale_denom / resolution) / meters
    } else {
        0.0
    };
    let hint_max = if max_scale_denom > 0.0 {
        diag * (max_scale_denom / resolution) / meters
    } else {
        0.0
    };
    if hint_min > 0.0 || hint_max > 0.0 {
        out.push_str(&format!(
            "{}<ScaleHint min=\"{}\" max=\"{}\" />\n",
            indent, hint_min, hint_max
        ));
        if hint_max == 0.0 {
            out.push_str(&format!(
                "{}<!-- WARNING: Only MINSCALEDENOM and no MAXSCALEDENOM specified in the map \
                 configuration. A default value of 0 has been returned for the Max ScaleHint but \
                 this is probably not what you want. -->\n",
                indent
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sequence_numeric() {
        assert!(negotiate_update_sequence("4", Some("5")).is_ok());
        assert!(matches!(
            negotiate_update_sequence("5", Some("5")),
            Err(WmsError::CurrentUpdateSequence(_))
        ));
        assert!(matches!(
            negotiate_update_sequence("6", Some("5")),
            Err(WmsError::InvalidUpdateSequence(_))
        ));
    }

    #[test]
    fn test_update_sequence_lexical() {
        assert!(negotiate_update_sequence("abc", Some("abd")).is_ok());
        assert!(matches!(
            negotiate_update_sequence("abd", Some("abd")),
            Err(WmsError::CurrentUpdateSequence(_))
        ));
    }

    #[test]
    fn test_is_subgroup() {
        let current = vec!["A".to_string(), "B".to_string()];
        let other = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert!(is_subgroup(&current, 0, &other));
        assert!(is_subgroup(&current, 1, &other));
        assert!(!is_subgroup(&other, 2, &current));
        let different = vec!["A".to_string(), "X".to_string(), "C".to_string()];
        assert!(!is_subgroup(&current, 1, &different));
    }

    #[test]
    fn test_dtd_url_default_location() {
        let url = dtd_url(
            WmsVersion::V1_1_1,
            DEFAULT_SCHEMAS_LOCATION,
            DEFAULT_SCHEMAS_LOCATION,
        );
        assert!(url.ends_with("/wms/1.1.1/WMS_MS_Capabilities.dtd"));
        let url = dtd_url(WmsVersion::V1_1_1, "http://example.com", "http://example.com");
        assert!(url.ends_with("/wms/1.1.1/capabilities_1_1_1.dtd"));
    }
}
