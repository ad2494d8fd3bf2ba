//! XML emission helpers shared by the operation handlers.

use map_config::{MapConfig, MetadataTable};

/// Default root for the published DTDs, overridable with the
/// `ows_schemas_location` metadata entry.
pub const DEFAULT_SCHEMAS_LOCATION: &str = "http://schemas.opengeospatial.net";

/// Escape the five XML-significant characters.
pub fn encode_html_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`encode_html_entities`]; unknown entities pass through.
pub fn decode_html_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let (replacement, consumed) = if rest.starts_with("&amp;") {
            ("&", 5)
        } else if rest.starts_with("&lt;") {
            ("<", 4)
        } else if rest.starts_with("&gt;") {
            (">", 4)
        } else if rest.starts_with("&quot;") {
            ("\"", 6)
        } else if rest.starts_with("&apos;") {
            ("'", 6)
        } else {
            ("&", 1)
        };
        out.push_str(replacement);
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

/// Whether `name` is usable as an XML element name.
pub fn is_valid_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// The DTD root for this map.
pub fn schemas_location(map: &MapConfig) -> String {
    map.web
        .metadata
        .ows_lookup("MO", "schemas_location")
        .unwrap_or(DEFAULT_SCHEMAS_LOCATION)
        .to_string()
}

/// The server's own URL, for OnlineResource elements and synthesized
/// GetLegendGraphic links. Guaranteed to end in `?` or `&`.
pub fn online_resource(map: &MapConfig) -> String {
    let mut url = map
        .web
        .metadata
        .ows_lookup("MO", "onlineresource")
        .unwrap_or("http://localhost:8080/wms")
        .to_string();
    if !url.ends_with('?') && !url.ends_with('&') {
        if url.contains('?') {
            url.push('&');
        } else {
            url.push('?');
        }
    }
    url
}

/// The `<?xml ...?>` prolog, honouring the `wms_encoding` metadata.
pub fn xml_prolog(metadata: &MetadataTable) -> String {
    let encoding = metadata.ows_lookup("MO", "encoding").unwrap_or("ISO-8859-1");
    format!(
        "<?xml version='1.0' encoding=\"{}\" standalone=\"no\" ?>\n",
        encode_html_entities(encoding)
    )
}

/// Push a `<!-- WARNING: ... -->` comment for a missing mandatory entry.
pub fn warn_missing_metadata(out: &mut String, name: &str) {
    out.push_str(&format!(
        "<!-- WARNING: Mandatory metadata '{}' was missing in this context. -->\n",
        name
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(
            encode_html_entities("a<b>&\"c'"),
            "a&lt;b&gt;&amp;&quot;c&apos;"
        );
    }

    #[test]
    fn test_roundtrip_identity() {
        let plain = "GetMap results for layer roads (1:50000)";
        assert_eq!(decode_html_entities(&encode_html_entities(plain)), plain);
        let hostile = "a<b>&\"c'";
        assert_eq!(decode_html_entities(&encode_html_entities(hostile)), hostile);
    }

    #[test]
    fn test_xml_name_validity() {
        assert!(is_valid_xml_name("roads"));
        assert!(is_valid_xml_name("_layer-1.a"));
        assert!(!is_valid_xml_name("1roads"));
        assert!(!is_valid_xml_name("two words"));
        assert!(!is_valid_xml_name(""));
    }

    #[test]
    fn test_online_resource_terminator() {
        let mut map = MapConfig::new("demo");
        assert!(online_resource(&map).ends_with('?'));
        map.web
            .metadata
            .set("wms_onlineresource", "http://x.test/cgi?map=a");
        assert!(online_resource(&map).ends_with('&'));
    }
}
