//! OGC Service Exception formatting.

use map_config::MapConfig;

use crate::contracts::Renderer;
use crate::error::WmsError;
use crate::response::WmsResponse;
use crate::version::WmsVersion;
use crate::xml::{encode_html_entities, schemas_location, xml_prolog};

/// The exception renditions selectable through the EXCEPTIONS parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionFormat {
    /// Error text drawn over the map image.
    Inimage,
    /// An empty canvas.
    Blank,
    /// The WMS 1.0.0 `<WMTException>` wrapper.
    WmsXml,
    /// A `<ServiceExceptionReport>` document.
    SeXml,
}

impl ExceptionFormat {
    /// Parse an EXCEPTIONS value, accepting both the legacy keywords and
    /// the OGC MIME spellings. Unknown values fall back to XML reports.
    pub fn parse(value: &str) -> ExceptionFormat {
        if value.eq_ignore_ascii_case("INIMAGE")
            || value.eq_ignore_ascii_case("application/vnd.ogc.se_inimage")
        {
            ExceptionFormat::Inimage
        } else if value.eq_ignore_ascii_case("BLANK")
            || value.eq_ignore_ascii_case("application/vnd.ogc.se_blank")
        {
            ExceptionFormat::Blank
        } else if value.eq_ignore_ascii_case("WMS_XML") {
            ExceptionFormat::WmsXml
        } else {
            ExceptionFormat::SeXml
        }
    }

    /// The default rendition for a negotiated version: in-image for 1.0.0,
    /// XML reports afterwards.
    pub fn default_for(version: Option<WmsVersion>) -> ExceptionFormat {
        match version {
            Some(WmsVersion::V1_0_0) => ExceptionFormat::Inimage,
            _ => ExceptionFormat::SeXml,
        }
    }
}

/// Build the complete exception response for `error`.
///
/// `format` is the request's EXCEPTIONS override; absent, the version
/// default applies. Versions still unset at failure time report as 1.1.1.
pub fn exception_response(
    map: &MapConfig,
    version: Option<WmsVersion>,
    format: Option<ExceptionFormat>,
    error: &WmsError,
    renderer: &dyn Renderer,
) -> WmsResponse {
    let format = format.unwrap_or_else(|| ExceptionFormat::default_for(version));
    match format {
        ExceptionFormat::Inimage | ExceptionFormat::Blank => {
            let blank = format == ExceptionFormat::Blank;
            let img = renderer.render_error_image(map, blank, &error.to_string());
            WmsResponse::new(img.mimetype, img.bytes)
        }
        ExceptionFormat::WmsXml => {
            let mut out = String::new();
            out.push_str("<WMTException version=\"1.0.0\">\n");
            out.push_str(&encode_html_entities(&error.to_string()));
            out.push('\n');
            out.push_str("</WMTException>\n");
            WmsResponse::xml("text/xml", out)
        }
        ExceptionFormat::SeXml => se_xml_response(map, version, error),
    }
}

fn se_xml_response(
    map: &MapConfig,
    version: Option<WmsVersion>,
    error: &WmsError,
) -> WmsResponse {
    let version = version.unwrap_or(WmsVersion::V1_1_1);
    let schemas = encode_html_entities(&schemas_location(map));

    let mut out = xml_prolog(&map.web.metadata);
    let mimetype = if version <= WmsVersion::V1_0_7 {
        out.push_str(
            "<!DOCTYPE ServiceExceptionReport SYSTEM \
             \"http://www.digitalearth.gov/wmt/xml/exception_1_0_1.dtd\">\n",
        );
        out.push_str("<ServiceExceptionReport version=\"1.0.1\">\n");
        "text/xml"
    } else if version <= WmsVersion::V1_1_0 {
        out.push_str(&format!(
            "<!DOCTYPE ServiceExceptionReport SYSTEM \"{}/wms/1.1.0/exception_1_1_0.dtd\">\n",
            schemas
        ));
        out.push_str("<ServiceExceptionReport version=\"1.1.0\">\n");
        "application/vnd.ogc.se_xml"
    } else {
        out.push_str(&format!(
            "<!DOCTYPE ServiceExceptionReport SYSTEM \"{}/wms/1.1.1/exception_1_1_1.dtd\">\n",
            schemas
        ));
        out.push_str("<ServiceExceptionReport version=\"1.1.1\">\n");
        "application/vnd.ogc.se_xml"
    };

    match error.ogc_code() {
        Some(code) => out.push_str(&format!("<ServiceException code=\"{}\">\n", code)),
        None => out.push_str("<ServiceException>\n"),
    }
    out.push_str(&encode_html_entities(&error.to_string()));
    out.push('\n');
    out.push_str("</ServiceException>\n");
    out.push_str("</ServiceExceptionReport>\n");

    WmsResponse::xml(mimetype, out)
}
