//! The WMS request dispatcher.

use tracing::{debug, info};

use map_config::MapConfig;

use crate::binder::{bind_map_request, BindKind};
use crate::capabilities::get_capabilities;
use crate::context::get_context;
use crate::contracts::Backends;
use crate::describelayer::describe_layer;
use crate::error::WmsError;
use crate::exceptions::{exception_response, ExceptionFormat};
use crate::featureinfo::get_feature_info;
use crate::getmap::get_map;
use crate::getstyles::get_styles;
use crate::legend::get_legend_graphic;
use crate::params::RequestParams;
use crate::response::WmsResponse;
use crate::version::{parse_version_param, WmsVersion};

/// The dispatch verdict.
#[derive(Debug)]
pub enum Dispatch {
    /// Not a WMS request; the host should hand it to another service.
    NotWms,
    /// A complete response, successful or an already-formatted exception.
    Response(WmsResponse),
}

/// Entry point for WMS requests.
///
/// `map` is this request's private copy of the configuration; handlers
/// mutate it freely. Failures come back as fully-formatted Service
/// Exception responses, honouring the request's EXCEPTIONS override.
pub fn dispatch(map: &mut MapConfig, params: &RequestParams, backends: &Backends<'_>) -> Dispatch {
    let service = params.get("SERVICE");
    let request = params.get("REQUEST");
    let raw_version = params
        .get("VERSION")
        .or_else(|| params.get("WMTVER"));
    let exceptions = params.get("EXCEPTIONS").map(ExceptionFormat::parse);

    // not ours: no WMS discriminator at all, or another service's name
    if service.is_none() && raw_version.is_none() && request.is_none() {
        return Dispatch::NotWms;
    }
    if let Some(service) = service {
        if !service.eq_ignore_ascii_case("WMS") {
            return Dispatch::NotWms;
        }
    }

    let version = match parse_version_param(raw_version) {
        Ok(version) => version,
        Err(err) => return fail(map, None, exceptions, err, backends),
    };

    debug!(service = ?service, request = ?request, version = ?version, "WMS dispatch");

    if let Some(request) = request {
        if request.eq_ignore_ascii_case("GetCapabilities")
            || request.eq_ignore_ascii_case("capabilities")
        {
            // SERVICE became mandatory for GetCapabilities with 1.0.7
            if service.is_none()
                && (version.is_none() || version >= Some(WmsVersion::V1_0_7))
            {
                return fail(
                    map,
                    version,
                    exceptions,
                    WmsError::ServiceNotDefined("Required SERVICE parameter missing.".to_string()),
                    backends,
                );
            }
            let version = version.unwrap_or(WmsVersion::V1_1_1);
            map.uniquify_layer_names();
            info!(map = %map.name, version = %version, "GetCapabilities");
            return run(map, version, exceptions, backends, |map, backends| {
                get_capabilities(map, version, params, backends)
            });
        }
    }

    // every other operation requires an explicit protocol version
    let Some(version) = version else {
        return fail(
            map,
            None,
            exceptions,
            WmsError::Other("Incomplete WMS request: VERSION parameter missing".to_string()),
            backends,
        );
    };
    let Some(request) = request else {
        return fail(
            map,
            Some(version),
            exceptions,
            WmsError::Other("Incomplete WMS request: REQUEST parameter missing".to_string()),
            backends,
        );
    };

    map.uniquify_layer_names();
    info!(map = %map.name, request = %request, version = %version, "WMS request");

    if request.eq_ignore_ascii_case("GetContext") || request.eq_ignore_ascii_case("context") {
        // error handling for context documents proceeds as 1.1.1
        return run(map, WmsVersion::V1_1_1, exceptions, backends, |map, _| {
            get_context(map, Some(version), params)
        });
    }
    if request.eq_ignore_ascii_case("GetLegendGraphic") {
        return run(map, version, exceptions, backends, |map, backends| {
            get_legend_graphic(map, version, params, backends)
        });
    }
    if request.eq_ignore_ascii_case("GetStyles") {
        return run(map, version, exceptions, backends, |map, backends| {
            get_styles(map, params, backends)
        });
    }

    let bind_kind = if request.eq_ignore_ascii_case("GetMap") || request.eq_ignore_ascii_case("map")
    {
        Some(BindKind::GetMap)
    } else if request.eq_ignore_ascii_case("GetFeatureInfo")
        || request.eq_ignore_ascii_case("feature_info")
    {
        Some(BindKind::GetFeatureInfo)
    } else if request.eq_ignore_ascii_case("DescribeLayer") {
        Some(BindKind::DescribeLayer)
    } else {
        None
    };

    if let Some(kind) = bind_kind {
        return run(map, version, exceptions, backends, |map, backends| {
            bind_map_request(map, version, params, backends, kind)?;
            match kind {
                BindKind::GetMap => get_map(map, version, params, backends),
                BindKind::GetFeatureInfo => get_feature_info(map, version, params, backends),
                BindKind::DescribeLayer => describe_layer(map, params),
            }
        });
    }

    // an unrecognised operation on an explicit WMS request
    if service.is_some() {
        return fail(
            map,
            Some(version),
            exceptions,
            WmsError::Other("Incomplete or unsupported WMS request".to_string()),
            backends,
        );
    }
    Dispatch::NotWms
}

fn run(
    map: &mut MapConfig,
    version: WmsVersion,
    exceptions: Option<ExceptionFormat>,
    backends: &Backends<'_>,
    handler: impl FnOnce(&mut MapConfig, &Backends<'_>) -> Result<WmsResponse, WmsError>,
) -> Dispatch {
    match handler(map, backends) {
        Ok(response) => Dispatch::Response(response),
        Err(err) => fail(map, Some(version), exceptions, err, backends),
    }
}

fn fail(
    map: &MapConfig,
    version: Option<WmsVersion>,
    exceptions: Option<ExceptionFormat>,
    err: WmsError,
    backends: &Backends<'_>,
) -> Dispatch {
    info!(code = ?err.ogc_code(), error = %err, "WMS exception");
    Dispatch::Response(exception_response(
        map,
        version,
        exceptions,
        &err,
        backends.renderer,
    ))
}
