//! OGC WMS protocol implementation.
//!
//! Supports WMS 1.0.0, 1.0.7, 1.1.0 and 1.1.1 over a single query-string
//! endpoint: GetCapabilities, GetMap, GetFeatureInfo, DescribeLayer,
//! GetLegendGraphic and GetStyles, plus OGC Service Exception reports in
//! their XML and in-image renditions.
//!
//! The crate is synchronous; [`dispatch`] consumes a decoded parameter list
//! and a per-request copy of the map configuration, and produces a complete
//! [`WmsResponse`] (or the not-a-WMS sentinel the host uses to hand the
//! request to another service).

pub mod binder;
pub mod capabilities;
pub mod context;
pub mod contracts;
pub mod describelayer;
pub mod dispatcher;
pub mod error;
pub mod exceptions;
pub mod featureinfo;
pub mod getmap;
pub mod getstyles;
pub mod legend;
pub mod params;
pub mod response;
pub mod time;
pub mod version;
pub mod xml;

pub use binder::{bind_map_request, BindKind};
pub use contracts::{
    BackendError, Backends, GmlWriter, Projector, QueryEngine, QueryMode, QueryOutcome,
    RenderMode, RenderedImage, Renderer, SldEngine,
};
pub use dispatcher::{dispatch, Dispatch};
pub use error::{WmsError, WmsResult};
pub use exceptions::{exception_response, ExceptionFormat};
pub use params::RequestParams;
pub use response::WmsResponse;
pub use version::WmsVersion;
pub use xml::{decode_html_entities, encode_html_entities};
