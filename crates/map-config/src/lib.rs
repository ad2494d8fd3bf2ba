//! The map configuration tree shared by every carto-wms request.
//!
//! A `MapConfig` is parsed once at startup and deep-copied per request with
//! [`MapConfig::clone_for_request`], so operation handlers are free to mutate
//! layer statuses, extents and output formats without touching the master
//! configuration.

pub mod class;
pub mod copy;
pub mod error;
pub mod expression;
pub mod hashtable;
pub mod layer;
pub mod map;
pub mod outputformat;
pub mod projection;
pub mod rect;
pub mod style;
pub mod units;

pub use class::Class;
pub use error::{ConfigError, ConfigResult};
pub use expression::{Expression, ExpressionKind};
pub use hashtable::MetadataTable;
pub use layer::{
    ConnectionKind, Join, JoinKind, Layer, LayerStatus, LayerType, ResultCache, ResultMember,
    Shape,
};
pub use map::{
    FontSet, LabelCache, LabelCacheEntry, Legend, MapConfig, QueryMap, QueryMapStyle,
    ReferenceMap, Scalebar, SymbolSet, WebConfig,
};
pub use outputformat::{default_formats, ImageMode, OutputFormat};
pub use projection::{epsg_list, Projection};
pub use rect::Rect;
pub use style::{Color, LabelDef, LabelPosition, StyleDef};
pub use units::Units;
