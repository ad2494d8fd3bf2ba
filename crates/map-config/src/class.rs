//! Layer classes.

use crate::expression::Expression;
use crate::hashtable::MetadataTable;
use crate::style::{LabelDef, StyleDef};

/// A thematic class within a layer.
///
/// Classes are ordered; rendering stops at the first class whose expression
/// matches a feature. `layer` is the index of the owning layer inside the
/// map configuration. Copies go through
/// [`Class::clone_into_layer`](crate::copy) so expressions start uncompiled.
#[derive(Debug, Default, PartialEq)]
pub struct Class {
    pub layer: usize,
    pub name: Option<String>,
    pub title: Option<String>,
    /// Style-group label selected through the WMS STYLES parameter.
    pub group: Option<String>,
    pub enabled: bool,
    pub expression: Expression,
    pub text: Expression,
    pub styles: Vec<StyleDef>,
    pub label: LabelDef,
    pub keyimage: Option<String>,
    pub template: Option<String>,
    pub metadata: MetadataTable,
    pub min_scale_denom: f64,
    pub max_scale_denom: f64,
    pub debug: bool,
}

impl Class {
    pub fn named(name: &str) -> Self {
        Class {
            name: Some(name.to_string()),
            enabled: true,
            min_scale_denom: -1.0,
            max_scale_denom: -1.0,
            ..Class::default()
        }
    }
}
