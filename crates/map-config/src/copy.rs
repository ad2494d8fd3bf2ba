//! The deep-copy graph for the configuration tree.
//!
//! Every request is served from its own copy of the master configuration so
//! handlers can mutate statuses, extents and formats freely. Each entity has
//! an explicit copy contract instead of a blanket `Clone`:
//!
//! - scalar fields and owned strings are copied verbatim;
//! - expressions lose their `compiled` flag;
//! - projections rebuild their resolved handle from the argument list, and a
//!   rebuild failure aborts the whole copy;
//! - output formats are deep-cloned into fresh `Arc`s and the active format
//!   is re-selected by name, so the copy never aliases the source registry;
//! - runtime state (`items`, `opened`, result caches, the label cache, the
//!   selected time pattern) is never carried over.

use std::sync::Arc;

use crate::class::Class;
use crate::error::{ConfigError, ConfigResult};
use crate::layer::{Join, Layer};
use crate::map::{LabelCache, MapConfig};

impl Class {
    /// Copy this class for the layer at `layer` in the destination map.
    pub fn clone_into_layer(&self, layer: usize) -> Class {
        Class {
            layer,
            name: self.name.clone(),
            title: self.title.clone(),
            group: self.group.clone(),
            enabled: self.enabled,
            expression: self.expression.clone_uncompiled(),
            text: self.text.clone_uncompiled(),
            styles: self.styles.clone(),
            label: self.label.clone(),
            keyimage: self.keyimage.clone(),
            template: self.template.clone(),
            metadata: self.metadata.clone(),
            min_scale_denom: self.min_scale_denom,
            max_scale_denom: self.max_scale_denom,
            debug: self.debug,
        }
    }
}

fn clone_join(src: &Join) -> Join {
    // items/values are runtime additions, so a plain field copy is the whole
    // contract; the driver handle is not represented at all.
    src.clone()
}

impl Layer {
    /// Copy this layer for a new request.
    ///
    /// `items`, the open flag and the result cache start empty on the copy;
    /// they are rebuilt by the data source when the layer is opened.
    pub fn clone_for_request(&self) -> ConfigResult<Layer> {
        let projection = self
            .projection
            .clone_rebuilt()
            .map_err(|e| ConfigError::while_copying("layer projection", e))?;

        Ok(Layer {
            index: self.index,
            name: self.name.clone(),
            group: self.group.clone(),
            status: self.status,
            kind: self.kind,
            connection: self.connection.clone(),
            connection_kind: self.connection_kind,
            data: self.data.clone(),
            template: self.template.clone(),
            header: self.header.clone(),
            footer: self.footer.clone(),
            classitem: self.classitem.clone(),
            classgroup: self.classgroup.clone(),
            classes: self
                .classes
                .iter()
                .map(|c| c.clone_into_layer(self.index))
                .collect(),
            joins: self.joins.iter().map(clone_join).collect(),
            features: self.features.clone(),
            processing: self.processing.clone(),
            metadata: self.metadata.clone(),
            projection,
            transform: self.transform,
            project: self.project,
            extent: self.extent,
            min_scale_denom: self.min_scale_denom,
            max_scale_denom: self.max_scale_denom,
            symbol_scale_denom: self.symbol_scale_denom,
            scale_factor: self.scale_factor,
            size_units: self.size_units,
            tolerance: self.tolerance,
            tolerance_units: self.tolerance_units,
            opacity: self.opacity,
            max_features: self.max_features,
            filter: self.filter.clone_uncompiled(),
            filter_item: self.filter_item.clone(),
            style_item: self.style_item.clone(),
            label_item: self.label_item.clone(),
            tile_item: self.tile_item.clone(),
            tile_index: self.tile_index.clone(),
            requires: self.requires.clone(),
            label_requires: self.label_requires.clone(),
            dump: self.dump,
            debug: self.debug,
            items: Vec::new(),
            opened: false,
            result_cache: None,
        })
    }
}

impl MapConfig {
    /// Deep-copy the whole configuration tree for one request.
    pub fn clone_for_request(&self) -> ConfigResult<MapConfig> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            layers.push(
                layer
                    .clone_for_request()
                    .map_err(|e| ConfigError::while_copying("layer", e))?,
            );
        }

        let projection = self
            .projection
            .clone_rebuilt()
            .map_err(|e| ConfigError::while_copying("map projection", e))?;

        // Rebuild the format registry from deep clones, then re-point the
        // active format at the copy's own registry by name.
        let output_formats: Vec<Arc<crate::OutputFormat>> = self
            .output_formats
            .iter()
            .map(|f| Arc::new((**f).clone()))
            .collect();
        let output_format = output_formats
            .iter()
            .find(|f| f.matches(&self.imagetype))
            .or_else(|| {
                output_formats
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(&self.output_format.name))
            })
            .cloned()
            .ok_or(ConfigError::NoFormats)?;

        Ok(MapConfig {
            name: self.name.clone(),
            enabled: self.enabled,
            width: self.width,
            height: self.height,
            max_size: self.max_size,
            extent: self.extent,
            cellsize: self.cellsize,
            units: self.units,
            scale_denom: self.scale_denom,
            resolution: self.resolution,
            shapepath: self.shapepath.clone(),
            mappath: self.mappath.clone(),
            image_color: self.image_color,
            imagetype: self.imagetype.clone(),
            output_formats,
            output_format,
            projection,
            layers,
            layer_order: self.layer_order.clone(),
            reference: self.reference.clone(),
            scalebar: self.scalebar.clone(),
            legend: self.legend.clone(),
            query_map: self.query_map.clone(),
            web: self.web.clone(),
            fontset: self.fontset.clone(),
            symbolset: self.symbolset.clone(),
            label_cache: LabelCache::default(),
            config_options: self.config_options.clone(),
            debug: self.debug,
            time_pattern: None,
        })
    }
}
