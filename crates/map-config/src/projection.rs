//! Projection definitions.
//!
//! A projection is a list of PROJ-style arguments plus a resolved form that
//! is rebuilt whenever the arguments change or the owning object is copied.
//! A zero-argument projection is valid and means "unspecified".

use crate::error::{ConfigError, ConfigResult};
use crate::hashtable::MetadataTable;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    args: Vec<String>,
    /// Normalized lowercase parameter string, present once resolved.
    resolved: Option<String>,
}

impl Projection {
    /// An unspecified projection (zero arguments).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build and resolve a projection from a definition string.
    ///
    /// Accepts either a single `init=epsg:<code>` / `AUTO:...` argument or a
    /// `+`-prefixed parameter list (`+proj=utm +zone=15 +datum=WGS84`).
    pub fn from_definition(definition: &str) -> ConfigResult<Self> {
        let mut proj = Projection::empty();
        proj.load(definition)?;
        Ok(proj)
    }

    /// Replace the argument list from a definition string and resolve it.
    pub fn load(&mut self, definition: &str) -> ConfigResult<()> {
        let definition = definition.trim();
        if definition.is_empty() {
            return Err(ConfigError::InvalidProjection(
                "empty projection definition".to_string(),
            ));
        }

        self.args = if definition.starts_with('+') {
            definition
                .split_whitespace()
                .map(|tok| tok.trim_start_matches('+').to_string())
                .collect()
        } else {
            vec![definition.to_string()]
        };
        self.resolve()
    }

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    pub fn is_set(&self) -> bool {
        !self.args.is_empty()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The full definition string, suitable for loading into another
    /// projection.
    pub fn definition(&self) -> Option<String> {
        if self.args.is_empty() {
            return None;
        }
        if self.args.len() == 1 && !self.args[0].contains('=') {
            return Some(self.args[0].clone());
        }
        if self.args.len() == 1
            && (self.args[0].to_ascii_lowercase().starts_with("init=")
                || self.args[0].to_ascii_lowercase().starts_with("auto:"))
        {
            return Some(self.args[0].clone());
        }
        Some(
            self.args
                .iter()
                .map(|a| format!("+{}", a))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Rebuild the resolved form from the argument list.
    ///
    /// Fails on malformed arguments, e.g. a non-numeric EPSG code. An empty
    /// argument list resolves to nothing and succeeds.
    pub fn resolve(&mut self) -> ConfigResult<()> {
        if self.args.is_empty() {
            self.resolved = None;
            return Ok(());
        }
        for arg in &self.args {
            if arg.trim().is_empty() {
                return Err(ConfigError::InvalidProjection(
                    "blank projection argument".to_string(),
                ));
            }
            let lower = arg.to_ascii_lowercase();
            if let Some(code) = lower.strip_prefix("init=epsg:") {
                if code.parse::<u32>().is_err() {
                    return Err(ConfigError::InvalidProjection(format!(
                        "bad EPSG code in '{}'",
                        arg
                    )));
                }
            }
        }
        let mut normalized: Vec<String> = self.args.iter().map(|a| a.to_ascii_lowercase()).collect();
        normalized.sort();
        self.resolved = Some(normalized.join(" "));
        Ok(())
    }

    /// Copy arguments and rebuild the resolved handle on the copy.
    pub fn clone_rebuilt(&self) -> ConfigResult<Projection> {
        let mut copy = Projection {
            args: self.args.clone(),
            resolved: None,
        };
        copy.resolve()?;
        Ok(copy)
    }

    /// Whether two projections describe different coordinate systems.
    ///
    /// Unresolved projections are compared by raw arguments; two unspecified
    /// projections do not differ.
    pub fn differs_from(&self, other: &Projection) -> bool {
        match (&self.resolved, &other.resolved) {
            (Some(a), Some(b)) => a != b,
            (None, None) => !self.args.is_empty() || !other.args.is_empty(),
            _ => true,
        }
    }

    /// The EPSG code when the projection is a plain `init=epsg:<code>`.
    pub fn epsg_code(&self) -> Option<u32> {
        if self.args.len() != 1 {
            return None;
        }
        self.args[0]
            .to_ascii_lowercase()
            .strip_prefix("init=epsg:")
            .and_then(|code| code.parse().ok())
    }

    /// True for geographic (lon/lat degree) projections.
    pub fn is_geographic(&self) -> bool {
        if self.epsg_code() == Some(4326) || self.epsg_code() == Some(4269) {
            return true;
        }
        self.args
            .iter()
            .any(|a| a.eq_ignore_ascii_case("proj=longlat") || a.eq_ignore_ascii_case("proj=latlong"))
    }
}

/// The advertised EPSG list for an object, `"EPSG:4326 EPSG:3857"` style.
///
/// The `srs` metadata entry wins; otherwise a plain `init=epsg:` projection
/// yields its single code.
pub fn epsg_list<'a>(projection: &Projection, metadata: &'a MetadataTable) -> Option<String> {
    if let Some(srs) = metadata.ows_lookup("MO", "srs") {
        if !srs.trim().is_empty() {
            return Some(srs.trim().to_string());
        }
    }
    projection.epsg_code().map(|code| format!("EPSG:{}", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsg_init() {
        let p = Projection::from_definition("init=epsg:4326").unwrap();
        assert_eq!(p.num_args(), 1);
        assert_eq!(p.epsg_code(), Some(4326));
        assert!(p.is_geographic());
    }

    #[test]
    fn test_plus_parameter_list() {
        let p = Projection::from_definition("+proj=utm +zone=15 +datum=WGS84").unwrap();
        assert_eq!(p.num_args(), 3);
        assert_eq!(p.epsg_code(), None);
        assert_eq!(
            p.definition().as_deref(),
            Some("+proj=utm +zone=15 +datum=WGS84")
        );
    }

    #[test]
    fn test_bad_epsg_code_rejected() {
        assert!(Projection::from_definition("init=epsg:notanumber").is_err());
    }

    #[test]
    fn test_differs() {
        let a = Projection::from_definition("init=epsg:4326").unwrap();
        let b = Projection::from_definition("INIT=EPSG:4326").unwrap();
        let c = Projection::from_definition("init=epsg:3857").unwrap();
        assert!(!a.differs_from(&b));
        assert!(a.differs_from(&c));
        assert!(!Projection::empty().differs_from(&Projection::empty()));
        assert!(a.differs_from(&Projection::empty()));
    }

    #[test]
    fn test_epsg_list_metadata_wins() {
        let p = Projection::from_definition("init=epsg:4326").unwrap();
        let mut md = MetadataTable::new();
        assert_eq!(epsg_list(&p, &md).as_deref(), Some("EPSG:4326"));
        md.set("wms_srs", "EPSG:4326 EPSG:3857");
        assert_eq!(epsg_list(&p, &md).as_deref(), Some("EPSG:4326 EPSG:3857"));
    }
}
