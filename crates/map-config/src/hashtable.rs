//! Case-insensitive, insertion-ordered metadata tables.
//!
//! WMS-facing descriptors (titles, abstracts, SRS lists, time extents) all
//! live in metadata tables keyed case-insensitively. Insertion order is
//! significant because capabilities emission walks entries in the order the
//! configuration declared them.

/// An ordered string map with case-insensitive keys.
///
/// Keys keep the spelling they were first inserted with; lookups and
/// replacements match case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    entries: Vec<(String, String)>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. A replaced key keeps its original position
    /// and spelling.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Look up `name` under OWS namespace prefixes, first match wins.
    ///
    /// Namespace letters select the prefixes to probe: `M` = wms, `O` = ows,
    /// `F` = wfs, `C` = wcs, `G` = gml. `ows_lookup("MO", "title")` probes
    /// `wms_title` then `ows_title`.
    pub fn ows_lookup(&self, namespaces: &str, name: &str) -> Option<&str> {
        for ns in namespaces.chars() {
            let prefix = match ns {
                'M' => "wms",
                'O' => "ows",
                'F' => "wfs",
                'C' => "wcs",
                'G' => "gml",
                _ => continue,
            };
            if let Some(value) = self.get(&format!("{}_{}", prefix, name)) {
                return Some(value);
            }
        }
        None
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = MetadataTable::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut t = MetadataTable::new();
        t.set("WMS_Title", "Roads");
        assert_eq!(t.get("wms_title"), Some("Roads"));
        assert_eq!(t.get("WMS_TITLE"), Some("Roads"));
        assert_eq!(t.get("wms_abstract"), None);
    }

    #[test]
    fn test_replace_keeps_position_and_spelling() {
        let mut t = MetadataTable::new();
        t.set("a", "1");
        t.set("b", "2");
        t.set("A", "3");
        let entries: Vec<_> = t.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_ows_namespace_probing() {
        let mut t = MetadataTable::new();
        t.set("ows_title", "fallback");
        assert_eq!(t.ows_lookup("MO", "title"), Some("fallback"));
        t.set("wms_title", "primary");
        assert_eq!(t.ows_lookup("MO", "title"), Some("primary"));
        assert_eq!(t.ows_lookup("F", "title"), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let t: MetadataTable = vec![("z", "1"), ("a", "2"), ("m", "3")]
            .into_iter()
            .collect();
        let keys: Vec<_> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
