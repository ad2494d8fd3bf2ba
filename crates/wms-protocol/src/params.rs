//! Decoded request parameters.

/// The ordered `(name, value)` parameter list of one request.
///
/// Parameter names are matched case-insensitively; when a name repeats, the
/// last occurrence wins, matching classic CGI parameter scanning. Values are
/// kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    entries: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Last value registered under `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get), but empty values count as absent.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate entries in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        RequestParams {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_last_wins() {
        let params: RequestParams =
            vec![("Layers", "a"), ("WIDTH", "10"), ("layers", "b")]
                .into_iter()
                .collect();
        assert_eq!(params.get("LAYERS"), Some("b"));
        assert_eq!(params.get("width"), Some("10"));
        assert_eq!(params.get("height"), None);
    }

    #[test]
    fn test_empty_values() {
        let params: RequestParams = vec![("TIME", "")].into_iter().collect();
        assert!(params.contains("time"));
        assert_eq!(params.get_non_empty("time"), None);
    }
}
