//! Class and filter expressions.

/// How an expression string is interpreted at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpressionKind {
    /// Plain string comparison against the class item.
    #[default]
    String,
    /// Regular expression match.
    Regex,
    /// Parsed logical expression over feature attributes.
    Logical,
}

/// An expression plus its lazily-built evaluation state.
///
/// `compiled` is runtime state: copies always start uncompiled so the
/// evaluator rebuilds its internal form on first use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub string: Option<String>,
    pub kind: ExpressionKind,
    pub compiled: bool,
}

impl Expression {
    pub fn new(string: impl Into<String>, kind: ExpressionKind) -> Self {
        Self {
            string: Some(string.into()),
            kind,
            compiled: false,
        }
    }

    pub fn is_set(&self) -> bool {
        self.string.is_some()
    }

    /// Copy the string and kind only; the copy starts uncompiled.
    pub fn clone_uncompiled(&self) -> Expression {
        Expression {
            string: self.string.clone(),
            kind: self.kind,
            compiled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_resets_compiled() {
        let mut e = Expression::new("([pop] > 1000)", ExpressionKind::Logical);
        e.compiled = true;
        let copy = e.clone_uncompiled();
        assert!(!copy.compiled);
        assert_eq!(copy.string.as_deref(), Some("([pop] > 1000)"));
        assert_eq!(copy.kind, ExpressionKind::Logical);
    }
}
