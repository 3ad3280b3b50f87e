//! Field path patterns - compile once, match many
//!
//! A pattern is an ordered list of key segments describing a path into
//! nested maps, e.g. `a.b`, `$log['nested']['key']`. Compiled patterns are
//! immutable and shared read-only across every document evaluated against
//! them.

use contracts::{ContractError, StructuredValue};
use thiserror::Error;

/// A pattern string that failed to compile.
#[derive(Debug, Error)]
#[error("invalid path pattern '{pattern}': {message}")]
pub struct CompileError {
    pub pattern: String,
    pub message: String,
}

impl CompileError {
    fn new(pattern: &str, message: impl Into<String>) -> Self {
        Self {
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }
}

impl From<CompileError> for ContractError {
    fn from(e: CompileError) -> Self {
        ContractError::pattern_compile(e.pattern, e.message)
    }
}

/// One compiled field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<String>,
}

impl PathPattern {
    /// Compile a single pattern string.
    ///
    /// Accepted forms: dot-separated segments (`a.b.c`), an optional leading
    /// `$`, and bracketed quoted segments (`$a['b']["c"]`).
    pub fn compile(pattern: &str) -> Result<Self, CompileError> {
        let segments = parse_segments(pattern)?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve this pattern against a document.
    ///
    /// Returns a fresh [`MatchState`]; nothing is cached between calls. The
    /// path records the pair index at every nesting level, so `path[0]`
    /// identifies the start key and `path.last()` the terminal pair.
    pub fn resolve(&self, doc: &StructuredValue) -> MatchState {
        let mut path = Vec::with_capacity(self.segments.len());
        let mut current = doc;

        for segment in &self.segments {
            let Some(pairs) = current.as_map() else {
                return MatchState::unmatched();
            };
            let found = pairs
                .iter()
                .enumerate()
                .find(|(_, (k, _))| k.as_str() == Some(segment.as_str()));
            let Some((idx, (_, value))) = found else {
                return MatchState::unmatched();
            };
            path.push(idx);
            current = value;
        }

        MatchState {
            matched: true,
            path,
        }
    }
}

/// Result of resolving one pattern against one document.
///
/// Recomputed from scratch on every evaluation; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    /// Whether the full path resolved
    pub matched: bool,
    /// Pair index per nesting level, terminal pair last
    pub path: Vec<usize>,
}

impl MatchState {
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            path: Vec::new(),
        }
    }

    /// Index of the top-level pair where the matched chain starts.
    pub fn start_key(&self) -> Option<usize> {
        if self.matched {
            self.path.first().copied()
        } else {
            None
        }
    }
}

/// An immutable set of compiled patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<PathPattern>,
}

impl PatternSet {
    /// Compile every pattern string, all-or-nothing.
    ///
    /// If any string fails, the whole set construction fails and the
    /// already-compiled patterns are dropped.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, CompileError> {
        let compiled = patterns
            .iter()
            .map(|p| PathPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns: compiled })
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn parse_segments(pattern: &str) -> Result<Vec<String>, CompileError> {
    let input = pattern.strip_prefix('$').unwrap_or(pattern);
    if input.is_empty() {
        return Err(CompileError::new(pattern, "empty pattern"));
    }

    let mut segments = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut current = String::new();

    while let Some((_, c)) = chars.next() {
        match c {
            '.' => {
                if current.is_empty() {
                    return Err(CompileError::new(pattern, "empty segment"));
                }
                segments.push(std::mem::take(&mut current));
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                } else if segments.is_empty() {
                    return Err(CompileError::new(pattern, "bracket before first segment"));
                }
                let quote = match chars.next() {
                    Some((_, q @ ('\'' | '"'))) => q,
                    _ => return Err(CompileError::new(pattern, "expected quoted segment")),
                };
                let mut segment = String::new();
                loop {
                    match chars.next() {
                        Some((_, c)) if c == quote => break,
                        Some((_, c)) => segment.push(c),
                        None => return Err(CompileError::new(pattern, "unterminated segment")),
                    }
                }
                if segment.is_empty() {
                    return Err(CompileError::new(pattern, "empty segment"));
                }
                match chars.next() {
                    Some((_, ']')) => segments.push(segment),
                    _ => return Err(CompileError::new(pattern, "expected closing bracket")),
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    } else if segments.is_empty() || pattern.ends_with('.') {
        return Err(CompileError::new(pattern, "empty segment"));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StructuredValue as V;

    #[test]
    fn test_compile_dotted() {
        let p = PathPattern::compile("a.b.c").unwrap();
        assert_eq!(p.segments(), &["a", "b", "c"]);
    }

    #[test]
    fn test_compile_accessor_style() {
        let p = PathPattern::compile("$log['nested'][\"key\"]").unwrap();
        assert_eq!(p.segments(), &["log", "nested", "key"]);
    }

    #[test]
    fn test_compile_single_segment() {
        let p = PathPattern::compile("$key").unwrap();
        assert_eq!(p.segments(), &["key"]);
    }

    #[test]
    fn test_compile_rejects_malformed() {
        assert!(PathPattern::compile("").is_err());
        assert!(PathPattern::compile("$").is_err());
        assert!(PathPattern::compile("a..b").is_err());
        assert!(PathPattern::compile("a.").is_err());
        assert!(PathPattern::compile("$a['b'").is_err());
        assert!(PathPattern::compile("$a[b]").is_err());
        assert!(PathPattern::compile("$a['']").is_err());
    }

    #[test]
    fn test_set_compile_all_or_nothing() {
        let err = PatternSet::compile(&["a.b", "a..", "c"]).unwrap_err();
        assert_eq!(err.pattern, "a..");

        let set = PatternSet::compile(&["a.b", "c"]).unwrap();
        assert_eq!(set.patterns().len(), 2);
    }

    #[test]
    fn test_resolve_nested() {
        let doc = V::map(vec![
            ("x", V::Int(1)),
            ("a", V::map(vec![("b", V::Int(2)), ("c", V::Int(3))])),
        ]);

        let state = PathPattern::compile("a.b").unwrap().resolve(&doc);
        assert!(state.matched);
        assert_eq!(state.path, vec![1, 0]);
        assert_eq!(state.start_key(), Some(1));
    }

    #[test]
    fn test_resolve_miss() {
        let doc = V::map(vec![("a", V::map(vec![("b", V::Int(2))]))]);

        let state = PathPattern::compile("a.z").unwrap().resolve(&doc);
        assert!(!state.matched);
        assert!(state.path.is_empty());
        assert_eq!(state.start_key(), None);

        // path longer than the nesting
        let state = PathPattern::compile("a.b.c").unwrap().resolve(&doc);
        assert!(!state.matched);
    }

    #[test]
    fn test_resolve_duplicate_keys_first_wins() {
        let doc = V::Map(vec![
            (V::str("k"), V::map(vec![("sub", V::Int(1))])),
            (V::str("k"), V::map(vec![("sub", V::Int(2))])),
        ]);

        let state = PathPattern::compile("k.sub").unwrap().resolve(&doc);
        assert_eq!(state.path, vec![0, 0]);
    }
}
