use crate::error::DiffError;
use glob::{MatchOptions, Pattern};

// `*` must not cross directory boundaries, otherwise `*.rs` would also match
// nested files and the root/recursive pattern pair would be meaningless.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Expand a free-form extension list into glob patterns.
///
/// Tokens are separated by commas, semicolons or whitespace. A token that
/// already contains `**` or `/` is an explicit pattern and is kept as is.
/// Anything else is treated as an extension: leading `*` and `.` are removed
/// and both `*.ext` (top level) and `**/*.ext` (any depth) are produced.
///
/// `"rs, .toml"` → `["*.rs", "**/*.rs", "*.toml", "**/*.toml"]`
pub fn expand_patterns(input: &str) -> Vec<String> {
    let mut patterns: Vec<String> = Vec::new();
    let mut add = |pattern: String| {
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    };

    for token in input.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if token.contains("**") || token.contains('/') {
            add(token.to_string());
            continue;
        }
        let ext = token.trim_start_matches(['*', '.']);
        if ext.is_empty() {
            continue;
        }
        add(format!("*.{ext}"));
        add(format!("**/*.{ext}"));
    }
    patterns
}

/// Compiled extension filter. An empty filter lets every path through.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    patterns: Vec<Pattern>,
}

impl ExtensionFilter {
    /// Expand and compile `input`. Fails on the first pattern glob rejects.
    pub fn parse(input: &str) -> Result<Self, DiffError> {
        let patterns = expand_patterns(input)
            .into_iter()
            .map(|p| {
                Pattern::new(&p).map_err(|source| DiffError::InvalidPattern { pattern: p, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Pattern::as_str)
    }

    /// Whether a repository-relative path passes the filter.
    pub fn matches(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let path = path.replace('\\', "/");
        let path = path.trim_start_matches("./");
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}
