use thiserror::Error;

/// Errors raised by the diff engine itself.
///
/// Collaborator failures (git, config files) are not represented here: missing
/// content is modelled as `None` and glue code uses `anyhow`.
#[derive(Debug, Error)]
pub enum DiffError {
    /// Every candidate file was filtered out, unchanged or unavailable.
    #[error("no changes found ({excluded} file(s) excluded or skipped)")]
    NoChanges { excluded: usize },

    #[error("invalid extension pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The hunk assembler produced a hunk whose header disagrees with its lines.
    /// This is a bug, not an environmental condition.
    #[error("hunk invariant violated: {0}")]
    HunkInvariant(String),
}
