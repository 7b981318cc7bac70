use super::status::git_output;
use std::path::PathBuf;

/// Supplies file contents for either side of a diff.
///
/// `None` means the content is unavailable (missing at that revision, or the
/// lookup failed); callers degrade rather than error.
pub trait ContentSource: Sync {
    fn content_at_revision(&self, revision: &str, path: &str) -> Option<String>;
    fn working_content(&self, path: &str) -> Option<String>;
}

/// One way of looking up content. A strategy only implements the lookups it
/// supports; the rest default to `None`.
pub trait ContentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn at_revision(&self, _revision: &str, _path: &str) -> Option<String> {
        None
    }

    fn working(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Tries each strategy in order and returns the first hit.
pub struct ContentResolver {
    strategies: Vec<Box<dyn ContentStrategy>>,
}

impl ContentResolver {
    pub fn new(strategies: Vec<Box<dyn ContentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Default chain for a local repository: git objects for revisions, the
    /// filesystem for the working tree with the index as a fallback.
    pub fn for_repo(repo_root: &str) -> Self {
        Self::new(vec![
            Box::new(GitObjectStrategy::new(repo_root)),
            Box::new(WorkTreeStrategy::new(repo_root)),
            Box::new(IndexStrategy::new(repo_root)),
        ])
    }

    fn first_hit<F>(&self, what: &str, lookup: F) -> Option<String>
    where
        F: Fn(&dyn ContentStrategy) -> Option<String>,
    {
        for strategy in &self.strategies {
            match lookup(strategy.as_ref()) {
                Some(content) => return Some(content),
                None => log::debug!("{}: {} had nothing", what, strategy.name()),
            }
        }
        None
    }
}

impl ContentSource for ContentResolver {
    fn content_at_revision(&self, revision: &str, path: &str) -> Option<String> {
        self.first_hit(&format!("{revision}:{path}"), |s| s.at_revision(revision, path))
    }

    fn working_content(&self, path: &str) -> Option<String> {
        self.first_hit(path, |s| s.working(path))
    }
}

// ── Strategies ──

/// `git show <rev>:<path>`
pub struct GitObjectStrategy {
    repo_root: String,
}

impl GitObjectStrategy {
    pub fn new(repo_root: &str) -> Self {
        Self {
            repo_root: repo_root.to_string(),
        }
    }
}

impl ContentStrategy for GitObjectStrategy {
    fn name(&self) -> &'static str {
        "git object"
    }

    fn at_revision(&self, revision: &str, path: &str) -> Option<String> {
        let object = format!("{revision}:{path}");
        git_output(&self.repo_root, &["show", "--no-textconv", &object])
            .ok()
            .map(|out| String::from_utf8_lossy(&out).into_owned())
    }
}

/// Reads the file from the working tree
pub struct WorkTreeStrategy {
    root: PathBuf,
}

impl WorkTreeStrategy {
    pub fn new(repo_root: &str) -> Self {
        Self {
            root: PathBuf::from(repo_root),
        }
    }
}

impl ContentStrategy for WorkTreeStrategy {
    fn name(&self) -> &'static str {
        "work tree"
    }

    fn working(&self, path: &str) -> Option<String> {
        std::fs::read(self.root.join(path))
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// `git show :<path>`: the staged copy, for files not readable on disk
pub struct IndexStrategy {
    repo_root: String,
}

impl IndexStrategy {
    pub fn new(repo_root: &str) -> Self {
        Self {
            repo_root: repo_root.to_string(),
        }
    }
}

impl ContentStrategy for IndexStrategy {
    fn name(&self) -> &'static str {
        "index"
    }

    fn working(&self, path: &str) -> Option<String> {
        let object = format!(":{path}");
        git_output(&self.repo_root, &["show", &object])
            .ok()
            .map(|out| String::from_utf8_lossy(&out).into_owned())
    }
}
