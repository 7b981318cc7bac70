use super::status::{list_changes, FileChange};
use anyhow::Result;
use std::time::{Duration, Instant};

/// Enumerates the changed files of a repository
pub trait ChangeLister {
    fn list_changes(&self, base: &str, head: Option<&str>) -> Result<Vec<FileChange>>;
}

/// `ChangeLister` backed by the git command line
pub struct GitChangeLister {
    repo_root: String,
}

impl GitChangeLister {
    pub fn new(repo_root: &str) -> Self {
        Self {
            repo_root: repo_root.to_string(),
        }
    }
}

impl ChangeLister for GitChangeLister {
    fn list_changes(&self, base: &str, head: Option<&str>) -> Result<Vec<FileChange>> {
        list_changes(&self.repo_root, base, head)
    }
}

/// Remembers the last change listing for a diff range and reuses it while it
/// is younger than the freshness window.
pub struct RepoCache<L: ChangeLister> {
    lister: L,
    base: String,
    head: Option<String>,
    max_age: Duration,
    cached: Option<(Instant, Vec<FileChange>)>,
}

impl<L: ChangeLister> RepoCache<L> {
    pub fn new(lister: L, base: &str, head: Option<&str>, max_age: Duration) -> Self {
        Self {
            lister,
            base: base.to_string(),
            head: head.map(str::to_string),
            max_age,
            cached: None,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Changed files, refreshed only when the cached listing is stale.
    pub fn changes(&mut self) -> Result<&[FileChange]> {
        let stale = match &self.cached {
            Some((fetched_at, _)) => fetched_at.elapsed() >= self.max_age,
            None => true,
        };
        if stale {
            self.refresh()?;
        }
        Ok(self.cached.as_ref().map(|(_, c)| c.as_slice()).unwrap_or(&[]))
    }

    /// Re-list changes now, regardless of age.
    pub fn refresh(&mut self) -> Result<()> {
        let changes = self.lister.list_changes(&self.base, self.head.as_deref())?;
        log::debug!("listed {} changed file(s) against {}", changes.len(), self.base);
        self.cached = Some((Instant::now(), changes));
        Ok(())
    }
}
