use anyhow::{Context, Result};
use serde::Serialize;
use std::process::Command;

/// File change status in git
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "from", rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed(String), // old path
    Copied(String),  // source path
    Untracked,
}

impl FileStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            FileStatus::Added => "+",
            FileStatus::Modified => "~",
            FileStatus::Deleted => "-",
            FileStatus::Renamed(_) => "R",
            FileStatus::Copied(_) => "C",
            FileStatus::Untracked => "?",
        }
    }

    /// Path the old side of the diff is read from, if it differs from the new path
    pub fn original_path(&self) -> Option<&str> {
        match self {
            FileStatus::Renamed(from) | FileStatus::Copied(from) => Some(from),
            _ => None,
        }
    }
}

/// One changed file as reported by the repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
}

impl FileChange {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

// ── Running git ──

/// Run git in `repo_root` and return raw stdout, failing on a non-zero exit.
pub(crate) fn git_output(repo_root: &str, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(output.stdout)
}

/// Get the repository root directory for a specific path
pub fn get_repo_root_in(dir: &str) -> Result<String> {
    let out = git_output(dir, &["rev-parse", "--show-toplevel"])
        .with_context(|| format!("Not a git repository: {}", dir))?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// Auto-detect the base revision by checking upstream tracking, then falling
/// back to common branch names, and finally to `HEAD`.
pub fn detect_base_branch_in(repo_root: &str) -> String {
    let run = |args: &[&str]| -> Option<String> {
        git_output(repo_root, args)
            .ok()
            .map(|out| String::from_utf8_lossy(&out).trim().to_string())
    };

    let current = run(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();

    // Upstream tracking branch
    if let Some(upstream) = run(&["rev-parse", "--abbrev-ref", "@{upstream}"]) {
        if let Some(branch) = upstream.rsplit('/').next() {
            if branch != current && !branch.is_empty() {
                if run(&["rev-parse", "--verify", branch]).is_some() {
                    return branch.to_string();
                }
                if run(&["rev-parse", "--verify", &upstream]).is_some() {
                    return upstream;
                }
            }
        }
    }

    for candidate in ["main", "master", "develop", "dev"] {
        if candidate != current && run(&["rev-parse", "--verify", candidate]).is_some() {
            return candidate.to_string();
        }
    }

    for candidate in ["origin/main", "origin/master", "origin/develop"] {
        if run(&["rev-parse", "--verify", candidate]).is_some() {
            return candidate.to_string();
        }
    }

    log::debug!("no base branch found in {}, comparing against HEAD", repo_root);
    "HEAD".to_string()
}

/// List changes between `base` and `head`, or between `base` and the working
/// tree (untracked files included) when `head` is `None`.
pub fn list_changes(repo_root: &str, base: &str, head: Option<&str>) -> Result<Vec<FileChange>> {
    let mut args = vec!["diff", "--name-status", "-M", "-z", "--no-ext-diff", base];
    if let Some(head) = head {
        args.push(head);
    }
    args.push("--");
    let raw = git_output(repo_root, &args)?;
    let mut changes = parse_name_status(&String::from_utf8_lossy(&raw));

    if head.is_none() {
        let raw = git_output(repo_root, &["ls-files", "--others", "--exclude-standard", "-z"])?;
        changes.extend(parse_untracked(&String::from_utf8_lossy(&raw)));
    }
    Ok(changes)
}

/// Parse `git diff --name-status -z` output.
///
/// Records are NUL separated: a status token followed by one path, or two
/// paths (source, destination) for renames and copies.
pub fn parse_name_status(raw: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    let mut fields = raw.split('\0').filter(|f| !f.is_empty());

    while let Some(code) = fields.next() {
        let Some(kind) = code.chars().next() else {
            continue;
        };
        let change = match kind {
            'R' | 'C' => {
                let (Some(from), Some(to)) = (fields.next(), fields.next()) else {
                    log::warn!("truncated name-status record '{}'", code);
                    break;
                };
                let status = if kind == 'R' {
                    FileStatus::Renamed(from.to_string())
                } else {
                    FileStatus::Copied(from.to_string())
                };
                FileChange::new(to, status)
            }
            _ => {
                let Some(path) = fields.next() else {
                    log::warn!("truncated name-status record '{}'", code);
                    break;
                };
                let status = match kind {
                    'A' => FileStatus::Added,
                    'D' => FileStatus::Deleted,
                    // Type changes and unmerged paths are diffed as content edits
                    'M' | 'T' | 'U' => FileStatus::Modified,
                    _ => {
                        log::debug!("skipping {} with unsupported status '{}'", path, code);
                        continue;
                    }
                };
                FileChange::new(path, status)
            }
        };
        changes.push(change);
    }
    changes
}

/// Parse `git ls-files --others -z` output into untracked changes.
pub fn parse_untracked(raw: &str) -> Vec<FileChange> {
    raw.split('\0')
        .filter(|p| !p.is_empty())
        .map(|p| FileChange::new(p, FileStatus::Untracked))
        .collect()
}
