use crate::diff::{render_file_diff, FileDiffRequest, FileState};
use crate::error::DiffError;
use crate::filter::ExtensionFilter;
use crate::git::{ContentSource, FileChange, FileStatus};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Knobs for a diff run
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub context_lines: usize,
    pub exclude_deletes: bool,
    pub extension_filter: ExtensionFilter,
    /// Files larger than this on either side are left out
    pub max_file_bytes: Option<usize>,
    /// Time budget for computing a minimal edit script per file
    pub diff_timeout: Option<Duration>,
    /// Concurrent content lookups; 0 picks the number of CPUs
    pub jobs: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context_lines: 3,
            exclude_deletes: false,
            extension_filter: ExtensionFilter::default(),
            max_file_bytes: None,
            diff_timeout: None,
            jobs: 0,
        }
    }
}

/// What is being compared: `base` against `head`, or against the working
/// tree when `head` is `None`.
#[derive(Debug, Clone, Copy)]
pub struct DiffRange<'a> {
    pub base: &'a str,
    pub head: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Deleted while deletions are excluded
    Deleted,
    /// Path does not match the extension filter
    ExtensionFilter,
    Binary,
    TooLarge,
    /// No content could be retrieved for either side
    Unavailable,
    /// Both sides are identical
    Unchanged,
}

impl ExclusionReason {
    pub fn describe(self) -> &'static str {
        match self {
            ExclusionReason::Deleted => "deleted (excluded)",
            ExclusionReason::ExtensionFilter => "filtered by extension",
            ExclusionReason::Binary => "binary",
            ExclusionReason::TooLarge => "too large",
            ExclusionReason::Unavailable => "content unavailable",
            ExclusionReason::Unchanged => "no textual changes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub path: String,
    pub reason: ExclusionReason,
}

/// Result of a diff run
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    /// Concatenated unified diff, files separated by one blank line
    pub diff: String,
    /// Files that made it into `diff`, in order
    pub files: Vec<FileChange>,
    pub excluded: Vec<Exclusion>,
}

impl DiffReport {
    /// SHA-256 of the diff text, for spotting stale reviews
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.diff.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Contents retrieved for one file
#[derive(Debug, Default)]
struct Contents {
    old: Option<String>,
    new: Option<String>,
}

/// Build the combined unified diff for `files`.
///
/// Files are filtered, their contents fetched through `source` (concurrently),
/// rendered one by one and joined in input order. Every file that does not
/// end up in the output is listed in `DiffReport::excluded`. When no file
/// produces any output the run fails with `DiffError::NoChanges`.
pub fn generate_diff(
    files: &[FileChange],
    options: &DiffOptions,
    source: &dyn ContentSource,
    range: DiffRange<'_>,
) -> Result<DiffReport, DiffError> {
    let mut excluded: Vec<Exclusion> = Vec::new();

    let candidates: Vec<&FileChange> = files
        .iter()
        .filter(|file| match pre_filter(file, options) {
            Some(reason) => {
                log::debug!("{}: {}", file.path, reason.describe());
                excluded.push(Exclusion {
                    path: file.path.clone(),
                    reason,
                });
                false
            }
            None => true,
        })
        .collect();

    let contents = resolve_all(&candidates, source, range, options.jobs);

    let mut sections: Vec<String> = Vec::new();
    let mut included: Vec<FileChange> = Vec::new();
    for (file, contents) in candidates.into_iter().zip(contents) {
        let outcome = check_contents(file, &contents, options).map(|()| {
            let request = build_request(file, contents, options);
            render_file_diff(&request)
        });
        match outcome {
            Ok(text) if !text.is_empty() => {
                sections.push(text);
                included.push(file.clone());
            }
            Ok(_) => excluded.push(Exclusion {
                path: file.path.clone(),
                reason: ExclusionReason::Unchanged,
            }),
            Err(reason) => {
                log::warn!("skipping {}: {}", file.path, reason.describe());
                excluded.push(Exclusion {
                    path: file.path.clone(),
                    reason,
                });
            }
        }
    }

    if sections.is_empty() {
        return Err(DiffError::NoChanges {
            excluded: excluded.len(),
        });
    }

    Ok(DiffReport {
        diff: sections.join("\n\n"),
        files: included,
        excluded,
    })
}

/// Exclusions that need no content: deletions and the extension filter.
fn pre_filter(file: &FileChange, options: &DiffOptions) -> Option<ExclusionReason> {
    if options.exclude_deletes && file.status == FileStatus::Deleted {
        return Some(ExclusionReason::Deleted);
    }
    if !options.extension_filter.matches(&file.path) {
        return Some(ExclusionReason::ExtensionFilter);
    }
    None
}

/// Fetch contents for every file, `jobs` at a time. Results come back in the
/// order of `files`; a lookup that panics leaves that file without content.
fn resolve_all(
    files: &[&FileChange],
    source: &dyn ContentSource,
    range: DiffRange<'_>,
    jobs: usize,
) -> Vec<Contents> {
    let jobs = match jobs {
        0 => std::thread::available_parallelism().map_or(4, |n| n.get()),
        n => n,
    };

    let mut resolved = Vec::with_capacity(files.len());
    for chunk in files.chunks(jobs) {
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|file| scope.spawn(move || resolve(file, source, range)))
                .collect();
            for (file, handle) in chunk.iter().zip(handles) {
                resolved.push(handle.join().unwrap_or_else(|_| {
                    log::error!("content lookup for {} panicked", file.path);
                    Contents::default()
                }));
            }
        });
    }
    resolved
}

fn resolve(file: &FileChange, source: &dyn ContentSource, range: DiffRange<'_>) -> Contents {
    let old = match &file.status {
        FileStatus::Added | FileStatus::Untracked => None,
        FileStatus::Modified | FileStatus::Deleted => {
            let old = source.content_at_revision(range.base, &file.path);
            if old.is_none() {
                log::warn!("{} not available at {}", file.path, range.base);
            }
            old
        }
        FileStatus::Renamed(from) | FileStatus::Copied(from) => {
            let old = source.content_at_revision(range.base, from);
            if old.is_none() {
                log::warn!(
                    "{} not available at {}; showing {} as added",
                    from,
                    range.base,
                    file.path
                );
            }
            old
        }
    };

    let new = match (&file.status, range.head) {
        (FileStatus::Deleted, _) => None,
        (_, Some(head)) => source.content_at_revision(head, &file.path),
        (_, None) => source.working_content(&file.path),
    };
    if new.is_none() && file.status != FileStatus::Deleted {
        log::warn!("{}: new content not available", file.path);
    }

    Contents { old, new }
}

/// Exclusions that depend on the retrieved content.
fn check_contents(
    file: &FileChange,
    contents: &Contents,
    options: &DiffOptions,
) -> Result<(), ExclusionReason> {
    let sides = [contents.old.as_deref(), contents.new.as_deref()];
    if sides.iter().all(Option::is_none) {
        return Err(ExclusionReason::Unavailable);
    }
    let present = sides.iter().flatten();
    if present.clone().any(|text| text.contains('\0')) {
        return Err(ExclusionReason::Binary);
    }
    if let Some(limit) = options.max_file_bytes {
        if present.clone().any(|text| text.len() > limit) {
            log::debug!("{} exceeds {} bytes", file.path, limit);
            return Err(ExclusionReason::TooLarge);
        }
    }
    Ok(())
}

fn build_request(file: &FileChange, contents: Contents, options: &DiffOptions) -> FileDiffRequest {
    let old_path = file.status.original_path().unwrap_or(&file.path).to_string();
    FileDiffRequest {
        old_path,
        new_path: file.path.clone(),
        old_content: contents.old,
        new_content: contents.new,
        context_lines: options.context_lines,
        deadline: options.diff_timeout.map(|t| Instant::now() + t),
        kind: Some(file_state(&file.status)),
    }
}

/// Only a listed deletion renders as one; an emptied file stays modified.
fn file_state(status: &FileStatus) -> FileState {
    match status {
        FileStatus::Added | FileStatus::Untracked => FileState::Added,
        FileStatus::Deleted => FileState::Deleted,
        FileStatus::Modified => FileState::Modified,
        FileStatus::Renamed(_) | FileStatus::Copied(_) => FileState::Renamed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSource {
        revisions: HashMap<(String, String), String>,
        working: HashMap<String, String>,
    }

    impl FakeSource {
        fn at(mut self, revision: &str, path: &str, content: &str) -> Self {
            self.revisions
                .insert((revision.to_string(), path.to_string()), content.to_string());
            self
        }

        fn work(mut self, path: &str, content: &str) -> Self {
            self.working.insert(path.to_string(), content.to_string());
            self
        }
    }

    impl ContentSource for FakeSource {
        fn content_at_revision(&self, revision: &str, path: &str) -> Option<String> {
            self.revisions
                .get(&(revision.to_string(), path.to_string()))
                .cloned()
        }

        fn working_content(&self, path: &str) -> Option<String> {
            self.working.get(path).cloned()
        }
    }

    const WORKTREE: DiffRange<'static> = DiffRange {
        base: "main",
        head: None,
    };

    fn change(path: &str, status: FileStatus) -> FileChange {
        FileChange::new(path, status)
    }

    fn reasons(report: &DiffReport) -> Vec<(&str, ExclusionReason)> {
        report
            .excluded
            .iter()
            .map(|e| (e.path.as_str(), e.reason))
            .collect()
    }

    #[test]
    fn modified_added_and_deleted_join_with_blank_line() {
        let source = FakeSource::default()
            .at("main", "a.rs", "x\ny\nz\n")
            .work("a.rs", "x\nY\nz\n")
            .work("b.rs", "new\n")
            .at("main", "c.rs", "old\n");
        let files = vec![
            change("a.rs", FileStatus::Modified),
            change("b.rs", FileStatus::Added),
            change("c.rs", FileStatus::Deleted),
        ];
        let options = DiffOptions {
            context_lines: 1,
            ..DiffOptions::default()
        };

        let report = generate_diff(&files, &options, &source, WORKTREE).unwrap();
        assert_eq!(
            report.diff,
            "diff --git a/a.rs b/a.rs\n\
             index 0000000..0000000 100644\n\
             --- a/a.rs\n\
             +++ b/a.rs\n\
             @@ -1,3 +1,3 @@\n \
             x\n\
             -y\n\
             +Y\n \
             z\n\
             \n\
             diff --git a/b.rs b/b.rs\n\
             new file mode 100644\n\
             index 0000000..0000000\n\
             --- /dev/null\n\
             +++ b/b.rs\n\
             @@ -0,0 +1,1 @@\n\
             +new\n\
             \n\
             diff --git a/c.rs b/c.rs\n\
             deleted file mode 100644\n\
             index 0000000..0000000\n\
             --- a/c.rs\n\
             +++ /dev/null\n\
             @@ -1,1 +0,0 @@\n\
             -old"
        );
        assert_eq!(report.files, files);
        assert!(report.excluded.is_empty());
    }

    #[test]
    fn exclude_deletes_drops_deleted_files() {
        let source = FakeSource::default()
            .at("main", "gone.rs", "bye\n")
            .work("kept.rs", "hi\n");
        let files = vec![
            change("gone.rs", FileStatus::Deleted),
            change("kept.rs", FileStatus::Untracked),
        ];
        let options = DiffOptions {
            exclude_deletes: true,
            ..DiffOptions::default()
        };

        let report = generate_diff(&files, &options, &source, WORKTREE).unwrap();
        assert!(!report.diff.contains("gone.rs"));
        assert!(!report.diff.contains("deleted file mode"));
        assert_eq!(reasons(&report), vec![("gone.rs", ExclusionReason::Deleted)]);
    }

    #[test]
    fn emptied_file_renders_as_modified() {
        let source = FakeSource::default()
            .at("main", "keep.rs", "a\nb\n")
            .work("keep.rs", "");
        let files = vec![change("keep.rs", FileStatus::Modified)];
        let options = DiffOptions {
            exclude_deletes: true,
            ..DiffOptions::default()
        };

        let report = generate_diff(&files, &options, &source, WORKTREE).unwrap();
        assert!(!report.diff.contains("deleted file mode"));
        assert!(!report.diff.contains("/dev/null"));
        assert_eq!(
            report.diff,
            "diff --git a/keep.rs b/keep.rs\n\
             index 0000000..0000000 100644\n\
             --- a/keep.rs\n\
             +++ b/keep.rs\n\
             @@ -1,2 +0,0 @@\n\
             -a\n\
             -b"
        );
    }

    #[test]
    fn unreadable_new_side_of_modified_file_is_not_a_deletion() {
        let source = FakeSource::default().at("main", "lost.rs", "a\n");
        let files = vec![change("lost.rs", FileStatus::Modified)];

        let report = generate_diff(&files, &DiffOptions::default(), &source, WORKTREE).unwrap();
        assert!(!report.diff.contains("deleted file mode"));
        assert!(report.diff.contains("+++ b/lost.rs\n"));
    }

    #[test]
    fn trailing_newline_only_change_is_unchanged() {
        let source = FakeSource::default()
            .at("main", "eol.rs", "a\nb")
            .work("eol.rs", "a\nb\n")
            .work("new.rs", "y\n");
        let files = vec![
            change("eol.rs", FileStatus::Modified),
            change("new.rs", FileStatus::Added),
        ];

        let report = generate_diff(&files, &DiffOptions::default(), &source, WORKTREE).unwrap();
        assert!(!report.diff.contains("eol.rs"));
        assert_eq!(reasons(&report), vec![("eol.rs", ExclusionReason::Unchanged)]);
    }

    #[test]
    fn extension_filter_drops_unmatched_paths() {
        let source = FakeSource::default()
            .work("src/lib.rs", "fn a() {}\n")
            .work("README.md", "# hi\n");
        let files = vec![
            change("src/lib.rs", FileStatus::Added),
            change("README.md", FileStatus::Added),
        ];
        let options = DiffOptions {
            extension_filter: ExtensionFilter::parse("rs").unwrap(),
            ..DiffOptions::default()
        };

        let report = generate_diff(&files, &options, &source, WORKTREE).unwrap();
        assert!(report.diff.starts_with("diff --git a/src/lib.rs b/src/lib.rs\n"));
        assert!(!report.diff.contains("README.md"));
        assert_eq!(reasons(&report), vec![("README.md", ExclusionReason::ExtensionFilter)]);
    }

    #[test]
    fn renamed_file_reads_old_content_from_original_path() {
        let source = FakeSource::default()
            .at("main", "old/name.rs", "a\nb\n")
            .work("new/name.rs", "a\nB\n");
        let files = vec![change(
            "new/name.rs",
            FileStatus::Renamed("old/name.rs".to_string()),
        )];

        let report = generate_diff(&files, &DiffOptions::default(), &source, WORKTREE).unwrap();
        assert!(report.diff.starts_with(
            "diff --git a/old/name.rs b/new/name.rs\n\
             index 0000000..0000000 100644\n\
             --- a/old/name.rs\n\
             +++ b/new/name.rs\n"
        ));
    }

    #[test]
    fn renamed_file_without_old_content_degrades_to_added() {
        let source = FakeSource::default().work("new.rs", "a\n");
        let files = vec![change("new.rs", FileStatus::Renamed("old.rs".to_string()))];

        let report = generate_diff(&files, &DiffOptions::default(), &source, WORKTREE).unwrap();
        assert!(report.diff.contains("new file mode 100644\n"));
        assert!(report.diff.contains("--- /dev/null\n+++ b/new.rs\n@@ -0,0 +1,1 @@\n+a"));
    }

    #[test]
    fn unavailable_content_is_skipped_not_fatal() {
        let source = FakeSource::default()
            .at("main", "ok.rs", "1\n")
            .work("ok.rs", "2\n");
        let files = vec![
            change("ghost.rs", FileStatus::Modified),
            change("ok.rs", FileStatus::Modified),
        ];

        let report = generate_diff(&files, &DiffOptions::default(), &source, WORKTREE).unwrap();
        assert!(report.diff.starts_with("diff --git a/ok.rs b/ok.rs\n"));
        assert_eq!(reasons(&report), vec![("ghost.rs", ExclusionReason::Unavailable)]);
    }

    #[test]
    fn identical_files_are_reported_unchanged() {
        let source = FakeSource::default()
            .at("main", "same.rs", "x\n")
            .work("same.rs", "x\n")
            .work("new.rs", "y\n");
        let files = vec![
            change("same.rs", FileStatus::Modified),
            change("new.rs", FileStatus::Added),
        ];

        let report = generate_diff(&files, &DiffOptions::default(), &source, WORKTREE).unwrap();
        assert!(!report.diff.contains("same.rs"));
        assert_eq!(report.files.len(), 1);
        assert_eq!(reasons(&report), vec![("same.rs", ExclusionReason::Unchanged)]);
    }

    #[test]
    fn nothing_left_is_an_error() {
        let source = FakeSource::default()
            .at("main", "same.rs", "x\n")
            .work("same.rs", "x\n");
        let files = vec![
            change("same.rs", FileStatus::Modified),
            change("gone.rs", FileStatus::Deleted),
        ];
        let options = DiffOptions {
            exclude_deletes: true,
            ..DiffOptions::default()
        };

        let err = generate_diff(&files, &options, &source, WORKTREE).unwrap_err();
        assert!(matches!(err, DiffError::NoChanges { excluded: 2 }));
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = generate_diff(&[], &DiffOptions::default(), &FakeSource::default(), WORKTREE)
            .unwrap_err();
        assert!(matches!(err, DiffError::NoChanges { excluded: 0 }));
    }

    #[test]
    fn binary_and_oversized_files_are_excluded() {
        let big = "line\n".repeat(100);
        let source = FakeSource::default()
            .work("image.png", "\u{0}PNG\n")
            .work("big.txt", &big)
            .work("small.txt", "ok\n");
        let files = vec![
            change("image.png", FileStatus::Added),
            change("big.txt", FileStatus::Added),
            change("small.txt", FileStatus::Added),
        ];
        let options = DiffOptions {
            max_file_bytes: Some(100),
            ..DiffOptions::default()
        };

        let report = generate_diff(&files, &options, &source, WORKTREE).unwrap();
        assert_eq!(report.files, vec![change("small.txt", FileStatus::Added)]);
        assert_eq!(
            reasons(&report),
            vec![
                ("image.png", ExclusionReason::Binary),
                ("big.txt", ExclusionReason::TooLarge),
            ]
        );
    }

    #[test]
    fn head_revision_is_used_for_new_side() {
        let source = FakeSource::default()
            .at("main", "a.rs", "one\n")
            .at("feature", "a.rs", "two\n")
            .work("a.rs", "working copy\n");
        let files = vec![change("a.rs", FileStatus::Modified)];
        let range = DiffRange {
            base: "main",
            head: Some("feature"),
        };

        let report = generate_diff(&files, &DiffOptions::default(), &source, range).unwrap();
        assert!(report.diff.ends_with("@@ -1,1 +1,1 @@\n-one\n+two"));
    }

    #[test]
    fn output_order_follows_input_with_concurrent_lookups() {
        let mut source = FakeSource::default();
        let mut files = Vec::new();
        for i in 0..25 {
            let path = format!("f{i:02}.txt");
            source = source.work(&path, &format!("{i}\n"));
            files.push(change(&path, FileStatus::Untracked));
        }
        let options = DiffOptions {
            jobs: 4,
            ..DiffOptions::default()
        };

        let report = generate_diff(&files, &options, &source, WORKTREE).unwrap();
        let headers: Vec<&str> = report
            .diff
            .lines()
            .filter(|l| l.starts_with("diff --git"))
            .collect();
        let expected: Vec<String> = (0..25)
            .map(|i| format!("diff --git a/f{i:02}.txt b/f{i:02}.txt"))
            .collect();
        assert_eq!(headers, expected);
        assert_eq!(report.files, files);
    }

    #[test]
    fn fingerprint_tracks_diff_text() {
        let report = DiffReport {
            diff: "abc".to_string(),
            files: Vec::new(),
            excluded: Vec::new(),
        };
        assert_eq!(
            report.fingerprint(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
