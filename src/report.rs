use crate::config::OutputFormat;
use crate::diff::parse_diff;
use crate::git::FileStatus;
use crate::review::{DiffRange, DiffReport, Exclusion};
use anyhow::Result;
use serde::Serialize;

/// Per-file line counts read back from the rendered diff
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStat {
    pub path: String,
    pub status: FileStatus,
    pub hunks: usize,
    pub adds: usize,
    pub dels: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    base: &'a str,
    head: Option<&'a str>,
    fingerprint: String,
    files: Vec<FileStat>,
    excluded: &'a [Exclusion],
    diff: &'a str,
}

/// Render a report in the requested output format
pub fn format_report(report: &DiffReport, range: DiffRange<'_>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Patch => Ok(report.diff.clone()),
        OutputFormat::Markdown => Ok(to_markdown(report, range)),
        OutputFormat::Json => {
            let json = JsonReport {
                base: range.base,
                head: range.head,
                fingerprint: report.fingerprint(),
                files: file_stats(report),
                excluded: &report.excluded,
                diff: &report.diff,
            };
            Ok(serde_json::to_string_pretty(&json)?)
        }
    }
}

/// Split a multi-file diff into one chunk per `diff --git` header.
pub fn split_sections(diff: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = Vec::new();
    let mut offset = 0;
    for line in diff.split_inclusive('\n') {
        if line.starts_with("diff --git a/") {
            starts.push(offset);
        }
        offset += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(diff.len());
            diff[start..end].trim_end_matches('\n')
        })
        .collect()
}

/// Status and +/- counts for every file in the report, in diff order.
///
/// The status is read from the rendered header, so a rename whose old side
/// could not be fetched is reported as added.
pub fn file_stats(report: &DiffReport) -> Vec<FileStat> {
    let parsed = parse_diff(&report.diff);
    report
        .files
        .iter()
        .zip(parsed)
        .map(|(change, file)| {
            if file.path != change.path {
                log::warn!("diff section for {} reads back as {}", change.path, file.path);
            }
            FileStat {
                status: match (&change.status, file.status) {
                    (FileStatus::Untracked, FileStatus::Added) => FileStatus::Untracked,
                    (_, rendered) => rendered,
                },
                path: change.path.clone(),
                hunks: file.hunks.len(),
                adds: file.adds,
                dels: file.dels,
            }
        })
        .collect()
}

/// `git diff --stat`-like summary
pub fn format_stat(report: &DiffReport) -> String {
    let stats = file_stats(report);
    let width = stats.iter().map(|s| s.path.len()).max().unwrap_or(0);
    let mut out = String::new();
    for stat in &stats {
        out.push_str(&format!(
            " {} {:<width$} | +{} -{}\n",
            stat.status.symbol(),
            stat.path,
            stat.adds,
            stat.dels,
        ));
    }
    let adds: usize = stats.iter().map(|s| s.adds).sum();
    let dels: usize = stats.iter().map(|s| s.dels).sum();
    out.push_str(&format!(
        " {} file(s) changed, {} insertion(s)(+), {} deletion(s)(-)",
        stats.len(),
        adds,
        dels
    ));
    if !report.excluded.is_empty() {
        out.push_str(&format!(", {} excluded", report.excluded.len()));
    }
    out
}

/// Markdown document with one fenced block per file, suitable for pasting
/// into a review prompt or a PR comment.
pub fn to_markdown(report: &DiffReport, range: DiffRange<'_>) -> String {
    let stats = file_stats(report);
    let head = range.head.unwrap_or("working tree");
    let fingerprint = report.fingerprint();

    let mut md = String::new();
    md.push_str("# Changes for review\n\n");
    md.push_str(&format!(
        "`{}` → `{}` · {} file(s) · fingerprint `{}`\n",
        range.base,
        head,
        stats.len(),
        &fingerprint[..12]
    ));

    for (stat, section) in stats.iter().zip(split_sections(&report.diff)) {
        let fence = fence_for(section);
        md.push_str(&format!(
            "\n## `{}` ({} +{} -{})\n\n{}diff\n{}\n{}\n",
            stat.path,
            stat.status.symbol(),
            stat.adds,
            stat.dels,
            fence,
            section,
            fence
        ));
    }

    if !report.excluded.is_empty() {
        md.push_str("\n## Excluded\n\n");
        for exclusion in &report.excluded {
            md.push_str(&format!(
                "- `{}`: {}\n",
                exclusion.path,
                exclusion.reason.describe()
            ));
        }
    }
    md
}

/// A backtick fence longer than any backtick run inside `content`
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::FileChange;
    use crate::review::ExclusionReason;

    const RANGE: DiffRange<'static> = DiffRange {
        base: "main",
        head: None,
    };

    fn sample_report() -> DiffReport {
        DiffReport {
            diff: "diff --git a/a.rs b/a.rs\n\
                   index 0000000..0000000 100644\n\
                   --- a/a.rs\n\
                   +++ b/a.rs\n\
                   @@ -1,2 +1,2 @@\n\
                   -x\n\
                   +y\n \
                   z\n\
                   \n\
                   diff --git a/b.md b/b.md\n\
                   new file mode 100644\n\
                   index 0000000..0000000\n\
                   --- /dev/null\n\
                   +++ b/b.md\n\
                   @@ -0,0 +1,2 @@\n\
                   +```rust\n\
                   +```"
                .to_string(),
            files: vec![
                FileChange::new("a.rs", FileStatus::Modified),
                FileChange::new("b.md", FileStatus::Added),
            ],
            excluded: vec![Exclusion {
                path: "c.rs".to_string(),
                reason: ExclusionReason::Deleted,
            }],
        }
    }

    #[test]
    fn split_sections_by_file_header() {
        let report = sample_report();
        let sections = split_sections(&report.diff);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].starts_with("diff --git a/a.rs b/a.rs\n"));
        assert!(sections[0].ends_with(" z"));
        assert!(sections[1].starts_with("diff --git a/b.md b/b.md\n"));
        assert!(sections[1].ends_with("+```"));
    }

    #[test]
    fn split_sections_of_empty_text() {
        assert!(split_sections("").is_empty());
    }

    #[test]
    fn stats_count_lines_per_file() {
        let stats = file_stats(&sample_report());
        assert_eq!(
            stats,
            vec![
                FileStat {
                    path: "a.rs".to_string(),
                    status: FileStatus::Modified,
                    hunks: 1,
                    adds: 1,
                    dels: 1
                },
                FileStat {
                    path: "b.md".to_string(),
                    status: FileStatus::Added,
                    hunks: 1,
                    adds: 2,
                    dels: 0
                },
            ]
        );
    }

    #[test]
    fn stats_take_status_from_rendered_header() {
        let report = DiffReport {
            diff: "diff --git a/new.rs b/new.rs\n\
                   new file mode 100644\n\
                   index 0000000..0000000\n\
                   --- /dev/null\n\
                   +++ b/new.rs\n\
                   @@ -0,0 +1,1 @@\n\
                   +fn f() {}"
                .to_string(),
            files: vec![FileChange::new(
                "new.rs",
                FileStatus::Renamed("old.rs".to_string()),
            )],
            excluded: Vec::new(),
        };
        let stats = file_stats(&report);
        assert_eq!(stats[0].status, FileStatus::Added);
        assert_eq!(stats[0].path, "new.rs");
    }

    #[test]
    fn stats_keep_paths_containing_b_slash() {
        let report = DiffReport {
            diff: "diff --git a/docs/a b/c.md b/docs/a b/c.md\n\
                   index 0000000..0000000 100644\n\
                   --- a/docs/a b/c.md\n\
                   +++ b/docs/a b/c.md\n\
                   @@ -1,1 +1,1 @@\n\
                   -x\n\
                   +y"
                .to_string(),
            files: vec![FileChange::new("docs/a b/c.md", FileStatus::Modified)],
            excluded: Vec::new(),
        };
        let stats = file_stats(&report);
        assert_eq!(stats[0].path, "docs/a b/c.md");
        assert_eq!(stats[0].status, FileStatus::Modified);
        assert_eq!((stats[0].adds, stats[0].dels), (1, 1));
    }

    #[test]
    fn untracked_files_keep_their_status() {
        let mut report = sample_report();
        report.files[1].status = FileStatus::Untracked;
        assert_eq!(file_stats(&report)[1].status, FileStatus::Untracked);
    }

    #[test]
    fn stat_summary_line() {
        let stat = format_stat(&sample_report());
        assert!(stat.contains(" ~ a.rs | +1 -1\n"));
        assert!(stat.contains(" + b.md | +2 -0\n"));
        assert!(stat.ends_with(" 2 file(s) changed, 3 insertion(s)(+), 1 deletion(s)(-), 1 excluded"));
    }

    #[test]
    fn markdown_fences_each_file() {
        let md = to_markdown(&sample_report(), RANGE);
        assert!(md.contains("`main` → `working tree`"));
        assert!(md.contains("## `a.rs` (~ +1 -1)\n\n```diff\ndiff --git a/a.rs b/a.rs\n"));
        // b.md contains a triple backtick run, so its fence is longer
        assert!(md.contains("## `b.md` (+ +2 -0)\n\n````diff\n"));
        assert!(md.contains("- `c.rs`: deleted (excluded)\n"));
    }

    #[test]
    fn patch_format_is_raw_diff() {
        let report = sample_report();
        let out = format_report(&report, RANGE, OutputFormat::Patch).unwrap();
        assert_eq!(out, report.diff);
    }

    #[test]
    fn json_format_carries_everything() {
        let report = sample_report();
        let out = format_report(&report, RANGE, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["base"], "main");
        assert!(value["head"].is_null());
        assert_eq!(value["fingerprint"], report.fingerprint());
        assert_eq!(value["files"][0]["path"], "a.rs");
        assert_eq!(value["files"][1]["status"]["kind"], "added");
        assert_eq!(value["excluded"][0]["reason"], "deleted");
        assert_eq!(value["diff"], report.diff.as_str());
    }

    #[test]
    fn fence_grows_past_backtick_runs() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("a ``` b"), "````");
        assert_eq!(fence_for("`````"), "``````");
    }
}
