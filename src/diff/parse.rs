use super::{DiffHunk, DiffLine, LineType};
use crate::git::FileStatus;

/// One file section of a unified diff, read back into structured form
#[derive(Debug, Clone)]
pub struct DiffFile {
    pub path: String,
    pub status: FileStatus,
    pub hunks: Vec<DiffHunk>,
    pub adds: usize,
    pub dels: usize,
}

impl DiffFile {
    /// Starts with the path from the `diff --git` line; the `+++`/`---`
    /// lines, when present, replace it.
    fn new(header: &str) -> Self {
        DiffFile {
            path: header_path(header),
            status: FileStatus::Modified,
            hunks: Vec::new(),
            adds: 0,
            dels: 0,
        }
    }
}

/// New path of a `diff --git a/X b/Y` line. When both halves agree the split
/// is exact even if the path itself contains " b/".
fn header_path(header: &str) -> String {
    let Some(rest) = header.strip_prefix("diff --git a/") else {
        return String::new();
    };
    let half = rest.len().saturating_sub(3) / 2;
    if let (Some(old), Some(" b/"), Some(new)) =
        (rest.get(..half), rest.get(half..half + 3), rest.get(half + 3..))
    {
        if old == new {
            return new.to_string();
        }
    }
    rest.rsplit_once(" b/")
        .map(|(_, p)| p.to_string())
        .unwrap_or_default()
}

/// Read unified diff text (as produced by the renderer or by git) into files.
///
/// Line numbers are reconstructed from the hunk headers. Lines that are not
/// part of a recognised header or hunk body are ignored.
pub fn parse_diff(raw: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut old_line = 0usize;
    let mut new_line = 0usize;
    // Lines still expected by the current hunk header (old, new)
    let mut remaining = (0usize, 0usize);
    // Path from the current file's "--- a/" line
    let mut old_side: Option<String> = None;

    for line in raw.lines() {
        if line.starts_with("diff --git ") {
            files.push(DiffFile::new(line));
            old_side = None;
            continue;
        }
        let Some(file) = files.last_mut() else {
            continue;
        };

        if let Some(hunk) = parse_hunk_header(line) {
            old_line = hunk.old_start;
            new_line = hunk.new_start;
            remaining = (hunk.old_count, hunk.new_count);
            file.hunks.push(hunk);
            continue;
        }

        if file.hunks.is_empty() {
            // Still in the file header block
            if line.starts_with("new file") {
                file.status = FileStatus::Added;
            } else if line.starts_with("deleted file") {
                file.status = FileStatus::Deleted;
            } else if let Some(old_path) = line.strip_prefix("rename from ") {
                file.status = FileStatus::Renamed(old_path.to_string());
            } else if line == "--- /dev/null" {
                file.status = FileStatus::Added;
            } else if let Some(old_path) = line.strip_prefix("--- a/") {
                old_side = Some(old_path.to_string());
            } else if line == "+++ /dev/null" {
                file.status = FileStatus::Deleted;
                if let Some(old_path) = old_side.take() {
                    file.path = old_path;
                }
            } else if let Some(new_path) = line.strip_prefix("+++ b/") {
                if let Some(old_path) = old_side.take() {
                    if old_path != new_path && file.status == FileStatus::Modified {
                        file.status = FileStatus::Renamed(old_path);
                    }
                }
                file.path = new_path.to_string();
            }
            continue;
        }

        let (line_type, content) = match line.chars().next() {
            Some('+') => (LineType::Add, &line[1..]),
            Some('-') => (LineType::Delete, &line[1..]),
            Some(' ') => (LineType::Context, &line[1..]),
            None => (LineType::Context, ""),
            // "\ No newline at end of file" and anything unknown
            Some(_) => continue,
        };

        // Anything past the declared counts (e.g. the blank separator line
        // between files) is not part of the hunk
        if (line_type.on_old_side() && remaining.0 == 0)
            || (line_type.on_new_side() && remaining.1 == 0)
        {
            continue;
        }

        let old_num = line_type.on_old_side().then_some(old_line);
        let new_num = line_type.on_new_side().then_some(new_line);
        if old_num.is_some() {
            old_line += 1;
            remaining.0 -= 1;
        }
        if new_num.is_some() {
            new_line += 1;
            remaining.1 -= 1;
        }
        match line_type {
            LineType::Add => file.adds += 1,
            LineType::Delete => file.dels += 1,
            LineType::Context => {}
        }
        if let Some(hunk) = file.hunks.last_mut() {
            hunk.lines.push(DiffLine {
                line_type,
                content: content.to_string(),
                old_num,
                new_num,
            });
        }
    }

    files
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()"
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let after_first = line.strip_prefix("@@ ")?;
    let end_idx = after_first.find(" @@")?;
    let mut ranges = after_first[..end_idx].split_whitespace();
    let (old_start, old_count) = parse_range(ranges.next()?.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(ranges.next()?.strip_prefix('+')?)?;

    Some(DiffHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        section: after_first[end_idx + 3..].trim().to_string(),
        lines: Vec::new(),
    })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}
