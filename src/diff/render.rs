use super::hunk::assemble_hunks;
use super::lines::{diff_lines, has_changes, split_lines};
use super::{DiffHunk, DiffLine, LineType};
use std::time::Instant;

const NULL_PATH: &str = "/dev/null";
const FILE_MODE: &str = "100644";
const NULL_INDEX: &str = "index 0000000..0000000";

/// Everything needed to render one file's diff
#[derive(Debug, Clone, Default)]
pub struct FileDiffRequest {
    pub old_path: String,
    pub new_path: String,
    /// `None` when the file does not exist on the old side
    pub old_content: Option<String>,
    /// `None` when the file does not exist on the new side
    pub new_content: Option<String>,
    pub context_lines: usize,
    /// Give up on a minimal edit script after this point
    pub deadline: Option<Instant>,
    /// State known from the change listing. When unset it is inferred from
    /// which sides have content.
    pub kind: Option<FileState>,
}

/// How a file changed between the two sides
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileState {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl FileDiffRequest {
    /// Classify the request. `None` means there is nothing to render.
    ///
    /// An explicit `kind` wins, except that a modified or renamed file
    /// without an old side is shown as added. Otherwise an empty old side
    /// counts as "added" and an empty new side as "deleted".
    pub fn state(&self) -> Option<FileState> {
        let old = self.old_content.as_deref();
        let new = self.new_content.as_deref();
        if matches!((old, new), (None, None) | (Some(""), Some(""))) {
            return None;
        }
        if let Some(kind) = self.kind {
            return match kind {
                FileState::Modified | FileState::Renamed if old.is_none() => Some(FileState::Added),
                kind => Some(kind),
            };
        }
        match (old, new) {
            (None, None) => None,
            (None, Some(_)) | (Some(""), Some(_)) => Some(FileState::Added),
            (Some(_), None) | (Some(_), Some("")) => Some(FileState::Deleted),
            (Some(_), Some(_)) if self.old_path == self.new_path => Some(FileState::Modified),
            (Some(_), Some(_)) => Some(FileState::Renamed),
        }
    }
}

/// Render one file as a git-style unified diff.
///
/// Returns an empty string when there is nothing to show: both sides missing
/// or empty, or a modified file whose contents are identical. The result
/// never ends with a newline.
pub fn render_file_diff(req: &FileDiffRequest) -> String {
    let Some(state) = req.state() else {
        return String::new();
    };

    let old_text = req.old_content.as_deref().unwrap_or("");
    let new_text = req.new_content.as_deref().unwrap_or("");
    let hunks = match state {
        FileState::Added => vec![whole_file_hunk(&[], &side_lines(new_text))],
        FileState::Deleted => vec![whole_file_hunk(&side_lines(old_text), &[])],
        FileState::Modified | FileState::Renamed => {
            let old_lines = split_lines(old_text);
            let new_lines = split_lines(new_text);
            let ops = diff_lines(&old_lines, &new_lines, req.deadline);
            if !has_changes(&ops) {
                if old_text != new_text {
                    log::debug!(
                        "{}: only the final newline differs, nothing to show",
                        req.new_path
                    );
                }
                return String::new();
            }
            match assemble_hunks(&ops, req.context_lines) {
                Ok(hunks) => hunks,
                Err(e) => {
                    log::error!(
                        "{}: {}; falling back to whole-file replacement",
                        req.new_path,
                        e
                    );
                    vec![whole_file_hunk(&old_lines, &new_lines)]
                }
            }
        }
    };

    render_with_hunks(req, state, &hunks)
}

/// Lines of one side of an added or deleted file. An empty file still
/// renders as a single empty line so the hunk is never blank.
fn side_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        vec![""]
    } else {
        split_lines(text)
    }
}

/// A single hunk removing every old line and adding every new line.
fn whole_file_hunk(old_lines: &[&str], new_lines: &[&str]) -> DiffHunk {
    let removed = old_lines.iter().enumerate().map(|(i, line)| DiffLine {
        line_type: LineType::Delete,
        content: line.to_string(),
        old_num: Some(i + 1),
        new_num: None,
    });
    let added = new_lines.iter().enumerate().map(|(i, line)| DiffLine {
        line_type: LineType::Add,
        content: line.to_string(),
        old_num: None,
        new_num: Some(i + 1),
    });

    DiffHunk {
        old_start: usize::from(!old_lines.is_empty()),
        old_count: old_lines.len(),
        new_start: usize::from(!new_lines.is_empty()),
        new_count: new_lines.len(),
        section: String::new(),
        lines: removed.chain(added).collect(),
    }
}

/// Format the header block for `state` followed by `hunks`.
///
/// Modified and renamed files without hunks render as an empty string.
pub fn render_with_hunks(req: &FileDiffRequest, state: FileState, hunks: &[DiffHunk]) -> String {
    if hunks.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    match state {
        FileState::Added => {
            let path = &req.new_path;
            out.push_str(&format!("diff --git a/{path} b/{path}\n"));
            out.push_str(&format!("new file mode {FILE_MODE}\n"));
            out.push_str(&format!("{NULL_INDEX}\n"));
            out.push_str(&format!("--- {NULL_PATH}\n"));
            out.push_str(&format!("+++ b/{path}\n"));
        }
        FileState::Deleted => {
            let path = &req.old_path;
            out.push_str(&format!("diff --git a/{path} b/{path}\n"));
            out.push_str(&format!("deleted file mode {FILE_MODE}\n"));
            out.push_str(&format!("{NULL_INDEX}\n"));
            out.push_str(&format!("--- a/{path}\n"));
            out.push_str(&format!("+++ {NULL_PATH}\n"));
        }
        FileState::Modified | FileState::Renamed => {
            let (old, new) = (&req.old_path, &req.new_path);
            out.push_str(&format!("diff --git a/{old} b/{new}\n"));
            out.push_str(&format!("{NULL_INDEX} {FILE_MODE}\n"));
            out.push_str(&format!("--- a/{old}\n"));
            out.push_str(&format!("+++ b/{new}\n"));
        }
    }

    for hunk in hunks {
        out.push_str(&hunk.to_text());
    }
    // Drop the final line terminator; files are joined by the caller
    out.pop();
    out
}
