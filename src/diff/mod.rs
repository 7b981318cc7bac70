mod hunk;
mod lines;
mod parse;
mod render;

pub use parse::parse_diff;
pub use render::{render_file_diff, FileDiffRequest, FileState};

/// A single line in a diff hunk
#[derive(Debug, Clone, PartialEq)]
pub struct DiffLine {
    pub line_type: LineType,
    pub content: String,
    pub old_num: Option<usize>,
    pub new_num: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineType {
    Context,
    Add,
    Delete,
}

impl LineType {
    pub fn prefix(self) -> char {
        match self {
            LineType::Context => ' ',
            LineType::Add => '+',
            LineType::Delete => '-',
        }
    }

    /// Whether the line exists in the old version of the file.
    pub fn on_old_side(self) -> bool {
        matches!(self, LineType::Context | LineType::Delete)
    }

    /// Whether the line exists in the new version of the file.
    pub fn on_new_side(self) -> bool {
        matches!(self, LineType::Context | LineType::Add)
    }
}

/// A diff hunk: one `@@` block with its ranges and lines
#[derive(Debug, Clone, PartialEq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Free text after the closing `@@` (only present on parsed hunks)
    pub section: String,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// `@@ -old_start,old_count +new_start,new_count @@`
    pub fn header(&self) -> String {
        let ranges = format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        );
        if self.section.is_empty() {
            ranges
        } else {
            format!("{} {}", ranges, self.section)
        }
    }

    /// Format this hunk as unified diff text, every line newline-terminated
    pub fn to_text(&self) -> String {
        let mut text = self.header();
        text.push('\n');
        for line in &self.lines {
            text.push(line.line_type.prefix());
            text.push_str(&line.content);
            text.push('\n');
        }
        text
    }

    /// Number of lines in the hunk that belong to the old file
    pub fn old_side_len(&self) -> usize {
        self.lines.iter().filter(|l| l.line_type.on_old_side()).count()
    }

    /// Number of lines in the hunk that belong to the new file
    pub fn new_side_len(&self) -> usize {
        self.lines.iter().filter(|l| l.line_type.on_new_side()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_type: LineType, content: &str) -> DiffLine {
        DiffLine {
            line_type,
            content: content.to_string(),
            old_num: None,
            new_num: None,
        }
    }

    #[test]
    fn header_without_section() {
        let hunk = DiffHunk {
            old_start: 10,
            old_count: 4,
            new_start: 10,
            new_count: 15,
            section: String::new(),
            lines: Vec::new(),
        };
        assert_eq!(hunk.header(), "@@ -10,4 +10,15 @@");
    }

    #[test]
    fn header_keeps_section_text() {
        let hunk = DiffHunk {
            old_start: 1,
            old_count: 1,
            new_start: 1,
            new_count: 2,
            section: "fn main()".to_string(),
            lines: Vec::new(),
        };
        assert_eq!(hunk.header(), "@@ -1,1 +1,2 @@ fn main()");
    }

    #[test]
    fn to_text_prefixes_each_line() {
        let hunk = DiffHunk {
            old_start: 1,
            old_count: 2,
            new_start: 1,
            new_count: 2,
            section: String::new(),
            lines: vec![
                line(LineType::Context, "let x = 1;"),
                line(LineType::Delete, "let y = 2;"),
                line(LineType::Add, "let y = 42;"),
            ],
        };
        assert_eq!(
            hunk.to_text(),
            "@@ -1,2 +1,2 @@\n let x = 1;\n-let y = 2;\n+let y = 42;\n"
        );
        assert_eq!(hunk.old_side_len(), 2);
        assert_eq!(hunk.new_side_len(), 2);
    }
}
