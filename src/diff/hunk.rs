use super::lines::DiffOp;
use super::{DiffHunk, DiffLine, LineType};
use crate::error::DiffError;

/// Hunk under construction. Tracks where it begins on each side and the
/// running counts, which are checked against the collected lines on close.
struct HunkBuilder {
    old_pos: usize,
    new_pos: usize,
    old_count: usize,
    new_count: usize,
    lines: Vec<DiffLine>,
}

impl HunkBuilder {
    fn new(old_pos: usize, new_pos: usize) -> Self {
        Self {
            old_pos,
            new_pos,
            old_count: 0,
            new_count: 0,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line_type: LineType, content: &str) {
        let old_num = line_type
            .on_old_side()
            .then_some(self.old_pos + self.old_count);
        let new_num = line_type
            .on_new_side()
            .then_some(self.new_pos + self.new_count);
        if old_num.is_some() {
            self.old_count += 1;
        }
        if new_num.is_some() {
            self.new_count += 1;
        }
        self.lines.push(DiffLine {
            line_type,
            content: content.to_string(),
            old_num,
            new_num,
        });
    }

    fn finish(self) -> DiffHunk {
        DiffHunk {
            old_start: range_start(self.old_pos, self.old_count),
            old_count: self.old_count,
            new_start: range_start(self.new_pos, self.new_count),
            new_count: self.new_count,
            section: String::new(),
            lines: self.lines,
        }
    }
}

/// An empty range names the line it follows, so a hunk that only inserts at
/// the top of a file reads `-0,0`.
fn range_start(pos: usize, count: usize) -> usize {
    if count == 0 {
        pos.saturating_sub(1)
    } else {
        pos.max(1)
    }
}

/// Group an edit script into unified-diff hunks with `context` lines of
/// surrounding context.
///
/// Two change regions share a hunk when the unchanged run between them is at
/// most `2 * context` lines long, i.e. when their context windows would touch
/// or overlap. An edit script without changes yields no hunks.
pub fn assemble_hunks(ops: &[DiffOp<'_>], context: usize) -> Result<Vec<DiffHunk>, DiffError> {
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut current: Option<HunkBuilder> = None;
    let mut old_line = 1usize;
    let mut new_line = 1usize;

    for (idx, op) in ops.iter().enumerate() {
        match op {
            DiffOp::Equal(lines) => {
                if let Some(mut builder) = current.take() {
                    let more_changes = ops[idx + 1..].iter().any(DiffOp::is_change);
                    if more_changes && lines.len() <= context.saturating_mul(2) {
                        for line in lines {
                            builder.push(LineType::Context, line);
                        }
                        current = Some(builder);
                    } else {
                        for line in lines.iter().take(context) {
                            builder.push(LineType::Context, line);
                        }
                        close(&mut hunks, builder)?;
                    }
                }
                old_line += lines.len();
                new_line += lines.len();
            }
            DiffOp::Delete(lines) | DiffOp::Insert(lines) => {
                let builder = current.get_or_insert_with(|| {
                    let before = leading_context(ops, idx, context);
                    let mut builder =
                        HunkBuilder::new(old_line - before.len(), new_line - before.len());
                    for line in before {
                        builder.push(LineType::Context, line);
                    }
                    builder
                });

                let line_type = if matches!(op, DiffOp::Delete(_)) {
                    old_line += lines.len();
                    LineType::Delete
                } else {
                    new_line += lines.len();
                    LineType::Add
                };
                for line in lines {
                    builder.push(line_type, line);
                }
            }
        }
    }

    if let Some(builder) = current {
        close(&mut hunks, builder)?;
    }

    Ok(hunks)
}

/// The last `context` lines of the unchanged run right before `ops[idx]`.
fn leading_context<'o, 'a>(ops: &'o [DiffOp<'a>], idx: usize, context: usize) -> &'o [&'a str] {
    match idx.checked_sub(1).map(|prev| &ops[prev]) {
        Some(DiffOp::Equal(lines)) => &lines[lines.len().saturating_sub(context)..],
        _ => &[],
    }
}

fn close(hunks: &mut Vec<DiffHunk>, builder: HunkBuilder) -> Result<(), DiffError> {
    let hunk = builder.finish();
    verify_hunk(&hunk, hunks.last())?;
    hunks.push(hunk);
    Ok(())
}

/// Check that a hunk's header agrees with its body and that it starts after
/// the previous hunk ends.
pub(crate) fn verify_hunk(hunk: &DiffHunk, previous: Option<&DiffHunk>) -> Result<(), DiffError> {
    let old_len = hunk.old_side_len();
    let new_len = hunk.new_side_len();
    if old_len != hunk.old_count || new_len != hunk.new_count {
        return Err(DiffError::HunkInvariant(format!(
            "{} declares {} old / {} new lines but carries {} / {}",
            hunk.header(),
            hunk.old_count,
            hunk.new_count,
            old_len,
            new_len
        )));
    }
    if hunk.lines.is_empty() {
        return Err(DiffError::HunkInvariant(format!("{} has no lines", hunk.header())));
    }
    let old_nums = hunk.lines.iter().filter_map(|l| l.old_num);
    let new_nums = hunk.lines.iter().filter_map(|l| l.new_num);
    if !old_nums.eq(hunk.old_start..hunk.old_start + old_len)
        || !new_nums.eq(hunk.new_start..hunk.new_start + new_len)
    {
        return Err(DiffError::HunkInvariant(format!(
            "{} has non-consecutive line numbers",
            hunk.header()
        )));
    }

    if let Some(prev) = previous {
        let prev_old_end = prev.old_start + prev.old_count;
        let prev_new_end = prev.new_start + prev.new_count;
        if hunk.old_start < prev_old_end || hunk.new_start < prev_new_end {
            return Err(DiffError::HunkInvariant(format!(
                "{} overlaps preceding {}",
                hunk.header(),
                prev.header()
            )));
        }
    }
    Ok(())
}
