use similar::{capture_diff_slices_deadline, Algorithm};
use std::time::Instant;

/// One run of the line-level edit script.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOp<'a> {
    /// Lines present, unchanged, on both sides
    Equal(Vec<&'a str>),
    /// Lines only in the new version
    Insert(Vec<&'a str>),
    /// Lines only in the old version
    Delete(Vec<&'a str>),
}

impl<'a> DiffOp<'a> {
    pub fn lines(&self) -> &[&'a str] {
        match self {
            DiffOp::Equal(lines) | DiffOp::Insert(lines) | DiffOp::Delete(lines) => lines,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, DiffOp::Equal(_))
    }

    fn same_kind(&self, other: &DiffOp<'_>) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn lines_mut(&mut self) -> &mut Vec<&'a str> {
        match self {
            DiffOp::Equal(lines) | DiffOp::Insert(lines) | DiffOp::Delete(lines) => lines,
        }
    }
}

/// Split file content into lines.
///
/// A trailing `\n` terminates the last line rather than starting an empty
/// one, so `"a\nb\n"` and `"a\nb"` both give two lines. Nothing else is
/// normalized: `\r` and trailing whitespace stay part of the line.
pub fn split_lines(content: &str) -> Vec<&str> {
    let body = content.strip_suffix('\n').unwrap_or(content);
    if content.is_empty() {
        return Vec::new();
    }
    body.split('\n').collect()
}

/// Compute the edit script turning `old` into `new`.
///
/// Uses Myers' algorithm. When `deadline` passes the remaining work falls
/// back to a coarser (still correct) script. Adjacent runs of the same kind
/// are merged, and replacements come out as a `Delete` followed by an
/// `Insert`.
pub fn diff_lines<'a>(
    old: &[&'a str],
    new: &[&'a str],
    deadline: Option<Instant>,
) -> Vec<DiffOp<'a>> {
    let mut ops: Vec<DiffOp<'a>> = Vec::new();

    for op in capture_diff_slices_deadline(Algorithm::Myers, old, new, deadline) {
        match op {
            similar::DiffOp::Equal {
                old_index, len, ..
            } => push_op(&mut ops, DiffOp::Equal(old[old_index..old_index + len].to_vec())),
            similar::DiffOp::Delete {
                old_index, old_len, ..
            } => push_op(
                &mut ops,
                DiffOp::Delete(old[old_index..old_index + old_len].to_vec()),
            ),
            similar::DiffOp::Insert {
                new_index, new_len, ..
            } => push_op(
                &mut ops,
                DiffOp::Insert(new[new_index..new_index + new_len].to_vec()),
            ),
            similar::DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                push_op(
                    &mut ops,
                    DiffOp::Delete(old[old_index..old_index + old_len].to_vec()),
                );
                push_op(
                    &mut ops,
                    DiffOp::Insert(new[new_index..new_index + new_len].to_vec()),
                );
            }
        }
    }

    ops
}

/// Append `op`, merging it into the previous run when both are the same kind.
/// A delete directly after an insert is moved in front of it so that each
/// change region always reads deletions first.
fn push_op<'a>(ops: &mut Vec<DiffOp<'a>>, op: DiffOp<'a>) {
    if op.lines().is_empty() {
        return;
    }
    if let Some(last) = ops.last_mut() {
        if last.same_kind(&op) {
            last.lines_mut().extend_from_slice(op.lines());
            return;
        }
    }
    if let DiffOp::Delete(_) = op {
        if let Some(DiffOp::Insert(_)) = ops.last() {
            let insert = ops.pop();
            push_op(ops, op);
            if let Some(insert) = insert {
                ops.push(insert);
            }
            return;
        }
    }
    ops.push(op);
}

/// True when the script contains at least one insertion or deletion.
pub fn has_changes(ops: &[DiffOp<'_>]) -> bool {
    ops.iter().any(DiffOp::is_change)
}

/// Rebuild the old sequence from an edit script.
#[cfg(test)]
pub fn replay_old<'a>(ops: &[DiffOp<'a>]) -> Vec<&'a str> {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Insert(_)))
        .flat_map(|op| op.lines().iter().copied())
        .collect()
}

/// Rebuild the new sequence from an edit script.
#[cfg(test)]
pub fn replay_new<'a>(ops: &[DiffOp<'a>]) -> Vec<&'a str> {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Delete(_)))
        .flat_map(|op| op.lines().iter().copied())
        .collect()
}
