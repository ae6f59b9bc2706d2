// Copyright 2025 The Absorb Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Absorb analysis and application for a single file's revision stack.
//!
//! Given the stack of texts a file went through plus a pending
//! working-copy text, [`analyse_file_stack`] fuses a line diff with
//! per-line blame to propose, for every changed hunk, the stack revision
//! that last touched the surrounding lines. [`apply_file_stack_edits`]
//! folds accepted hunks back into their revisions.
//! [`calculate_absorb_edits_for_file_stack`] instead stages every hunk
//! as its own fractional revision, so a UI can re-target or drop single
//! hunks without re-analysing.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::ops::Range;

use bstr::BStr;
use bstr::BString;
use indexmap::IndexMap;
use itertools::Itertools;
use thiserror::Error;
use tracing::instrument;

use crate::diff::diff_lines;
use crate::diff::split_lines;
use crate::file_stack::FileStackState;
use crate::linelog::LineInfo;
use crate::rev::embed_absorb_id;
use crate::rev::AbsorbEditId;
use crate::rev::Rev;
use crate::rev::RevEncodeError;

/// One contiguous region of the diff between the stack top and the new
/// text, classified by the provenance of the lines it touches.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AbsorbDiffChunk {
    /// Replaced line range in the stack-top text.
    pub old: Range<usize>,
    /// Replacement line range in the new text.
    pub new: Range<usize>,
    /// The replaced lines.
    pub old_lines: Vec<BString>,
    /// The replacement lines.
    pub new_lines: Vec<BString>,
    /// Earliest revision this chunk may be folded into.
    pub introduction_rev: Rev,
    /// Proposed destination revision. `None` leaves the chunk in the
    /// working copy.
    pub selected_rev: Option<Rev>,
    /// Identity of this chunk in a preview linelog, assigned by
    /// [`calculate_absorb_edits_for_file_stack`].
    pub absorb_edit_id: Option<AbsorbEditId>,
}

pub type AbsorbResult<T> = Result<T, AbsorbError>;

#[derive(Debug, Error)]
pub enum AbsorbError {
    /// There is no revision to analyse or apply against.
    #[error("file stack has no revisions")]
    EmptyStack,
    /// A chunk was re-targeted below the revision that introduced it.
    #[error("cannot fold chunk into {selected}: its lines were introduced at {introduction}")]
    InvalidDestination { selected: Rev, introduction: Rev },
    /// The line diff broke its ordered-cover contract.
    #[error("diff block {old_start}..{old_end} is out of order or out of bounds")]
    UnsupportedHunk { old_start: usize, old_end: usize },
    #[error(transparent)]
    RevEncode(#[from] RevEncodeError),
}

/// Proposes a destination revision for every hunk of `new_text` relative
/// to the stack top (or `stack_top_rev`, when given).
///
/// Chunks come back in text order. A chunk's `selected_rev` stays
/// unassigned when the surrounding lines are public or of mixed origin,
/// leaving the hunk in the working copy unless the user picks a
/// destination.
#[instrument(skip_all)]
pub fn analyse_file_stack(
    stack: &FileStackState,
    new_text: &BStr,
    stack_top_rev: Option<Rev>,
) -> AbsorbResult<Vec<AbsorbDiffChunk>> {
    if stack.rev_length() == 0 {
        return Err(AbsorbError::EmptyStack);
    }
    let old_rev = stack_top_rev.unwrap_or_else(|| Rev::from_index(stack.rev_length() - 1));
    let linelog = stack.to_linelog();
    let old_text = linelog.checkout(old_rev);
    let blame = linelog.checkout_lines(old_rev);
    let old_lines = split_lines(&old_text);
    let new_lines = split_lines(new_text);

    let make_chunk = |old: Range<usize>,
                      new: Range<usize>,
                      introduction_rev: Rev,
                      selected_rev: Option<Rev>| {
        AbsorbDiffChunk {
            old_lines: owned_lines(&old_lines, old.clone()),
            new_lines: owned_lines(&new_lines, new.clone()),
            old,
            new,
            introduction_rev,
            selected_rev,
            absorb_edit_id: None,
        }
    };

    let mut chunks: Vec<AbsorbDiffChunk> = Vec::new();
    let mut covered = (0, 0);
    for block in diff_lines(&old_lines, &new_lines) {
        let (a1, a2) = (block.old.start, block.old.end);
        let (b1, b2) = (block.new.start, block.new.end);
        if a1 < covered.0 || b1 < covered.1 || a2 > old_lines.len() || b2 > new_lines.len() {
            return Err(AbsorbError::UnsupportedHunk {
                old_start: a1,
                old_end: a2,
            });
        }
        covered = (a2, b2);

        // Pure insertion: absorbable when exactly one of the surrounding
        // lines belongs to a non-public revision.
        if a1 == a2 {
            let involved: Vec<Rev> = [a2, a1.saturating_sub(1)]
                .into_iter()
                .filter(|&index| index < old_lines.len())
                .map(|index| blame[index].rev)
                .unique()
                .collect();
            let targets: Vec<Rev> = involved
                .iter()
                .copied()
                .filter(|rev| !rev.is_public())
                .collect();
            if let [rev] = targets[..] {
                chunks.push(make_chunk(a1..a2, b1..b2, rev, Some(rev)));
            } else {
                let introduction_rev = involved.iter().copied().max().unwrap_or(Rev::PUBLIC);
                chunks.push(make_chunk(a1..a2, b1..b2, introduction_rev, None));
            }
            continue;
        }

        let involved: BTreeSet<Rev> = blame[a1..a2].iter().map(|line| line.rev).collect();

        // Every touched line comes from the same non-public revision.
        if involved.len() == 1 {
            let rev = *involved.iter().next().unwrap();
            if !rev.is_public() {
                chunks.push(make_chunk(a1..a2, b1..b2, rev, Some(rev)));
                continue;
            }
        }

        // Pure deletion: split by the revision that owns each removed
        // run. A run owned by the public base keeps rev 0 as its
        // selection; the committed applier filters it out, but it stays
        // observable to the caller.
        if b1 == b2 {
            split_chunk(a1, a2, &blame, |start, end, rev| {
                chunks.push(make_chunk(start..end, b1..b2, rev, Some(rev)));
            });
            continue;
        }

        // Equal-length replacement: zip the sides one to one and split
        // by owner. Runs owned by the public base stay unassigned.
        if a2 - a1 == b2 - b1 && involved.iter().any(|rev| !rev.is_public()) {
            split_chunk(a1, a2, &blame, |start, end, rev| {
                let new_range = (start - a1 + b1)..(end - a1 + b1);
                let selected_rev = (!rev.is_public()).then_some(rev);
                chunks.push(make_chunk(start..end, new_range, rev, selected_rev));
            });
            continue;
        }

        // Anything else, e.g. an uneven replacement over mixed origins:
        // keep the hunk whole and let the user pick a destination.
        let introduction_rev = involved.iter().copied().max().unwrap_or(Rev::PUBLIC);
        chunks.push(make_chunk(a1..a2, b1..b2, introduction_rev, None));
    }
    tracing::trace!(chunk_count = chunks.len(), "classified diff blocks");
    Ok(chunks)
}

/// Folds the selected chunks back into their destination revisions and
/// returns the rewritten stack.
///
/// Chunks without a destination, or pointing at the public base, are
/// left out. Revisions below every destination come back unchanged, and
/// revision 0 is always identical to the input.
#[instrument(skip_all)]
pub fn apply_file_stack_edits<'a>(
    stack: &FileStackState,
    chunks: impl IntoIterator<Item = &'a AbsorbDiffChunk>,
) -> AbsorbResult<FileStackState> {
    let rev_length = stack.rev_length();
    if rev_length == 0 {
        return Err(AbsorbError::EmptyStack);
    }
    let old_rev = Rev::from_index(rev_length - 1);
    let mut linelog = stack.to_linelog();
    // Double every revision label so each odd label is a free override
    // slot right above the revision it amends.
    let doubled: HashMap<Rev, Rev> = (0..rev_length)
        .map(|index| (Rev::from_index(index), Rev::from_index(index * 2)))
        .collect();
    linelog.remap_revs(&doubled);

    let selected = chunks
        .into_iter()
        .filter_map(|chunk| {
            let target = chunk.selected_rev.filter(|rev| !rev.is_public())?;
            Some((target, chunk))
        })
        .sorted_by_key(|&(_, chunk)| Reverse(chunk.old.end));
    // The edits share the stack-top coordinate space; applying bottom-up
    // keeps every remaining chunk's line numbers valid.
    for (target, chunk) in selected {
        if target < chunk.introduction_rev {
            return Err(AbsorbError::InvalidDestination {
                selected: target,
                introduction: chunk.introduction_rev,
            });
        }
        linelog.edit_chunk(
            Rev::from_index(old_rev.index() * 2),
            chunk.old.start,
            chunk.old.end,
            Rev::from_index(target.index() * 2 + 1),
            &chunk.new_lines,
        );
    }
    let texts = (0..rev_length)
        .map(|index| linelog.checkout(Rev::from_index(index * 2 + 1)))
        .collect();
    Ok(FileStackState::new(texts))
}

/// Stages every analysed hunk as its own fractional revision in one
/// linelog, so each can be re-targeted or dropped independently.
///
/// The input stack carries the working copy as its top revision. The
/// returned stack is linelog-backed: checking out
/// [`rev_with_absorb`](crate::rev::rev_with_absorb)`(i)` yields revision
/// `i` with every edit currently assigned to it, while integer checkouts
/// are unaffected by edits still parked on the working copy.
#[instrument(skip_all)]
pub fn calculate_absorb_edits_for_file_stack(
    stack: &FileStackState,
) -> AbsorbResult<(FileStackState, IndexMap<AbsorbEditId, AbsorbDiffChunk>)> {
    let rev_length = stack.rev_length();
    // A single revision is just the working copy; there is no stack
    // below it to absorb into.
    if rev_length < 2 {
        return Err(AbsorbError::EmptyStack);
    }
    let wdir_rev = Rev::from_index(rev_length - 1);
    let stack_top_rev = Rev::from_index(rev_length - 2);
    let new_text = stack.text_at(wdir_rev);
    let truncated = stack.truncated(rev_length - 1);
    let mut chunks = analyse_file_stack(&truncated, new_text.as_ref(), None)?;
    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.absorb_edit_id = Some(AbsorbEditId::new(index as u32));
    }

    let mut linelog = truncated.to_linelog();
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    order.sort_by_key(|&index| Reverse(chunks[index].old.end));
    for index in order {
        let chunk = &chunks[index];
        // Unassigned chunks, and deletions pinned to the public base,
        // stay with the working copy.
        let base = match chunk.selected_rev {
            Some(rev) if !rev.is_public() => rev,
            _ => wdir_rev,
        };
        let target = embed_absorb_id(base, AbsorbEditId::new(index as u32))?;
        if target < chunk.introduction_rev {
            return Err(AbsorbError::InvalidDestination {
                selected: target,
                introduction: chunk.introduction_rev,
            });
        }
        linelog.edit_chunk(
            stack_top_rev,
            chunk.old.start,
            chunk.old.end,
            target,
            &chunk.new_lines,
        );
    }

    let new_stack = FileStackState::from_linelog(linelog, rev_length);
    let edits = chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| (AbsorbEditId::new(index as u32), chunk))
        .collect();
    Ok((new_stack, edits))
}

fn owned_lines(lines: &[&BStr], range: Range<usize>) -> Vec<BString> {
    lines[range]
        .iter()
        .map(|line| BString::from(line.to_vec()))
        .collect()
}

/// Calls `emit` once per maximal run of consecutive lines in
/// `[start, end)` owned by the same revision. Runs come out in order and
/// cover the range exactly.
fn split_chunk(start: usize, end: usize, blame: &[LineInfo], mut emit: impl FnMut(usize, usize, Rev)) {
    let mut run_start = start;
    for i in start..end {
        if i + 1 == end || blame[i + 1].rev != blame[i].rev {
            emit(run_start, i + 1, blame[i].rev);
            run_start = i + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linelog::Linelog;

    /// Builds a linelog whose top checkout blames line `i` on
    /// `revs[i]`, by growing the file one revision at a time.
    fn blame_of(revs: &[usize]) -> Vec<LineInfo> {
        let max_rev = revs.iter().copied().max().unwrap_or(0);
        let mut linelog = Linelog::new();
        for rev in 0..=max_rev {
            let text: String = revs
                .iter()
                .enumerate()
                .filter(|&(_, &line_rev)| line_rev <= rev)
                .map(|(position, _)| format!("{position}\n"))
                .collect();
            linelog.record_text(Rev::from_index(rev), BStr::new(&text));
        }
        linelog.checkout_lines(Rev::from_index(max_rev))
    }

    #[test]
    fn test_split_chunk_single_run() {
        let blame = blame_of(&[1, 1, 1]);
        let mut runs = Vec::new();
        split_chunk(0, 3, &blame, |start, end, rev| runs.push((start, end, rev)));
        assert_eq!(runs, vec![(0, 3, Rev::from_index(1))]);
    }

    #[test]
    fn test_split_chunk_boundaries_at_rev_changes() {
        let blame = blame_of(&[0, 0, 1, 2, 2]);
        let mut runs = Vec::new();
        split_chunk(1, 5, &blame, |start, end, rev| runs.push((start, end, rev)));
        assert_eq!(
            runs,
            vec![
                (1, 2, Rev::from_index(0)),
                (2, 3, Rev::from_index(1)),
                (3, 5, Rev::from_index(2)),
            ]
        );
    }

    #[test]
    fn test_split_chunk_empty_range() {
        let blame = blame_of(&[1]);
        let mut runs = Vec::new();
        split_chunk(1, 1, &blame, |start, end, rev| runs.push((start, end, rev)));
        assert_eq!(runs, vec![]);
    }
}
