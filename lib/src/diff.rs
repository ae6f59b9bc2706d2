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

//! Line-level text diffing for the absorb analysis.
//!
//! Works on whole lines only: anchor on the rarest lines occurring
//! equally often on both sides, take a longest common chain of the
//! anchors, recurse into the gaps, and fall back to common prefix/suffix
//! trimming when no anchor exists.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::iter;
use std::ops::Range;

use bstr::BStr;

/// Splits `text` into lines. Every line keeps its trailing newline; the
/// last line may lack one.
pub fn split_lines(text: &[u8]) -> Vec<&BStr> {
    text.split_inclusive(|b| *b == b'\n').map(BStr::new).collect()
}

/// One changed region: `old` lines are replaced by `new` lines. Either
/// side may be empty (pure insertion or deletion).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiffBlock {
    pub old: Range<usize>,
    pub new: Range<usize>,
}

/// Lines repeating more often than this on both sides are never used as
/// anchors.
const MAX_OCCURRENCES: usize = 100;

/// Computes an ordered, non-overlapping cover of the differences between
/// two line arrays: concatenating the common runs between blocks with
/// each block's own side reconstructs the corresponding input.
pub fn diff_lines(old: &[&BStr], new: &[&BStr]) -> Vec<DiffBlock> {
    let mut matches = Vec::new();
    collect_unchanged_lines(&mut matches, old, new, 0, 0);
    debug_assert!(
        matches
            .windows(2)
            .all(|pair| pair[0].0 < pair[1].0 && pair[0].1 < pair[1].1),
        "matched lines must be strictly increasing on both sides"
    );
    let mut blocks = Vec::new();
    let (mut a, mut b) = (0, 0);
    for (i, j) in matches
        .into_iter()
        .chain(iter::once((old.len(), new.len())))
    {
        if i > a || j > b {
            blocks.push(DiffBlock { old: a..i, new: b..j });
        }
        a = i + 1;
        b = j + 1;
    }
    blocks
}

/// Records positions of lines common to `old` and `new` (counted from
/// `old_offset`/`new_offset`), in ascending order on both sides.
fn collect_unchanged_lines(
    found: &mut Vec<(usize, usize)>,
    old: &[&BStr],
    new: &[&BStr],
    old_offset: usize,
    new_offset: usize,
) {
    if old.is_empty() || new.is_empty() {
        return;
    }

    // Prefer rare-line anchors; trim the common prefix and suffix only
    // when no anchor exists.
    let len_before = found.len();
    collect_unchanged_lines_by_anchors(found, old, new, old_offset, new_offset);
    if found.len() != len_before {
        return;
    }

    let common_leading = iter::zip(old, new).take_while(|(a, b)| a == b).count();
    let old_rest = &old[common_leading..];
    let new_rest = &new[common_leading..];
    let common_trailing = iter::zip(old_rest.iter().rev(), new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    found.extend((0..common_leading).map(|i| (old_offset + i, new_offset + i)));
    found.extend(
        (1..=common_trailing)
            .rev()
            .map(|i| (old_offset + old.len() - i, new_offset + new.len() - i)),
    );
}

fn collect_unchanged_lines_by_anchors(
    found: &mut Vec<(usize, usize)>,
    old: &[&BStr],
    new: &[&BStr],
    old_offset: usize,
    new_offset: usize,
) {
    let mut old_occurrences: HashMap<&BStr, Vec<usize>> = HashMap::new();
    for (i, &line) in old.iter().enumerate() {
        let positions = old_occurrences.entry(line).or_default();
        // Keep one more than the cap so over-represented lines stay
        // recognizable below.
        if positions.len() <= MAX_OCCURRENCES {
            positions.push(i);
        }
    }
    let mut count_to_lines: BTreeMap<usize, Vec<&BStr>> = BTreeMap::new();
    for (&line, positions) in &old_occurrences {
        count_to_lines.entry(positions.len()).or_default().push(line);
    }
    if count_to_lines
        .keys()
        .next()
        .map_or(true, |&count| count > MAX_OCCURRENCES)
    {
        // Every line repeats too often to tell occurrences apart.
        return;
    }

    let mut new_occurrences: HashMap<&BStr, Vec<usize>> = HashMap::new();
    for (i, &line) in new.iter().enumerate() {
        let positions = new_occurrences.entry(line).or_default();
        if positions.len() <= MAX_OCCURRENCES {
            positions.push(i);
        }
    }

    // Anchor on the rarest lines occurring equally often on both sides,
    // pairing the k-th occurrence on one side with the k-th on the other.
    let Some(anchors) = count_to_lines.values().find_map(|anchor_lines| {
        let pairs: Vec<(usize, usize)> = anchor_lines
            .iter()
            .filter_map(|line| {
                let old_positions = &old_occurrences[line];
                let new_positions = new_occurrences.get(line)?;
                (old_positions.len() == new_positions.len()).then(|| {
                    iter::zip(old_positions.iter().copied(), new_positions.iter().copied())
                })
            })
            .flatten()
            .collect();
        (!pairs.is_empty()).then_some(pairs)
    }) else {
        return;
    };

    let mut old_positions: Vec<(usize, usize)> = anchors
        .iter()
        .enumerate()
        .map(|(serial, &(old_pos, _))| (old_pos, serial))
        .collect();
    let mut new_positions: Vec<(usize, usize)> = anchors
        .iter()
        .enumerate()
        .map(|(serial, &(_, new_pos))| (new_pos, serial))
        .collect();
    old_positions.sort_unstable();
    new_positions.sort_unstable();
    let mut old_index_by_serial = vec![0; anchors.len()];
    for (index, &(_, serial)) in old_positions.iter().enumerate() {
        old_index_by_serial[serial] = index;
    }
    let old_index_by_new_index: Vec<usize> = new_positions
        .iter()
        .map(|&(_, serial)| old_index_by_serial[serial])
        .collect();

    let chain = longest_common_chain(&old_index_by_new_index);

    // Emit the anchors on the chain, recursing into the gap before each
    // one and into the range after the last.
    let mut previous_old = 0;
    let mut previous_new = 0;
    for (old_index, new_index) in chain {
        let old_pos = old_positions[old_index].0;
        let new_pos = new_positions[new_index].0;
        collect_unchanged_lines(
            found,
            &old[previous_old..old_pos],
            &new[previous_new..new_pos],
            old_offset + previous_old,
            new_offset + previous_new,
        );
        found.push((old_offset + old_pos, new_offset + new_pos));
        previous_old = old_pos + 1;
        previous_new = new_pos + 1;
    }
    collect_unchanged_lines(
        found,
        &old[previous_old..],
        &new[previous_new..],
        old_offset + previous_old,
        new_offset + previous_new,
    );
}

/// Given `left_for_right[right] = left`, finds a longest subsequence of
/// `(left, right)` pairs that is increasing in both coordinates.
fn longest_common_chain(left_for_right: &[usize]) -> Vec<(usize, usize)> {
    if left_for_right.is_empty() {
        return vec![];
    }
    // (chain length ending here, predecessor right position)
    let mut best: Vec<(usize, usize)> = vec![(1, usize::MAX); left_for_right.len()];
    let mut best_end = 0;
    for right in 0..left_for_right.len() {
        for candidate in 0..right {
            if left_for_right[candidate] < left_for_right[right]
                && best[candidate].0 + 1 > best[right].0
            {
                best[right] = (best[candidate].0 + 1, candidate);
            }
        }
        if best[right].0 > best[best_end].0 {
            best_end = right;
        }
    }
    let mut chain = Vec::new();
    let mut right = best_end;
    loop {
        chain.push((left_for_right[right], right));
        let (_, previous) = best[right];
        if previous == usize::MAX {
            break;
        }
        right = previous;
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&BStr> {
        split_lines(text.as_bytes())
    }

    fn block(old: Range<usize>, new: Range<usize>) -> DiffBlock {
        DiffBlock { old, new }
    }

    fn diff(old_text: &str, new_text: &str) -> Vec<DiffBlock> {
        diff_lines(&lines(old_text), &lines(new_text))
    }

    /// Checks that the blocks cover both inputs exactly, with identical
    /// common runs in between.
    fn assert_cover(old_text: &str, new_text: &str) {
        let old_lines = lines(old_text);
        let new_lines = lines(new_text);
        let blocks = diff_lines(&old_lines, &new_lines);
        let (mut a, mut b) = (0, 0);
        for block in &blocks {
            assert!(a <= block.old.start && b <= block.new.start);
            assert_eq!(block.old.start - a, block.new.start - b);
            assert_eq!(
                &old_lines[a..block.old.start],
                &new_lines[b..block.new.start]
            );
            a = block.old.end;
            b = block.new.end;
        }
        assert_eq!(&old_lines[a..], &new_lines[b..]);
    }

    #[test]
    fn test_split_lines_empty() {
        assert_eq!(split_lines(b""), Vec::<&BStr>::new());
    }

    #[test]
    fn test_split_lines_keeps_newlines() {
        assert_eq!(
            split_lines(b"a\nbb\n"),
            vec![BStr::new("a\n"), BStr::new("bb\n")]
        );
    }

    #[test]
    fn test_split_lines_missing_newline_at_eof() {
        assert_eq!(split_lines(b"a\nb"), vec![BStr::new("a\n"), BStr::new("b")]);
    }

    #[test]
    fn test_diff_lines_both_empty() {
        assert_eq!(diff("", ""), vec![]);
    }

    #[test]
    fn test_diff_lines_equal() {
        assert_eq!(diff("a\nb\n", "a\nb\n"), vec![]);
    }

    #[test]
    fn test_diff_lines_everything_added() {
        assert_eq!(diff("", "a\nb\n"), vec![block(0..0, 0..2)]);
    }

    #[test]
    fn test_diff_lines_everything_removed() {
        assert_eq!(diff("a\nb\n", ""), vec![block(0..2, 0..0)]);
    }

    #[test]
    fn test_diff_lines_insert_in_middle() {
        assert_eq!(diff("a\nz\n", "a\ns\nz\n"), vec![block(1..1, 1..2)]);
    }

    #[test]
    fn test_diff_lines_insert_at_eof() {
        assert_eq!(diff("x\n", "x\ny\n"), vec![block(1..1, 1..2)]);
    }

    #[test]
    fn test_diff_lines_delete_in_middle() {
        assert_eq!(diff("a\nb\nc\n", "a\nc\n"), vec![block(1..2, 1..1)]);
    }

    #[test]
    fn test_diff_lines_replace_line() {
        assert_eq!(diff("a\nb\nc\n", "a\nB\nc\n"), vec![block(1..2, 1..2)]);
    }

    #[test]
    fn test_diff_lines_nothing_in_common() {
        assert_eq!(diff("aaa\n", "bb\n"), vec![block(0..1, 0..1)]);
    }

    #[test]
    fn test_diff_lines_repeated_line_shrinks() {
        // "a" repeats on one side only, so the prefix fallback decides.
        assert_eq!(diff("a\na\n", "a\n"), vec![block(1..2, 1..1)]);
    }

    #[test]
    fn test_diff_lines_recursion_into_gaps() {
        // "|" anchors first, then "b" matches inside the left gap.
        assert_eq!(
            diff("a\nb\n|\nb\nc\n", "b\n|\nd\n"),
            vec![block(0..1, 0..0), block(3..5, 2..3)]
        );
    }

    #[test]
    fn test_diff_lines_swapped_lines() {
        assert_cover("a\nb\n", "b\na\n");
    }

    #[test]
    fn test_diff_lines_cover_property() {
        assert_cover("a\nb\nc\nd\n", "a\nB\nc\nD\nE\n");
        assert_cover("x\nx\ny\nx\n", "x\ny\nx\nx\n");
        assert_cover(
            "fn main() {\n    body\n}\n",
            "fn main() {\n    other\n    body\n}\n",
        );
        assert_cover("no newline", "no newline at all");
    }
}
