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

//! The sequence of texts one file goes through in a revision stack.

use bstr::BString;

use crate::linelog::Linelog;
use crate::rev::Rev;

/// Immutable sequence of one file's revision texts.
///
/// Revision 0 is the public base and is never rewritten; the last
/// revision is the working copy. A state is backed either by plain
/// materialized texts or by a [`Linelog`]; the latter also answers
/// fractional checkouts, which is how staged absorb edits are read back.
#[derive(Clone, Debug)]
pub struct FileStackState {
    source: FileStackSource,
}

#[derive(Clone, Debug)]
enum FileStackSource {
    Plain { texts: Vec<BString> },
    Linelog { linelog: Linelog, rev_length: usize },
}

impl FileStackState {
    pub fn new(texts: Vec<BString>) -> Self {
        FileStackState {
            source: FileStackSource::Plain { texts },
        }
    }

    pub fn from_linelog(linelog: Linelog, rev_length: usize) -> Self {
        FileStackState {
            source: FileStackSource::Linelog {
                linelog,
                rev_length,
            },
        }
    }

    /// Number of revisions, the working copy included.
    pub fn rev_length(&self) -> usize {
        match &self.source {
            FileStackSource::Plain { texts } => texts.len(),
            FileStackSource::Linelog { rev_length, .. } => *rev_length,
        }
    }

    /// Text at `rev`. A linelog-backed state resolves fractional
    /// revisions; a plain state indexes by the integer part.
    ///
    /// Panics if the integer part is not a valid stack position.
    pub fn text_at(&self, rev: Rev) -> BString {
        assert!(
            rev.index() < self.rev_length(),
            "revision {rev} is outside the stack"
        );
        match &self.source {
            FileStackSource::Plain { texts } => texts[rev.index()].clone(),
            FileStackSource::Linelog { linelog, .. } => linelog.checkout(rev),
        }
    }

    /// All revision texts, in stack order.
    pub fn texts(&self) -> Vec<BString> {
        (0..self.rev_length())
            .map(|index| self.text_at(Rev::from_index(index)))
            .collect()
    }

    /// The bottom `rev_length` revisions as a plain state.
    pub fn truncated(&self, rev_length: usize) -> Self {
        assert!(rev_length <= self.rev_length());
        FileStackState::new(
            (0..rev_length)
                .map(|index| self.text_at(Rev::from_index(index)))
                .collect(),
        )
    }

    /// Converts to a linelog by recording every revision in order.
    pub fn to_linelog(&self) -> Linelog {
        match &self.source {
            FileStackSource::Plain { texts } => {
                let mut linelog = Linelog::new();
                for (index, text) in texts.iter().enumerate() {
                    linelog.record_text(Rev::from_index(index), text.as_ref());
                }
                linelog
            }
            FileStackSource::Linelog { linelog, .. } => linelog.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rev::embed_absorb_id;
    use crate::rev::AbsorbEditId;

    fn stack(texts: &[&str]) -> FileStackState {
        FileStackState::new(texts.iter().map(|text| BString::from(*text)).collect())
    }

    #[test]
    fn test_linelog_round_trip() {
        let state = stack(&["", "a\n", "a\nb\n", "b\n"]);
        let linelog = state.to_linelog();
        for index in 0..state.rev_length() {
            let rev = Rev::from_index(index);
            assert_eq!(linelog.checkout(rev), state.text_at(rev));
        }
    }

    #[test]
    fn test_truncated_drops_top_revisions() {
        let state = stack(&["a\n", "a\nb\n", "a\nb\nc\n"]);
        let truncated = state.truncated(2);
        assert_eq!(truncated.rev_length(), 2);
        assert_eq!(truncated.texts(), state.truncated(2).texts());
        assert_eq!(truncated.text_at(Rev::from_index(1)), "a\nb\n");
    }

    #[test]
    fn test_linelog_backed_state_resolves_fractional_revs() {
        let mut linelog = stack(&["a\n"]).to_linelog();
        let target = embed_absorb_id(Rev::from_index(0), AbsorbEditId::new(0)).unwrap();
        linelog.edit_chunk(Rev::from_index(0), 0, 1, target, &["A\n"]);
        let state = FileStackState::from_linelog(linelog, 1);
        assert_eq!(state.text_at(Rev::from_index(0)), "a\n");
        assert_eq!(state.text_at(target), "A\n");
    }

    #[test]
    fn test_missing_trailing_newline_round_trips() {
        let state = stack(&["a", "a\nb"]);
        let linelog = state.to_linelog();
        assert_eq!(linelog.checkout(Rev::from_index(0)), "a");
        assert_eq!(linelog.checkout(Rev::from_index(1)), "a\nb");
    }
}
