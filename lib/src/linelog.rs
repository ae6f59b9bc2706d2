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

//! An editable line history of a single file across a stack of
//! revisions, in the interleaved-delta style.
//!
//! Every line that ever existed occupies a slot in document order,
//! tagged with the revision that introduced it and, once replaced or
//! removed, the revision that deleted it. Checking out a revision walks
//! the slots and keeps the ones visible there. That makes fractional
//! override revisions first-class: an absorb edit is just a label
//! between two integer revisions, and it becomes visible to every later
//! checkout without touching any other slot.

use std::collections::HashMap;

use bstr::BStr;
use bstr::BString;
use itertools::Itertools;

use crate::diff::diff_lines;
use crate::diff::split_lines;
use crate::rev::Rev;

/// Stable identity of a line, preserved across revisions and edits.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LineId(u64);

/// Provenance of one visible line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineInfo {
    /// Revision that introduced the line.
    pub rev: Rev,
    /// Identity of the line itself.
    pub line_id: LineId,
}

#[derive(Clone, Debug)]
struct Slot {
    data: BString,
    introduced: Rev,
    deleted: Option<Rev>,
    id: LineId,
}

impl Slot {
    fn is_visible(&self, rev: Rev) -> bool {
        self.introduced <= rev && self.deleted.map_or(true, |deleted| deleted > rev)
    }
}

/// Line history of one file.
#[derive(Clone, Debug, Default)]
pub struct Linelog {
    slots: Vec<Slot>,
    next_line_id: u64,
}

impl Linelog {
    pub fn new() -> Self {
        Linelog::default()
    }

    /// Full text at `rev`.
    pub fn checkout(&self, rev: Rev) -> BString {
        let mut text = Vec::new();
        for slot in &self.slots {
            if slot.is_visible(rev) {
                text.extend_from_slice(&slot.data);
            }
        }
        text.into()
    }

    /// Per-line provenance at `rev`, in document order.
    pub fn checkout_lines(&self, rev: Rev) -> Vec<LineInfo> {
        self.slots
            .iter()
            .filter(|slot| slot.is_visible(rev))
            .map(|slot| LineInfo {
                rev: slot.introduced,
                line_id: slot.id,
            })
            .collect()
    }

    /// Within the view at `from_rev`, replaces lines `[a1, a2)` by
    /// `new_lines`, attributing the edit to `to_rev`: the replaced lines
    /// disappear from `to_rev` onward and the new lines appear from
    /// `to_rev` onward. Checkouts below `to_rev` are unaffected.
    ///
    /// Panics if `[a1, a2)` is not a valid range of the `from_rev` view.
    pub fn edit_chunk(
        &mut self,
        from_rev: Rev,
        a1: usize,
        a2: usize,
        to_rev: Rev,
        new_lines: &[impl AsRef<[u8]>],
    ) {
        let visible: Vec<usize> = self
            .slots
            .iter()
            .positions(|slot| slot.is_visible(from_rev))
            .collect();
        assert!(
            a1 <= a2 && a2 <= visible.len(),
            "line range {a1}..{a2} is outside the view at {from_rev}"
        );
        for &index in &visible[a1..a2] {
            self.slots[index].deleted = Some(to_rev);
        }
        let insert_at = visible.get(a1).copied().unwrap_or(self.slots.len());
        let mut new_slots = Vec::with_capacity(new_lines.len());
        for line in new_lines {
            new_slots.push(Slot {
                data: BString::from(line.as_ref()),
                introduced: to_rev,
                deleted: None,
                id: LineId(self.next_line_id),
            });
            self.next_line_id += 1;
        }
        self.slots.splice(insert_at..insert_at, new_slots);
    }

    /// Records revision `rev` as having the given full text, expressed
    /// as edits against the current content at `rev`.
    pub fn record_text(&mut self, rev: Rev, text: &BStr) {
        let old_text = self.checkout(rev);
        let old_lines = split_lines(&old_text);
        let new_lines = split_lines(text);
        let blocks = diff_lines(&old_lines, &new_lines);
        // Same-rev edits change the view they are indexed against, so
        // apply bottom-up to keep the earlier block positions valid.
        for block in blocks.iter().rev() {
            self.edit_chunk(
                rev,
                block.old.start,
                block.old.end,
                rev,
                &new_lines[block.new.clone()],
            );
        }
    }

    /// Rewrites revision labels. Revisions absent from the mapping keep
    /// their label. The mapping must preserve the relative order of the
    /// labels it touches.
    pub fn remap_revs(&mut self, mapping: &HashMap<Rev, Rev>) {
        for slot in &mut self.slots {
            if let Some(&to) = mapping.get(&slot.introduced) {
                slot.introduced = to;
            }
            if let Some(deleted) = slot.deleted {
                if let Some(&to) = mapping.get(&deleted) {
                    slot.deleted = Some(to);
                }
            }
        }
    }
}
