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

//! Virtual-revision arithmetic.
//!
//! A stack revision is an integer position, but the preview applier needs
//! many uncommitted edits to coexist in one linelog. Each edit id is
//! embedded into the fractional component of a fixed-point revision
//! number, so a single physical linelog carries every pending edit while
//! staying checkout-able at any point in between. The fixed-point
//! representation keeps all of the arithmetic here exact.

use std::fmt;

use thiserror::Error;

/// Number of fractional bits in a [`Rev`].
const FRACTION_BITS: u32 = 20;
/// One integer revision step.
const UNIT: u64 = 1 << FRACTION_BITS;
const FRACTION_MASK: u64 = UNIT - 1;

/// A virtual revision: a fixed-point number whose integer part is a stack
/// position and whose fractional part optionally encodes an
/// [`AbsorbEditId`].
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Rev(u64);

impl Rev {
    /// The immutable public base of a stack.
    pub const PUBLIC: Rev = Rev(0);

    /// The revision at integer stack position `index`.
    pub fn from_index(index: usize) -> Self {
        Rev((index as u64) << FRACTION_BITS)
    }

    /// The integer stack position, with any fractional component
    /// discarded.
    pub fn index(self) -> usize {
        (self.0 >> FRACTION_BITS) as usize
    }

    /// Whether the integer part is revision 0, the public base.
    pub fn is_public(self) -> bool {
        self.0 < UNIT
    }

    /// Whether this revision carries no embedded absorb edit id.
    pub fn is_integer(self) -> bool {
        self.fraction() == 0
    }

    fn fraction(self) -> u64 {
        self.0 & FRACTION_MASK
    }
}

impl fmt::Display for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self.index();
        match self.fraction() {
            0 => write!(f, "{index}"),
            fraction => write!(f, "{index}+{fraction}/{UNIT}"),
        }
    }
}

impl fmt::Debug for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({self})")
    }
}

/// Identifier of a single absorb edit within one analysis result.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AbsorbEditId(u32);

impl AbsorbEditId {
    /// The largest id [`embed_absorb_id`] accepts. The fractional slot
    /// above it is reserved for [`rev_with_absorb`] checkouts.
    pub const MAX: AbsorbEditId = AbsorbEditId((UNIT - 2) as u32);

    pub fn new(value: u32) -> Self {
        AbsorbEditId(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AbsorbEditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error from embedding or extracting an absorb edit id.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RevEncodeError {
    #[error("cannot embed an absorb edit id into fractional revision {0}")]
    NonIntegerRev(Rev),
    #[error("absorb edit id {0} is out of range")]
    IdOutOfRange(AbsorbEditId),
    #[error("revision {0} has no embedded absorb edit id")]
    MissingAbsorbId(Rev),
}

/// Embeds `id` into the fractional component of the integer revision
/// `rev`, producing a revision strictly between `rev` and `rev + 1`.
pub fn embed_absorb_id(rev: Rev, id: AbsorbEditId) -> Result<Rev, RevEncodeError> {
    if !rev.is_integer() {
        return Err(RevEncodeError::NonIntegerRev(rev));
    }
    if id > AbsorbEditId::MAX {
        return Err(RevEncodeError::IdOutOfRange(id));
    }
    Ok(Rev(rev.0 + u64::from(id.value()) + 1))
}

/// Splits a revision produced by [`embed_absorb_id`] back into the
/// integer revision and the embedded id.
pub fn extract_rev_absorb_id(rev: Rev) -> Result<(Rev, AbsorbEditId), RevEncodeError> {
    match rev.fraction() {
        0 => Err(RevEncodeError::MissingAbsorbId(rev)),
        fraction => Ok((Rev(rev.0 - fraction), AbsorbEditId((fraction - 1) as u32))),
    }
}

/// The checkout point just below `floor(rev) + 1`: the revision's own
/// content plus every absorb edit currently assigned to it.
pub fn rev_with_absorb(rev: Rev) -> Rev {
    Rev((rev.0 & !FRACTION_MASK) | FRACTION_MASK)
}
