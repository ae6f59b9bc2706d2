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

//! Absorb engine for a stacked version-control workflow.
//!
//! Given a linear stack of revisions of one file plus pending
//! working-copy changes on top, the engine computes how to fold each
//! changed hunk back into the stack revision that last touched the
//! surrounding lines, leaving every other revision alone. The pieces:
//!
//! * [`file_stack`] — the immutable sequence of revision texts.
//! * [`linelog`] — an editable line history answering blame-style
//!   queries for any revision, including fractional override revisions.
//! * [`diff`] — the line-level diff the analysis is built on.
//! * [`rev`] — fixed-point virtual revisions that let many pending
//!   edits share one linelog.
//! * [`absorb`] — the analyzer and the two appliers.

#![deny(unused_must_use)]

pub mod absorb;
pub mod diff;
pub mod file_stack;
pub mod linelog;
pub mod rev;
