//! # Word-Level Sequence Alignment
//!
//! Wagner–Fischer minimum edit distance computed over words instead of
//! characters. The result is an edit script that says, for every reference
//! word, which recited word (if any) was aligned to it, and which recited
//! words had no place in the reference at all.
//!
//! ## Cost model:
//! Each cell holds a `(edits, letters)` pair compared lexicographically.
//! - **edits**: number of substitutions, omissions and insertions
//! - **letters**: character distance summed over substituted pairs
//!
//! The first component alone is classic edit distance. The second only
//! breaks ties between scripts with the same number of edits, steering a
//! substituted recited word towards the reference word it most resembles.
//!
//! ## Traceback:
//! When two predecessors carry exactly the same cost the walk prefers the
//! diagonal, then an omission, then an insertion. The script is monotone so
//! no recited word is ever assigned to an earlier reference position than
//! the one before it.

use super::normalize::fold_letters;
use super::similarity::char_distance;

/// One step of the edit script, in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentOp {
    /// Reference word `reference` was recited as `recited` (equivalent words)
    Match { reference: usize, recited: usize },
    /// Reference word `reference` was recited as a different word `recited`
    Substitute { reference: usize, recited: usize },
    /// Reference word `reference` has no recited counterpart
    Omit { reference: usize },
    /// Recited word `recited` has no reference counterpart
    Insert { recited: usize },
}

type Cost = (u32, u32);

#[derive(Clone, Copy)]
enum Step {
    Diagonal,
    Up,
    Left,
}

/// Align recited words against reference words.
///
/// Both slices are expected to be normalized tokens (see `normalize::tokenize`).
pub fn align_words(reference: &[String], recited: &[String]) -> Vec<AlignmentOp> {
    let n = reference.len();
    let m = recited.len();
    let width = m + 1;

    // Folded forms are computed once instead of per cell.
    let folded_ref: Vec<String> = reference.iter().map(|w| fold_letters(w)).collect();
    let folded_rec: Vec<String> = recited.iter().map(|w| fold_letters(w)).collect();

    let substitution = |i: usize, j: usize| -> Cost {
        if folded_ref[i] == folded_rec[j] {
            (0, 0)
        } else {
            (1, char_distance(&folded_ref[i], &folded_rec[j]) as u32)
        }
    };

    let mut table = vec![(0u32, 0u32); (n + 1) * width];
    for i in 1..=n {
        table[i * width] = (i as u32, 0);
    }
    for j in 1..=m {
        table[j] = (j as u32, 0);
    }

    for i in 1..=n {
        for j in 1..=m {
            let (sub_edits, sub_letters) = substitution(i - 1, j - 1);
            let diag = table[(i - 1) * width + (j - 1)];
            let up = table[(i - 1) * width + j];
            let left = table[i * width + (j - 1)];

            let candidates = [
                (diag.0 + sub_edits, diag.1 + sub_letters),
                (up.0 + 1, up.1),
                (left.0 + 1, left.1),
            ];
            table[i * width + j] = candidates.into_iter().min().unwrap_or(diag);
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let here = table[i * width + j];
        let step = if i > 0 && j > 0 {
            let (sub_edits, sub_letters) = substitution(i - 1, j - 1);
            let diag = table[(i - 1) * width + (j - 1)];
            let up = table[(i - 1) * width + j];
            if (diag.0 + sub_edits, diag.1 + sub_letters) == here {
                Step::Diagonal
            } else if (up.0 + 1, up.1) == here {
                Step::Up
            } else {
                Step::Left
            }
        } else if i > 0 {
            Step::Up
        } else {
            Step::Left
        };

        match step {
            Step::Diagonal => {
                i -= 1;
                j -= 1;
                if substitution(i, j).0 == 0 {
                    ops.push(AlignmentOp::Match { reference: i, recited: j });
                } else {
                    ops.push(AlignmentOp::Substitute { reference: i, recited: j });
                }
            }
            Step::Up => {
                i -= 1;
                ops.push(AlignmentOp::Omit { reference: i });
            }
            Step::Left => {
                j -= 1;
                ops.push(AlignmentOp::Insert { recited: j });
            }
        }
    }

    ops.reverse();
    ops
}

/// Number of edit operations in a script (the word-level edit distance).
pub fn edit_count(ops: &[AlignmentOp]) -> usize {
    ops.iter()
        .filter(|op| !matches!(op, AlignmentOp::Match { .. }))
        .count()
}
