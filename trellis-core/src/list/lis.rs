//! Longest increasing subsequence.
//!
//! Given, for each position in the new order, the position the same node
//! had in the old order, the longest strictly increasing subsequence is the
//! largest set of nodes that are already in the right relative order. Those
//! stay put; everything else is moved.

/// Marker for positions that have no old index (freshly created nodes).
pub(crate) const NEW: usize = usize::MAX;

/// Indices (into `seq`) of one longest strictly increasing subsequence,
/// ignoring entries equal to [`NEW`]. Runs in O(n log n).
pub(crate) fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k] = index into seq of the smallest tail of an increasing
    // subsequence of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        if value == NEW {
            continue;
        }
        let k = tails.partition_point(|&t| seq[t] < value);
        if k > 0 {
            prev[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = prev[i];
    }
    out.reverse();
    out
}
