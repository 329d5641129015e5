//! Bounded edit distance between names.
//!
//! Restricted Damerau–Levenshtein: insertions, deletions, substitutions and
//! transpositions of adjacent characters each cost one, and a transposed pair
//! is never edited again.

/// Distance between `a` and `b`, or `limit + 1` when it exceeds `limit`.
///
/// Operates on Unicode scalar values, so a CJK character counts as one.
pub fn edit_distance(a: &str, b: &str, limit: usize) -> usize {
    let mut a: Vec<char> = a.chars().collect();
    let mut b: Vec<char> = b.chars().collect();
    if a.len() < b.len() {
        std::mem::swap(&mut a, &mut b);
    }

    let min_dist = a.len() - b.len();
    if min_dist > limit {
        return limit + 1;
    }

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if b.is_empty() {
        return min_dist;
    }

    let mut prev_prev = vec![usize::MAX; b.len() + 1];
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let substitution = usize::from(a[i - 1] != b[j - 1]);
            current[j] = (prev[j] + 1)
                .min(current[j - 1] + 1)
                .min(prev[j - 1] + substitution);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                current[j] = current[j].min(prev_prev[j - 2].saturating_add(1));
            }
        }
        std::mem::swap(&mut prev_prev, &mut prev);
        std::mem::swap(&mut prev, &mut current);
    }

    let distance = prev[b.len()];
    if distance <= limit { distance } else { limit + 1 }
}
