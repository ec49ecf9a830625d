//! String and duration similarity measures.

use std::collections::HashMap;

/// Dice coefficient over character bigrams (multiset).
///
/// Strings shorter than two characters have no bigrams and score 0.0, even
/// against themselves; otherwise identical strings score exactly 1.0.
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in a.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut shared = 0_usize;
    for pair in b.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    let total = (a.len() - 1) + (b.len() - 1);
    (2 * shared) as f64 / total as f64
}

/// Step-function closeness of two durations in seconds.
///
/// An unknown duration on either side scores 0.0.
pub fn duration_closeness(a: Option<u32>, b: Option<u32>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    match a.abs_diff(b) {
        0..=2 => 1.0,
        3..=5 => 0.8,
        6..=10 => 0.5,
        11..=30 => 0.2,
        _ => 0.0,
    }
}
