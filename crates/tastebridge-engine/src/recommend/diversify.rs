//! Final ranking: score order with a per-artist cap and a soft
//! anti-monotony rule across source buckets.

use std::collections::HashMap;

use super::scoring::{ScoredCandidate, SourceBucket};

/// Pick up to `limit` candidates.
///
/// Candidates are taken best-first. No primary artist appears more than
/// `artist_cap` times. After `run_limit` consecutive picks from one bucket
/// the best candidate from a different bucket is taken instead, if any is
/// still under the cap; otherwise the next-best candidate is taken.
pub fn diversify(
    mut candidates: Vec<ScoredCandidate>,
    limit: usize,
    artist_cap: usize,
    run_limit: usize,
) -> Vec<ScoredCandidate> {
    // Stable, so equal scores keep source order.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut remaining: Vec<Option<ScoredCandidate>> = candidates.into_iter().map(Some).collect();
    let mut per_artist: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(limit.min(remaining.len()));
    let mut run: Option<(SourceBucket, usize)> = None;

    while selected.len() < limit {
        let under_cap = |c: &ScoredCandidate| {
            per_artist.get(c.artist_key()).copied().unwrap_or(0) < artist_cap
        };

        let monotonous = run.filter(|&(_, len)| len >= run_limit).map(|(b, _)| b);

        let next_best = remaining
            .iter()
            .position(|slot| slot.as_ref().is_some_and(under_cap));
        let Some(next_best) = next_best else {
            break;
        };

        let pick = monotonous
            .and_then(|bucket| {
                remaining.iter().position(|slot| {
                    slot.as_ref()
                        .is_some_and(|c| c.bucket != bucket && under_cap(c))
                })
            })
            .unwrap_or(next_best);

        let Some(chosen) = remaining[pick].take() else {
            break;
        };

        *per_artist.entry(chosen.artist_key().to_string()).or_insert(0) += 1;
        run = match run {
            Some((bucket, len)) if bucket == chosen.bucket => Some((bucket, len + 1)),
            _ => Some((chosen.bucket, 1)),
        };
        selected.push(chosen);
    }

    selected
}
