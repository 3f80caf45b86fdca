use nucleo_matcher::pattern::{Atom, AtomKind, CaseMatching, Normalization};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use rayon::prelude::*;

use crate::model::{FuzzyHit, Snippet};
use crate::text::spans_from_positions;

/// Default cap on name-match results.
pub const RESULTS_LIMIT: usize = 100;

/// Ranked output of a name match.
#[derive(Debug, Clone, Default)]
pub struct FuzzyOutcome {
    pub hits: Vec<FuzzyHit>,
    /// True when matches beyond the limit were dropped.
    pub truncated: bool,
}

/// Scores snippets by name against a query.
///
/// Implementations must be deterministic for a fixed candidate slice, only
/// return candidates whose `fuzzy_index` contains the query as a
/// case-insensitive subsequence, and break score ties by candidate order.
pub trait NameMatcher: Send + Sync {
    fn match_snippets(&self, query: &str, candidates: &[Snippet], limit: usize) -> FuzzyOutcome;
}

/// Subsequence matcher backed by nucleo's scoring (contiguous runs and word
/// boundaries score higher, gaps are penalised).
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyMatcher;

struct Scored {
    pos: usize,
    score: u32,
    positions: Vec<u32>,
}

impl NameMatcher for FuzzyMatcher {
    fn match_snippets(&self, query: &str, candidates: &[Snippet], limit: usize) -> FuzzyOutcome {
        let query = query.to_lowercase();
        if query.is_empty() || limit == 0 || candidates.is_empty() {
            return FuzzyOutcome::default();
        }

        let atom = Atom::new(
            &query,
            CaseMatching::Ignore,
            Normalization::Never,
            AtomKind::Fuzzy,
            false,
        );

        let mut scored: Vec<Scored> = candidates
            .par_iter()
            .enumerate()
            .map_init(
                || (Matcher::new(Config::DEFAULT), Vec::<char>::new(), Vec::new()),
                |(matcher, buf, indices), (pos, snippet)| {
                    indices.clear();
                    // One unit per char so match positions are char offsets.
                    let name = snippet.fuzzy_index();
                    let haystack = if name.is_ascii() {
                        Utf32Str::Ascii(name.as_bytes())
                    } else {
                        buf.clear();
                        buf.extend(name.chars());
                        Utf32Str::Unicode(buf.as_slice())
                    };
                    atom.indices(haystack, matcher, indices)
                        .map(|score| Scored {
                            pos,
                            score: u32::from(score),
                            positions: indices.clone(),
                        })
                },
            )
            .filter_map(|scored| scored)
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score).then(a.pos.cmp(&b.pos)));

        let truncated = scored.len() > limit;
        scored.truncate(limit);

        let hits = scored
            .into_iter()
            .map(|s| FuzzyHit {
                snippet: candidates[s.pos].clone(),
                score: s.score,
                spans: spans_from_positions(&s.positions),
            })
            .collect();

        FuzzyOutcome { hits, truncated }
    }
}
