//! Typo suggestions for effect names

/// Edit distance between two names, two rows of state.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest candidate within `threshold` edits; earlier candidates win ties.
pub fn find_similar_name<'a>(name: &str, candidates: &[&'a str], threshold: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (levenshtein_distance(name, c), c))
        .filter(|(d, _)| *d <= threshold)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

/// Suggestion for an unhandled effect tag, scaled to the tag's length
pub fn suggest_effect<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let threshold = (name.chars().count() / 3).max(1);
    find_similar_name(name, candidates, threshold).filter(|s| *s != name)
}

/// ` (did you mean `X`?)` or nothing
pub fn format_suggestion_hint(suggestion: Option<&str>) -> String {
    suggestion
        .map(|name| format!(" (did you mean `{name}`?)"))
        .unwrap_or_default()
}
