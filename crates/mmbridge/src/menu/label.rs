//! Caption normalization and comparison

use super::MatchStrategy;

const ACCELERATOR_MARKER: char = '&';
const ELLIPSIS_GLYPH: char = '\u{2026}';

/// Canonical comparison key for a menu caption.
///
/// Removes every accelerator marker (`&x` keeps `x`, so `&&` leaves nothing),
/// one trailing ellipsis (`...` or `…`) and surrounding whitespace, then
/// lowercases. `None` stays `None`.
pub fn normalize_menu_label(label: Option<&str>) -> Option<String> {
    let label = label?;

    let stripped: String = label.chars().filter(|&c| c != ACCELERATOR_MARKER).collect();

    let trimmed = stripped.trim();
    let without_ellipsis = trimmed
        .strip_suffix("...")
        .or_else(|| trimmed.strip_suffix(ELLIPSIS_GLYPH))
        .unwrap_or(trimmed);

    Some(without_ellipsis.trim().to_lowercase())
}

/// Compare two already-normalized captions. Either side missing never matches.
pub fn caption_matches(
    candidate: Option<&str>,
    target: Option<&str>,
    strategy: MatchStrategy,
) -> bool {
    let (Some(candidate), Some(target)) = (candidate, target) else {
        return false;
    };
    match strategy {
        MatchStrategy::Exact => candidate == target,
        MatchStrategy::StartsWith => candidate.starts_with(target),
        MatchStrategy::Contains => candidate.contains(target),
    }
}
