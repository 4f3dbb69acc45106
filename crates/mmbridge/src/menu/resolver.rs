//! Caption-path resolution against the live menu tree

use super::label::{caption_matches, normalize_menu_label};
use super::walker::menu_children;
use super::MatchStrategy;
use crate::host::MenuNodeRef;
use tracing::debug;

/// Outcome of walking a caption path.
#[derive(Debug)]
pub struct Resolution {
    /// Raw caption matched at each depth; `None` from the first miss onward.
    pub matched_path: Vec<Option<String>>,
    /// The node at the end of the path, present only when every segment matched.
    pub node: Option<MenuNodeRef>,
}

impl Resolution {
    fn unresolved(len: usize) -> Self {
        Self {
            matched_path: vec![None; len],
            node: None,
        }
    }
}

/// Walk `path` from `root`, taking the first child whose normalized caption
/// matches each normalized segment. There is no scoring and no
/// backtracking: a miss at depth `d` ends the walk.
pub fn resolve_menu_path(
    root: Option<MenuNodeRef>,
    path: &[String],
    strategy: MatchStrategy,
) -> Resolution {
    let Some(root) = root else {
        return Resolution::unresolved(path.len());
    };

    let mut matched_path = Vec::with_capacity(path.len());
    let mut current = root;

    for (depth, segment) in path.iter().enumerate() {
        let target = normalize_menu_label(Some(segment));

        let found = menu_children(&*current).find_map(|child| {
            let raw = child.caption().ok().flatten();
            let key = normalize_menu_label(raw.as_deref());
            if caption_matches(key.as_deref(), target.as_deref(), strategy) {
                Some((child, raw))
            } else {
                None
            }
        });

        match found {
            Some((child, raw)) => {
                debug!("Matched menu segment {} {:?} -> {:?}", depth, segment, raw);
                matched_path.push(raw);
                current = child;
            }
            None => {
                debug!("No menu item matches segment {} {:?}", depth, segment);
                matched_path.resize(path.len(), None);
                return Resolution {
                    matched_path,
                    node: None,
                };
            }
        }
    }

    Resolution {
        matched_path,
        node: Some(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryMenuNode;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn main_menu() -> MenuNodeRef {
        MemoryMenuNode::new("MainMenu")
            .with_child(
                MemoryMenuNode::new("&File")
                    .with_child(MemoryMenuNode::new("&Open..."))
                    .with_child(MemoryMenuNode::new("E&xit")),
            )
            .with_child(
                MemoryMenuNode::new("&Play")
                    .with_child(MemoryMenuNode::new("Play/&Pause"))
                    .with_child(MemoryMenuNode::new("&Playback Rules")),
            )
            .with_child(MemoryMenuNode::new("&Tools").with_child(MemoryMenuNode::new("&Options...")))
            .into_ref()
    }

    fn assert_prefix_monotonic(matched: &[Option<String>]) {
        if let Some(first_none) = matched.iter().position(Option::is_none) {
            assert!(matched[first_none..].iter().all(Option::is_none));
        }
    }

    #[test]
    fn resolves_full_path_with_raw_captions() {
        let r = resolve_menu_path(Some(main_menu()), &path(&["Tools", "Options..."]), MatchStrategy::Exact);
        assert_eq!(
            r.matched_path,
            vec![Some("&Tools".to_string()), Some("&Options...".to_string())]
        );
        assert!(r.node.is_some());
    }

    #[test]
    fn miss_truncates_remaining_positions() {
        let r = resolve_menu_path(
            Some(main_menu()),
            &path(&["File", "Recent", "Exit"]),
            MatchStrategy::Exact,
        );
        assert_eq!(r.matched_path, vec![Some("&File".to_string()), None, None]);
        assert!(r.node.is_none());
        assert_prefix_monotonic(&r.matched_path);
    }

    #[test]
    fn first_match_wins_without_backtracking() {
        // "pl" prefix-matches both "Play/Pause" and "Playback Rules"; the first
        // sibling is taken even though it has no children.
        let r = resolve_menu_path(
            Some(main_menu()),
            &path(&["Play", "pl", "anything"]),
            MatchStrategy::StartsWith,
        );
        assert_eq!(
            r.matched_path,
            vec![Some("&Play".to_string()), Some("Play/&Pause".to_string()), None]
        );
    }

    #[test]
    fn contains_strategy() {
        let r = resolve_menu_path(Some(main_menu()), &path(&["ool", "tion"]), MatchStrategy::Contains);
        assert_eq!(
            r.matched_path,
            vec![Some("&Tools".to_string()), Some("&Options...".to_string())]
        );
    }

    #[test]
    fn missing_root_leaves_everything_unresolved() {
        let r = resolve_menu_path(None, &path(&["File", "Exit"]), MatchStrategy::Exact);
        assert_eq!(r.matched_path, vec![None, None]);
        assert!(r.node.is_none());
    }

    #[test]
    fn captionless_children_are_passed_over() {
        let root = MemoryMenuNode::new("root")
            .with_child(MemoryMenuNode::separator())
            .with_child(MemoryMenuNode::new("&View"))
            .into_ref();
        let r = resolve_menu_path(Some(root), &path(&["view"]), MatchStrategy::Exact);
        assert_eq!(r.matched_path, vec![Some("&View".to_string())]);
    }
}
