//! Firing a resolved menu item

use crate::host::{MenuNode, TriggerMechanism};
use tracing::{debug, info};

/// What happened when a resolved node was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// Enabled state read before invoking. A node that does not expose the
    /// property counts as enabled.
    pub enabled: bool,
    pub executed: bool,
    /// The mechanism that succeeded, if any.
    pub mechanism: Option<TriggerMechanism>,
}

impl InvocationOutcome {
    fn not_executed(enabled: bool) -> Self {
        Self {
            enabled,
            executed: false,
            mechanism: None,
        }
    }
}

fn read_enabled(node: &dyn MenuNode) -> bool {
    match node.enabled() {
        Ok(Some(enabled)) => enabled,
        Ok(None) => true,
        Err(e) => {
            debug!("Enabled state unreadable, treating as enabled: {}", e);
            true
        }
    }
}

/// Trigger `node` with the first mechanism that does not fail.
///
/// `None` (path not fully resolved) and a disabled node with
/// `allow_disabled == false` are both reported as not executed without
/// touching the host. Exhausting every mechanism is also a normal outcome.
pub fn invoke_menu_node(node: Option<&dyn MenuNode>, allow_disabled: bool) -> InvocationOutcome {
    let Some(node) = node else {
        return InvocationOutcome::not_executed(false);
    };

    let enabled = read_enabled(node);
    if !enabled && !allow_disabled {
        info!("Menu item is disabled; not invoking");
        return InvocationOutcome::not_executed(enabled);
    }

    for mechanism in TriggerMechanism::PRIORITY {
        match node.trigger(mechanism) {
            Ok(()) => {
                debug!("Menu item triggered via {}", mechanism.member_name());
                return InvocationOutcome {
                    enabled,
                    executed: true,
                    mechanism: Some(mechanism),
                };
            }
            Err(e) => {
                debug!("{} failed on menu item: {}", mechanism.member_name(), e);
            }
        }
    }

    info!("Every trigger mechanism failed for menu item");
    InvocationOutcome::not_executed(enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryMenuNode;

    #[test]
    fn first_mechanism_wins() {
        let node = MemoryMenuNode::new("&Options...").into_arc();
        let outcome = invoke_menu_node(Some(&*node), false);
        assert!(outcome.executed);
        assert_eq!(outcome.mechanism, Some(TriggerMechanism::Execute));
        assert_eq!(node.fired(), vec![TriggerMechanism::Execute]);
    }

    #[test]
    fn falls_back_in_priority_order() {
        let node = MemoryMenuNode::new("Item")
            .with_failing_trigger(TriggerMechanism::Execute)
            .with_triggers(&[TriggerMechanism::Execute, TriggerMechanism::DoClick])
            .into_arc();
        let outcome = invoke_menu_node(Some(&*node), false);
        assert!(outcome.executed);
        assert_eq!(outcome.mechanism, Some(TriggerMechanism::DoClick));
        assert_eq!(node.fired(), vec![TriggerMechanism::DoClick]);
    }

    #[test]
    fn disabled_item_is_left_alone() {
        let node = MemoryMenuNode::new("Item").disabled().into_arc();
        let outcome = invoke_menu_node(Some(&*node), false);
        assert!(!outcome.enabled);
        assert!(!outcome.executed);
        assert!(node.fired().is_empty());
    }

    #[test]
    fn disabled_item_runs_when_allowed() {
        let node = MemoryMenuNode::new("Item").disabled().into_arc();
        let outcome = invoke_menu_node(Some(&*node), true);
        assert!(!outcome.enabled);
        assert!(outcome.executed);
    }

    #[test]
    fn missing_enabled_property_counts_as_enabled() {
        let node = MemoryMenuNode::new("Item").without_enabled_state().into_arc();
        let outcome = invoke_menu_node(Some(&*node), false);
        assert!(outcome.enabled);
        assert!(outcome.executed);
    }

    #[test]
    fn exhausting_mechanisms_is_not_an_error() {
        let node = MemoryMenuNode::new("Item").with_triggers(&[]).into_arc();
        let outcome = invoke_menu_node(Some(&*node), false);
        assert!(outcome.enabled);
        assert!(!outcome.executed);
        assert_eq!(outcome.mechanism, None);
    }

    #[test]
    fn nothing_resolved_means_nothing_executed() {
        let outcome = invoke_menu_node(None, true);
        assert!(!outcome.executed);
        assert!(!outcome.enabled);
    }
}
