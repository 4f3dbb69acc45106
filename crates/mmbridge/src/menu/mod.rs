//! Menu path resolution and invocation.
//!
//! A request names a root collection (`scope`, e.g. `MainMenu`) and a path of
//! human-readable captions such as `["Tools", "Options..."]`. The path is
//! resolved segment by segment against the live menu tree and the final item
//! is triggered. Partial matches and items that refuse to fire are ordinary
//! results, not errors.

pub mod invoke;
pub mod label;
pub mod resolver;
pub mod walker;

use crate::host::AutomationHost;
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use invoke::{invoke_menu_node, InvocationOutcome};
pub use label::{caption_matches, normalize_menu_label};
pub use resolver::{resolve_menu_path, Resolution};
pub use walker::{menu_children, MenuChildren};

/// Longest caption path accepted in a single request.
pub const MAX_MENU_DEPTH: usize = 8;

/// Scope used when the caller does not name one.
pub const DEFAULT_MENU_SCOPE: &str = "MainMenu";

/// How a requested caption is compared against the captions in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    Exact,
    #[serde(alias = "starts_with", alias = "prefix")]
    StartsWith,
    #[serde(alias = "substring")]
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuPathRequest {
    pub scope: String,
    pub path: Vec<String>,
    #[serde(default)]
    pub strategy: MatchStrategy,
    #[serde(default)]
    pub allow_disabled: bool,
}

impl MenuPathRequest {
    pub fn new(scope: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            scope: scope.into(),
            path,
            strategy: MatchStrategy::default(),
            allow_disabled: false,
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn allow_disabled(mut self, allow: bool) -> Self {
        self.allow_disabled = allow;
        self
    }

    /// Reject malformed requests before anything touches the host.
    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.scope.trim().is_empty() {
            return Err(AutomationError::InvalidArgument(
                "menu scope cannot be empty".to_string(),
            ));
        }
        if self.path.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "menu path must contain at least one caption".to_string(),
            ));
        }
        if self.path.len() > MAX_MENU_DEPTH {
            return Err(AutomationError::InvalidArgument(format!(
                "menu path has {} captions; at most {} are supported",
                self.path.len(),
                MAX_MENU_DEPTH
            )));
        }
        if let Some(index) = self
            .path
            .iter()
            .position(|segment| normalize_menu_label(Some(segment)).map_or(true, |s| s.is_empty()))
        {
            return Err(AutomationError::InvalidArgument(format!(
                "menu path entry {index} is blank"
            )));
        }
        Ok(())
    }
}

/// Details about a menu item lookup and invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuInvocationResult {
    /// Name of the `SDB.UI` collection used as the root.
    pub scope: String,
    /// Captions requested by the caller.
    pub requested_path: Vec<String>,
    /// Raw captions actually matched, `None` from the first miss onward.
    pub matched_path: Vec<Option<String>>,
    /// Caption of the final item, when the whole path resolved.
    pub caption: Option<String>,
    /// Whether the item reported itself enabled before invocation.
    pub enabled: bool,
    /// True once a trigger mechanism succeeded.
    pub executed: bool,
}

/// Resolve `request.path` under `request.scope` and fire the item it names.
///
/// Only an unreachable host is an error. An unknown scope, a partial match,
/// a disabled item or an item that refuses every trigger all come back as a
/// result with `executed == false`.
#[instrument(skip(host), fields(scope = %request.scope))]
pub fn invoke_menu_item(
    host: &dyn AutomationHost,
    request: &MenuPathRequest,
) -> Result<MenuInvocationResult, AutomationError> {
    request.validate()?;

    let root = match host.menu_root(&request.scope) {
        Ok(root) => Some(root),
        Err(e) if e.is_unavailable() => return Err(e),
        Err(e) => {
            debug!("Menu scope {:?} did not resolve: {}", request.scope, e);
            None
        }
    };

    let resolution = resolve_menu_path(root, &request.path, request.strategy);
    let outcome = invoke_menu_node(resolution.node.as_deref(), request.allow_disabled);

    let caption = if resolution.node.is_some() {
        resolution.matched_path.last().cloned().flatten()
    } else {
        None
    };

    Ok(MenuInvocationResult {
        scope: request.scope.clone(),
        requested_path: request.path.clone(),
        matched_path: resolution.matched_path,
        caption,
        enabled: outcome.enabled,
        executed: outcome.executed,
    })
}
