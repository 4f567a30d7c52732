//! Platform capability descriptions
//!
//! What a platform can do natively, how fast, with which scopes, and which
//! action to substitute when it cannot. Capability differences between
//! platforms live here as data so the executor never branches on platform id.

use crate::model::ActionKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Static description of what a platform supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCapabilities {
    /// Platform id
    pub platform: String,
    /// Native hide/delete support
    pub hide_content: bool,
    /// Native report support
    pub report_user: bool,
    /// Native block/ban support
    pub block_user: bool,
    /// Native unblock/unban support
    pub unblock_user: bool,
    /// Free-text rate limit per action
    pub rate_limits: BTreeMap<ActionKind, String>,
    /// OAuth scopes or permissions the connector needs
    pub scopes: Vec<String>,
    /// Explicit fallbacks; `None` means no automated alternative
    pub fallbacks: BTreeMap<ActionKind, Option<ActionKind>>,
}

impl PlatformCapabilities {
    /// Capabilities with nothing supported
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            hide_content: false,
            report_user: false,
            block_user: false,
            unblock_user: false,
            rate_limits: BTreeMap::new(),
            scopes: Vec::new(),
            fallbacks: BTreeMap::new(),
        }
    }

    /// Mark an action as natively supported
    pub fn with_support(mut self, action: ActionKind) -> Self {
        match action {
            ActionKind::HideContent => self.hide_content = true,
            ActionKind::ReportUser => self.report_user = true,
            ActionKind::BlockUser => self.block_user = true,
            ActionKind::UnblockUser => self.unblock_user = true,
        }
        self
    }

    /// Describe the rate limit for an action
    pub fn with_rate_limit(mut self, action: ActionKind, limit: impl Into<String>) -> Self {
        self.rate_limits.insert(action, limit.into());
        self
    }

    /// Add a required scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Map an action to a substitute, or to `None` for manual review
    pub fn with_fallback(mut self, action: ActionKind, substitute: Option<ActionKind>) -> Self {
        self.fallbacks.insert(action, substitute);
        self
    }

    /// Whether the platform performs `action` natively
    pub fn supports(&self, action: ActionKind) -> bool {
        match action {
            ActionKind::HideContent => self.hide_content,
            ActionKind::ReportUser => self.report_user,
            ActionKind::BlockUser => self.block_user,
            ActionKind::UnblockUser => self.unblock_user,
        }
    }

    /// Supported actions, in canonical order
    pub fn supported_actions(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|action| self.supports(*action))
            .collect()
    }

    /// The explicit fallback entry for `action`
    ///
    /// `None` when the map has no entry, `Some(None)` when the entry says to
    /// escalate, `Some(Some(a))` when it names a substitute.
    pub fn explicit_fallback(&self, action: ActionKind) -> Option<Option<ActionKind>> {
        self.fallbacks.get(&action).copied()
    }
}
