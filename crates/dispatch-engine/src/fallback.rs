//! Fallback resolution for unsupported actions
//!
//! When a platform cannot perform an action natively, pick a substitute it
//! can perform or decide that a human has to step in.

use connectors::{ActionKind, PlatformCapabilities};

/// What to do with an unsupported action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Execute this supported action instead
    Substitute(ActionKind),
    /// Hand the action to manual review
    Escalate,
}

/// Picks a substitute for unsupported actions
///
/// The platform's explicit fallback map wins. An entry mapped to `None`
/// means no automated alternative. An entry naming an action the platform
/// cannot perform either is skipped. Otherwise a report degrades to a block
/// and then to a hide, and a hide degrades to a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResolver;

impl FallbackResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self
    }

    /// Decide how to handle `action` on a platform with `capabilities`
    pub fn resolve(
        &self,
        action: ActionKind,
        capabilities: &PlatformCapabilities,
    ) -> FallbackDecision {
        match capabilities.explicit_fallback(action) {
            Some(None) => return FallbackDecision::Escalate,
            Some(Some(substitute)) if capabilities.supports(substitute) => {
                return FallbackDecision::Substitute(substitute)
            }
            _ => {}
        }

        Self::heuristic_chain(action)
            .iter()
            .copied()
            .find(|candidate| capabilities.supports(*candidate))
            .map(FallbackDecision::Substitute)
            .unwrap_or(FallbackDecision::Escalate)
    }

    fn heuristic_chain(action: ActionKind) -> &'static [ActionKind] {
        match action {
            ActionKind::ReportUser => &[ActionKind::BlockUser, ActionKind::HideContent],
            ActionKind::HideContent => &[ActionKind::BlockUser],
            ActionKind::BlockUser | ActionKind::UnblockUser => &[],
        }
    }
}
