//! Navigation context: the shell's "current directory" over the command
//! tree, plus the validator that decides what counts as a domain or action.
//!
//! Invariant: an action is only ever set while a domain is set. The four
//! mutators below are the only way to move between states.

use edgesh_tree::registry;

/// The `(domain, action)` position of the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPath {
    domain: Option<String>,
    action: Option<String>,
}

impl ContextPath {
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.domain.is_none()
    }

    pub fn is_domain(&self) -> bool {
        self.domain.is_some() && self.action.is_none()
    }

    pub fn is_action(&self) -> bool {
        self.domain.is_some() && self.action.is_some()
    }

    /// Enters a domain, clearing any action from a previous context.
    pub fn set_domain(&mut self, domain: &str) {
        self.domain = Some(domain.to_string());
        self.action = None;
    }

    pub fn set_action(&mut self, action: &str) {
        debug_assert!(self.domain.is_some());
        self.action = Some(action.to_string());
    }

    /// Moves up one level. Returns false when already at root.
    pub fn navigate_up(&mut self) -> bool {
        if self.action.take().is_some() {
            return true;
        }
        self.domain.take().is_some()
    }

    pub fn reset(&mut self) {
        self.domain = None;
        self.action = None;
    }

    /// `"domain/action"`, `"domain"`, or `""` at root.
    pub fn path_string(&self) -> String {
        match (&self.domain, &self.action) {
            (Some(d), Some(a)) => format!("{d}/{a}"),
            (Some(d), None) => d.clone(),
            _ => String::new(),
        }
    }
}

/// Answers "is this token a domain or action from here", against the static
/// registry behind the command tree. Pure lookups, no network.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextValidator;

impl ContextValidator {
    pub fn is_valid_domain(&self, name: &str) -> bool {
        registry::resolve_domain(name).is_some()
    }

    /// Maps an alias (`ns`) to its canonical domain name (`namespace`).
    pub fn resolve_domain(&self, name: &str) -> Option<&'static str> {
        registry::resolve_domain(name).map(|d| d.name)
    }

    pub fn is_valid_action(&self, name: &str) -> bool {
        registry::is_action(name)
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn state_predicates_follow_transitions() {
        let mut ctx = ContextPath::default();
        assert!(ctx.is_root());

        ctx.set_domain("http_loadbalancer");
        assert!(ctx.is_domain());
        assert!(!ctx.is_root());

        ctx.set_action("list");
        assert!(ctx.is_action());
        assert_eq!(ctx.path_string(), "http_loadbalancer/list");

        assert!(ctx.navigate_up());
        assert!(ctx.is_domain());
        assert!(ctx.navigate_up());
        assert!(ctx.is_root());
        assert!(!ctx.navigate_up());
    }

    #[test]
    fn set_domain_clears_stale_action() {
        let mut ctx = ContextPath::default();
        ctx.set_domain("origin_pool");
        ctx.set_action("get");
        ctx.set_domain("healthcheck");
        assert!(ctx.is_domain());
        assert_eq!(ctx.path_string(), "healthcheck");
    }

    #[test]
    fn reset_returns_to_root_from_any_depth() {
        let mut ctx = ContextPath::default();
        ctx.set_domain("dns_zone");
        ctx.set_action("delete");
        ctx.reset();
        assert!(ctx.is_root());
        assert_eq!(ctx.path_string(), "");
    }

    #[test]
    fn validator_resolves_aliases_to_canonical_names() {
        let v = ContextValidator;
        assert!(v.is_valid_domain("ns"));
        assert_eq!(v.resolve_domain("ns"), Some("namespace"));
        assert_eq!(v.resolve_domain("hlb"), Some("http_loadbalancer"));
        assert!(v.is_valid_action("add-labels"));
        assert!(!v.is_valid_action("explode"));
    }

    proptest! {
        // Two navigate_up calls reach root from any state; further calls
        // are no-ops.
        #[test]
        fn navigate_up_terminates_at_root(depth in 0usize..3, extra in 0usize..5) {
            let mut ctx = ContextPath::default();
            if depth >= 1 {
                ctx.set_domain("certificate");
            }
            if depth >= 2 {
                ctx.set_action("status");
            }
            for _ in 0..depth {
                prop_assert!(ctx.navigate_up());
            }
            prop_assert!(ctx.is_root());
            for _ in 0..extra {
                prop_assert!(!ctx.navigate_up());
                prop_assert!(ctx.is_root());
            }
        }
    }
}
