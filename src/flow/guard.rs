//! Navigation guard — which wizard routes are reachable from the current
//! state.
//!
//! The wizard is a linear chain: each stage needs the artifact produced by
//! the stage before it. [`WIZARD_GUARDS`] lists that chain in order, one
//! entry per guarded route. Predicates are evaluated against the state passed
//! in on every call; nothing is cached.

use super::model::MvpFlowState;

pub const ONBOARDING_ROUTE: &str = "/onboarding";
pub const IDENTITY_MODELS_ROUTE: &str = "/identity-models";
pub const PERSONA_CONSTITUTION_ROUTE: &str = "/persona-constitution";
pub const LAUNCH_KIT_ROUTE: &str = "/launch-kit";
pub const CONSISTENCY_CHECK_ROUTE: &str = "/consistency-check";
pub const CONTENT_MATRIX_ROUTE: &str = "/content-matrix";
pub const EXPERIMENTS_ROUTE: &str = "/experiments";
pub const MONETIZATION_MAP_ROUTE: &str = "/monetization-map";
pub const REVIEW_ROUTE: &str = "/review";

/// One guarded route: visiting `path` requires `prerequisite` to hold,
/// otherwise the user is sent to `fallback`.
#[derive(Debug, Clone, Copy)]
pub struct RouteGuard {
    pub path: &'static str,
    /// Human-readable name of the required artifact.
    pub prerequisite: &'static str,
    pub check: fn(&MvpFlowState) -> bool,
    pub fallback: &'static str,
}

/// The guarded wizard routes, in stage order.
pub const WIZARD_GUARDS: &[RouteGuard] = &[
    RouteGuard {
        path: IDENTITY_MODELS_ROUTE,
        prerequisite: "onboarding profile",
        check: |s| s.profile.is_some(),
        fallback: ONBOARDING_ROUTE,
    },
    RouteGuard {
        path: PERSONA_CONSTITUTION_ROUTE,
        prerequisite: "selected primary identity",
        check: |s| s.selected_primary_id.is_some(),
        fallback: IDENTITY_MODELS_ROUTE,
    },
    RouteGuard {
        path: LAUNCH_KIT_ROUTE,
        prerequisite: "persona constitution",
        check: |s| s.persona.is_some(),
        fallback: PERSONA_CONSTITUTION_ROUTE,
    },
    RouteGuard {
        path: CONSISTENCY_CHECK_ROUTE,
        prerequisite: "launch kit",
        check: |s| s.launch_kit.is_some(),
        fallback: LAUNCH_KIT_ROUTE,
    },
    RouteGuard {
        path: CONTENT_MATRIX_ROUTE,
        prerequisite: "consistency check result",
        check: |s| s.consistency_check.is_some(),
        fallback: CONSISTENCY_CHECK_ROUTE,
    },
    RouteGuard {
        path: EXPERIMENTS_ROUTE,
        prerequisite: "content matrix",
        check: |s| s.content_matrix.is_some(),
        fallback: CONTENT_MATRIX_ROUTE,
    },
    RouteGuard {
        path: MONETIZATION_MAP_ROUTE,
        prerequisite: "at least one experiment",
        check: |s| !s.experiments.is_empty(),
        fallback: EXPERIMENTS_ROUTE,
    },
    RouteGuard {
        path: REVIEW_ROUTE,
        prerequisite: "monetization map",
        check: |s| s.monetization_map.is_some(),
        fallback: MONETIZATION_MAP_ROUTE,
    },
];

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Allow,
    Redirect(&'static str),
}

/// Guard entry for a path, if the path is guarded.
pub fn guard_for(path: &str) -> Option<&'static RouteGuard> {
    let path = normalize_path(path);
    WIZARD_GUARDS.iter().find(|g| g.path == path)
}

/// Decide whether navigating to `path` is allowed right now.
pub fn check_navigation(path: &str, state: &MvpFlowState) -> Navigation {
    match guard_for(path) {
        Some(guard) if !(guard.check)(state) => {
            tracing::info!(
                path = guard.path,
                missing = guard.prerequisite,
                redirect = guard.fallback,
                "Navigation redirected"
            );
            Navigation::Redirect(guard.fallback)
        }
        _ => Navigation::Allow,
    }
}

/// Drop any query string or fragment and trailing slash.
fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
