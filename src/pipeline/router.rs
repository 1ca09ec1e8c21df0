use serde::{Deserialize, Serialize};

use super::intent::QueryIntent;

/// Engines to invoke for one query turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub use_retrieval: bool,
    pub use_external_lookup: bool,
    pub use_action: bool,
}

pub struct RoutingPolicy;

impl RoutingPolicy {
    pub fn route(intent: QueryIntent) -> RoutingDecision {
        let (use_external_lookup, use_action) = match intent {
            QueryIntent::GeneralQuery => (false, false),
            QueryIntent::PolicyStatus | QueryIntent::CaseLawSearch => (true, false),
            QueryIntent::ComplianceCheck => (false, true),
        };
        RoutingDecision {
            use_retrieval: true,
            use_external_lookup,
            use_action,
        }
    }

    /// Decision used by the direct-invocation shortcuts, which skip
    /// classification.
    pub fn pinned_lookup() -> RoutingDecision {
        RoutingDecision {
            use_retrieval: true,
            use_external_lookup: true,
            use_action: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(lookup: bool, action: bool) -> RoutingDecision {
        RoutingDecision {
            use_retrieval: true,
            use_external_lookup: lookup,
            use_action: action,
        }
    }

    #[test]
    fn routing_table() {
        assert_eq!(RoutingPolicy::route(QueryIntent::GeneralQuery), decision(false, false));
        assert_eq!(RoutingPolicy::route(QueryIntent::PolicyStatus), decision(true, false));
        assert_eq!(RoutingPolicy::route(QueryIntent::CaseLawSearch), decision(true, false));
        assert_eq!(RoutingPolicy::route(QueryIntent::ComplianceCheck), decision(false, true));
    }

    #[test]
    fn routing_ignores_prior_calls() {
        let first = RoutingPolicy::route(QueryIntent::PolicyStatus);
        RoutingPolicy::route(QueryIntent::ComplianceCheck);
        RoutingPolicy::route(QueryIntent::GeneralQuery);
        assert_eq!(RoutingPolicy::route(QueryIntent::PolicyStatus), first);
    }
}
