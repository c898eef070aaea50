//! Constructors for the strategy kinds the workflows use.

use cdp_adapter::{ElementQuery, LocatorRule, Pick};

use crate::types::LocatorStrategy;

/// ARIA role with a case-insensitive, substring accessible name.
pub fn role(role: &str, name: &str) -> LocatorStrategy {
    LocatorStrategy::new(
        "role",
        ElementQuery::new(LocatorRule::Role {
            role: role.to_string(),
            name: name.to_string(),
            exact: false,
        }),
    )
}

/// ARIA role whose accessible name must equal `name`.
pub fn role_exact(role: &str, name: &str) -> LocatorStrategy {
    LocatorStrategy::new(
        "role-exact",
        ElementQuery::new(LocatorRule::Role {
            role: role.to_string(),
            name: name.to_string(),
            exact: true,
        }),
    )
}

/// Elements matching `scope` whose visible text contains any pattern.
pub fn text_in(scope: &str, patterns: &[&str]) -> LocatorStrategy {
    LocatorStrategy::new(
        "text",
        ElementQuery::new(LocatorRule::Text {
            scope: Some(scope.to_string()),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            exact: false,
        }),
    )
}

pub fn text(pattern: &str) -> LocatorStrategy {
    LocatorStrategy::new(
        "text",
        ElementQuery::new(LocatorRule::Text {
            scope: None,
            patterns: vec![pattern.to_string()],
            exact: false,
        }),
    )
}

pub fn test_id(id: &str) -> LocatorStrategy {
    LocatorStrategy::new(
        "test-id",
        ElementQuery::new(LocatorRule::TestId { id: id.to_string() }),
    )
}

pub fn css(selector: &str) -> LocatorStrategy {
    LocatorStrategy::new(
        "css",
        ElementQuery::new(LocatorRule::Css {
            selector: selector.to_string(),
        }),
    )
}

impl LocatorStrategy {
    pub fn pick(mut self, pick: Pick) -> Self {
        self.query.pick = pick;
        self
    }

    pub fn last(self) -> Self {
        self.pick(Pick::Last)
    }

    pub fn nth_or_first(self, index: usize) -> Self {
        self.pick(Pick::NthOrFirst { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn builders_set_label_pick_and_timeout() {
        let strategy = role("button", "Publish").last().timeout_secs(15);
        assert_eq!(strategy.label, "role");
        assert_eq!(strategy.query.pick, Pick::Last);
        assert_eq!(strategy.timeout, Duration::from_secs(15));

        let update = text("Update").nth_or_first(1).labeled("update-text");
        assert_eq!(update.label, "update-text");
        assert_eq!(update.query.pick, Pick::NthOrFirst { index: 1 });
        assert_eq!(update.timeout, crate::DEFAULT_STRATEGY_TIMEOUT);
    }

    #[test]
    fn scoped_text_keeps_every_pattern() {
        let strategy = text_in("[role=\"dialog\"] button", &["remix", "confirm", "ok"]);
        match strategy.query.rule {
            LocatorRule::Text {
                scope, patterns, ..
            } => {
                assert_eq!(scope.as_deref(), Some("[role=\"dialog\"] button"));
                assert_eq!(patterns.len(), 3);
            }
            other => panic!("unexpected rule {other:?}"),
        }
    }
}
