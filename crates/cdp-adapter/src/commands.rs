//! Element query vocabulary shared by the locator and the page drivers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How an element is recognised on the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorRule {
    /// ARIA role plus accessible name. Non-exact names match as a
    /// case-insensitive substring.
    Role {
        role: String,
        name: String,
        exact: bool,
    },
    /// Visible text matching any of `patterns`, optionally restricted to
    /// elements matching the `scope` selector.
    Text {
        scope: Option<String>,
        patterns: Vec<String>,
        exact: bool,
    },
    TestId {
        id: String,
    },
    Css {
        selector: String,
    },
}

impl LocatorRule {
    /// True when `needle` appears in any of the rule's literal parameters.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        let hit = |s: &str| s.to_ascii_lowercase().contains(&needle);
        match self {
            LocatorRule::Role { role, name, .. } => hit(role) || hit(name),
            LocatorRule::Text {
                scope, patterns, ..
            } => scope.as_deref().map(hit).unwrap_or(false) || patterns.iter().any(|p| hit(p)),
            LocatorRule::TestId { id } => hit(id),
            LocatorRule::Css { selector } => hit(selector),
        }
    }
}

impl fmt::Display for LocatorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorRule::Role { role, name, exact } => {
                write!(f, "role={role}[name={name:?}")?;
                if *exact {
                    write!(f, " exact")?;
                }
                write!(f, "]")
            }
            LocatorRule::Text {
                scope, patterns, ..
            } => match scope {
                Some(scope) => write!(f, "text={} in {scope}", patterns.join("|")),
                None => write!(f, "text={}", patterns.join("|")),
            },
            LocatorRule::TestId { id } => write!(f, "test-id={id}"),
            LocatorRule::Css { selector } => write!(f, "css={selector}"),
        }
    }
}

/// Which of several visible matches to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pick {
    #[default]
    First,
    Last,
    Nth { index: usize },
    /// `index` when that many matches exist, otherwise the first.
    NthOrFirst { index: usize },
}

impl Pick {
    /// Applies the pick to a match count, returning the chosen position.
    pub fn select(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        match *self {
            Pick::First => Some(0),
            Pick::Last => Some(count - 1),
            Pick::Nth { index } => (index < count).then_some(index),
            Pick::NthOrFirst { index } => Some(if index < count { index } else { 0 }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementQuery {
    pub rule: LocatorRule,
    #[serde(default)]
    pub pick: Pick,
}

impl ElementQuery {
    pub fn new(rule: LocatorRule) -> Self {
        Self {
            rule,
            pick: Pick::First,
        }
    }

    pub fn with_pick(mut self, pick: Pick) -> Self {
        self.pick = pick;
        self
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pick {
            Pick::First => write!(f, "{}", self.rule),
            Pick::Last => write!(f, "{} (last)", self.rule),
            Pick::Nth { index } => write!(f, "{} (nth {index})", self.rule),
            Pick::NthOrFirst { index } => write!(f, "{} (nth {index} or first)", self.rule),
        }
    }
}

/// What a successful probe saw: the number of visible matches and the
/// chosen element's centre point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementProbe {
    pub count: usize,
    pub x: f64,
    pub y: f64,
    pub tag: String,
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_or_first_falls_back_when_short() {
        let pick = Pick::NthOrFirst { index: 1 };
        assert_eq!(pick.select(1), Some(0));
        assert_eq!(pick.select(3), Some(1));
        assert_eq!(Pick::Nth { index: 1 }.select(1), None);
        assert_eq!(Pick::Last.select(4), Some(3));
        assert_eq!(Pick::First.select(0), None);
    }

    #[test]
    fn rule_serialises_with_kind_tag() {
        let query = ElementQuery::new(LocatorRule::Role {
            role: "button".into(),
            name: "Remix".into(),
            exact: false,
        })
        .with_pick(Pick::Last);
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["rule"]["kind"], "role");
        assert_eq!(value["pick"]["mode"], "last");
    }

    #[test]
    fn mentions_is_case_insensitive() {
        let rule = LocatorRule::Text {
            scope: Some("button".into()),
            patterns: vec!["Remix".into()],
            exact: false,
        };
        assert!(rule.mentions("remix"));
        assert!(!rule.mentions("publish"));
    }
}
