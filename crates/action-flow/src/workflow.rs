//! The remix workflow: a login step plus the four steps repeated per
//! iteration, with every selector, strategy order and deadline in one
//! place.

use std::time::Duration;

use action_locator::{css, role, role_exact, test_id, text, text_in};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::FlowError;
use crate::types::*;

/// Addresses and patterns of the automated site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub login_url: String,
    pub home_url: String,
    /// Project addresses must be on this host or one of its subdomains.
    pub expected_domain: String,
    /// Address pattern of a freshly remixed project.
    pub project_path_pattern: String,
    /// Looser fragment accepted when the pattern never matches.
    pub project_path_fragment: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            login_url: "https://lovable.dev/login".to_string(),
            home_url: "https://lovable.dev/".to_string(),
            expected_domain: "lovable.dev".to_string(),
            project_path_pattern: r"/projects/[a-f0-9-]+".to_string(),
            project_path_fragment: "/projects/".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    pub login: Step,
    /// Run in order once per iteration.
    pub iteration: Vec<Step>,
}

impl WorkflowTemplate {
    /// Builds the standard login, navigate, remix, publish, rename workflow.
    pub fn standard(site: &SiteProfile) -> Result<Self, FlowError> {
        let project_pattern = Regex::new(&site.project_path_pattern).map_err(|err| {
            FlowError::InvalidWorkflow(format!("bad project path pattern: {err}"))
        })?;

        let template = Self {
            login: login_step(site),
            iteration: vec![
                navigate_step(),
                remix_step(project_pattern, &site.project_path_fragment),
                publish_step(),
                rename_step(site),
            ],
        };
        template.validate()?;
        Ok(template)
    }

    /// Checks every step is executable: at least one action, a non-zero
    /// budget and a strategy for each element it touches.
    pub fn validate(&self) -> Result<(), FlowError> {
        self.steps().try_for_each(validate_step)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        std::iter::once(&self.login).chain(self.iteration.iter())
    }

    pub fn step(&self, kind: StepKind) -> Option<&Step> {
        self.steps().find(|step| step.kind == kind)
    }
}

pub fn validate_step(step: &Step) -> Result<(), FlowError> {
    if step.actions.is_empty() {
        return Err(FlowError::InvalidWorkflow(format!(
            "step {} has no actions",
            step.kind
        )));
    }
    if step.budget.is_zero() {
        return Err(FlowError::InvalidWorkflow(format!(
            "step {} has a zero budget",
            step.kind
        )));
    }
    for action in &step.actions {
        let spec = match &action.kind {
            ActionKind::Click(spec) | ActionKind::Fill(spec, _) | ActionKind::Await(spec) => spec,
            _ => continue,
        };
        if spec.strategies.is_empty() {
            return Err(FlowError::InvalidWorkflow(format!(
                "{} in step {} has no locator strategies",
                spec.name, step.kind
            )));
        }
    }
    Ok(())
}

fn login_step(site: &SiteProfile) -> Step {
    Step {
        kind: StepKind::Login,
        status_label: "Logging in".to_string(),
        policy: FailurePolicy::AbortRun,
        budget: Duration::from_secs(180),
        actions: vec![
            Action::required(
                "Opening login page",
                ActionKind::Goto(Target::Fixed(site.login_url.clone())),
            ),
            Action::required(
                "Entering e-mail",
                ActionKind::Fill(
                    ElementSpec::new(
                        "E-mail field",
                        vec![role("textbox", "E-mail").timeout_secs(15)],
                    ),
                    Value::Email,
                ),
            ),
            Action::required(
                "Continuing",
                ActionKind::Click(ElementSpec::new(
                    "Continue button",
                    vec![role_exact("button", "Continuar").timeout_secs(10)],
                )),
            ),
            Action::required(
                "Entering password",
                ActionKind::Fill(
                    ElementSpec::new(
                        "Password field",
                        vec![role("textbox", "Senha").timeout_secs(15)],
                    ),
                    Value::Password,
                ),
            ),
            Action::required(
                "Submitting login",
                ActionKind::Click(ElementSpec::new(
                    "Login button",
                    vec![role("button", "Login").timeout_secs(10)],
                )),
            ),
            Action::required(
                "Waiting for the session to settle",
                ActionKind::Pause(Duration::from_secs(10)),
            ),
            Action::required("Opening project", ActionKind::Goto(Target::ProjectUrl)),
        ],
    }
}

fn navigate_step() -> Step {
    Step {
        kind: StepKind::Navigate,
        status_label: "Opening project".to_string(),
        policy: FailurePolicy::SkipIteration,
        budget: Duration::from_secs(90),
        actions: vec![Action::required(
            "Opening project page",
            ActionKind::Goto(Target::ProjectUrl),
        )],
    }
}

fn remix_step(project_pattern: Regex, project_fragment: &str) -> Step {
    Step {
        kind: StepKind::Remix,
        status_label: "Remixing".to_string(),
        policy: FailurePolicy::SkipIteration,
        budget: Duration::from_secs(180),
        actions: vec![
            Action::required(
                "Clicking Remix",
                ActionKind::Click(ElementSpec::new(
                    "Remix button",
                    vec![
                        role("button", "Remix"),
                        text_in("button", &["Remix"]),
                        css(r#"[data-testid*="remix"], .remix-button, button[class*="remix"]"#),
                    ],
                )),
            ),
            Action::optional(
                "Waiting for confirmation dialog",
                ActionKind::Await(ElementSpec::new(
                    "Remix dialog",
                    vec![css(r#"[role="dialog"], .modal, [data-state="open"]"#).timeout_secs(15)],
                )),
            ),
            Action::optional(
                "Confirming Remix",
                ActionKind::Click(ElementSpec::new(
                    "Remix confirm button",
                    vec![
                        role("button", "Remix").last().timeout_secs(15),
                        text_in(
                            r#"[role="dialog"] button, .modal button"#,
                            &["remix", "confirm", "ok", "criar", "create"],
                        )
                        .timeout_secs(10),
                    ],
                )),
            ),
            Action::required(
                "Waiting for the new project",
                ActionKind::AwaitUrl {
                    pattern: project_pattern,
                    timeout: Duration::from_secs(60),
                    accept_if_contains: Some(project_fragment.to_string()),
                },
            ),
        ],
    }
}

fn publish_step() -> Step {
    Step {
        kind: StepKind::Publish,
        status_label: "Publishing".to_string(),
        policy: FailurePolicy::SkipIteration,
        budget: Duration::from_secs(120),
        actions: vec![
            Action::required(
                "Opening publish dialog",
                ActionKind::Click(ElementSpec::new(
                    "Publish button",
                    vec![role("button", "Publish").timeout_secs(30)],
                )),
            ),
            Action::required(
                "Confirming publish",
                ActionKind::Click(ElementSpec::new(
                    "Publish confirm button",
                    vec![role("button", "Publish").last().timeout_secs(15)],
                )),
            ),
            Action::optional(
                "Closing success dialog",
                ActionKind::Click(ElementSpec::new(
                    "Close button",
                    vec![role("button", "Close").timeout_secs(30)],
                )),
            ),
        ],
    }
}

fn rename_step(site: &SiteProfile) -> Step {
    Step {
        kind: StepKind::Rename,
        status_label: "Renaming account".to_string(),
        policy: FailurePolicy::Tolerate,
        budget: Duration::from_secs(180),
        actions: vec![
            Action::required(
                "Opening home page",
                ActionKind::Goto(Target::Fixed(site.home_url.clone())),
            ),
            Action::optional(
                "Opening account menu",
                ActionKind::Click(ElementSpec::new(
                    "Account avatar",
                    vec![
                        test_id("user-avatar").timeout_secs(15),
                        css(r#"[data-testid="user-avatar"], [class*="avatar"], button[class*="Avatar"]"#)
                            .timeout_secs(10),
                    ],
                )),
            ),
            Action::optional(
                "Opening settings",
                ActionKind::Click(ElementSpec::new(
                    "Settings entry",
                    vec![
                        role("menuitem", "Settings").timeout_secs(10),
                        text("Settings").timeout_secs(8),
                    ],
                )),
            ),
            Action::required(
                "Entering new name",
                ActionKind::Fill(
                    ElementSpec::new(
                        "Name field",
                        vec![css(r#"[id*="-form-item"]"#).timeout_secs(15)],
                    ),
                    Value::IterationName,
                ),
            ),
            Action::required(
                "Saving name",
                ActionKind::Click(ElementSpec::new(
                    "Update button",
                    vec![role("button", "Update").nth_or_first(1).timeout_secs(10)],
                )),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::{LocatorRule, Pick};

    fn template() -> WorkflowTemplate {
        WorkflowTemplate::standard(&SiteProfile::default()).unwrap()
    }

    #[test]
    fn iteration_steps_run_in_fixed_order() {
        let kinds: Vec<_> = template().iteration.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::Navigate,
                StepKind::Remix,
                StepKind::Publish,
                StepKind::Rename
            ]
        );
    }

    #[test]
    fn policies_match_step_roles() {
        let workflow = template();
        assert_eq!(workflow.login.policy, FailurePolicy::AbortRun);
        for kind in [StepKind::Navigate, StepKind::Remix, StepKind::Publish] {
            assert_eq!(workflow.step(kind).unwrap().policy, FailurePolicy::SkipIteration);
        }
        assert_eq!(workflow.step(StepKind::Rename).unwrap().policy, FailurePolicy::Tolerate);
    }

    #[test]
    fn remix_button_strategies_keep_their_order_and_deadlines() {
        let workflow = template();
        let remix = workflow.step(StepKind::Remix).unwrap();
        let ActionKind::Click(spec) = &remix.actions[0].kind else {
            panic!("first remix action must be a click");
        };
        let labels: Vec<_> = spec.strategies.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["role", "text", "css"]);
        assert!(spec
            .strategies
            .iter()
            .all(|s| s.timeout == Duration::from_secs(8)));
        assert!(remix.actions[1].is_optional());
        assert!(remix.actions[2].is_optional());
    }

    #[test]
    fn update_button_prefers_the_second_match() {
        let workflow = template();
        let rename = workflow.step(StepKind::Rename).unwrap();
        let ActionKind::Click(spec) = &rename.actions.last().unwrap().kind else {
            panic!("rename must end with a click");
        };
        assert_eq!(spec.strategies[0].query.pick, Pick::NthOrFirst { index: 1 });
    }

    #[test]
    fn continue_button_requires_an_exact_name() {
        let workflow = template();
        let ActionKind::Click(spec) = &workflow.login.actions[2].kind else {
            panic!("third login action must be a click");
        };
        assert!(matches!(
            &spec.strategies[0].query.rule,
            LocatorRule::Role { exact: true, name, .. } if name == "Continuar"
        ));
    }

    #[test]
    fn invalid_project_pattern_is_rejected() {
        let site = SiteProfile {
            project_path_pattern: "/projects/[".into(),
            ..SiteProfile::default()
        };
        assert!(matches!(
            WorkflowTemplate::standard(&site),
            Err(FlowError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn site_profile_fills_missing_fields_with_defaults() {
        let site: SiteProfile =
            serde_yaml::from_str("expected_domain: example.test\nhome_url: https://example.test/\n")
                .unwrap();
        assert_eq!(site.expected_domain, "example.test");
        assert_eq!(site.login_url, "https://lovable.dev/login");
        assert_eq!(site.project_path_fragment, "/projects/");
    }

    #[test]
    fn standard_template_passes_validation() {
        assert!(template().validate().is_ok());
    }

    #[test]
    fn validation_rejects_empty_strategy_lists() {
        let mut workflow = template();
        let publish = workflow
            .iteration
            .iter_mut()
            .find(|step| step.kind == StepKind::Publish)
            .unwrap();
        publish.actions[0].kind =
            ActionKind::Click(ElementSpec::new("Publish button", Vec::new()));
        assert!(matches!(
            validate_step(publish),
            Err(FlowError::InvalidWorkflow(_))
        ));
        assert!(workflow.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_and_unbudgeted_steps() {
        let workflow = template();
        let empty = Step {
            actions: Vec::new(),
            ..workflow.login.clone()
        };
        assert!(validate_step(&empty).is_err());
        let unbudgeted = Step {
            budget: Duration::ZERO,
            ..workflow.login.clone()
        };
        assert!(validate_step(&unbudgeted).is_err());
    }
}
