//! Decides what happens to each orphaned resource.

use std::fmt;
use std::sync::Arc;

use crate::resolver::{is_valid_address, Confidence, Suggestion};
use crate::resource::ResourceDescriptor;
use crate::session::CleanupSession;
use crate::traits::UserInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Import confident suggestions, flag everything else for review
    Auto,
    /// Ask the operator for every orphan
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Import(String),
    Delete,
    Skip,
    ManualReview,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Import(address) => write!(f, "import as {}", address),
            Decision::Delete => write!(f, "delete"),
            Decision::Skip => write!(f, "skip"),
            Decision::ManualReview => write!(f, "manual review"),
        }
    }
}

/// What the operator picked at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorChoice {
    ImportSuggested,
    ImportCustom(String),
    Skip,
    Delete,
}

/// Pure decision for one orphan.
///
/// `choice` is only consulted in interactive mode; an interactive run
/// without an answer leaves the resource for manual review.
pub fn decide(
    resource: &ResourceDescriptor,
    suggestion: &Suggestion,
    mode: PlanMode,
    choice: Option<&OperatorChoice>,
) -> Decision {
    match mode {
        PlanMode::Auto => {
            if resource.resource_type.is_importable() && suggestion.confidence != Confidence::Fallback {
                Decision::Import(suggestion.address.clone())
            } else {
                Decision::ManualReview
            }
        }
        PlanMode::Interactive => match choice {
            Some(OperatorChoice::ImportSuggested) => Decision::Import(suggestion.address.clone()),
            Some(OperatorChoice::ImportCustom(address)) if is_valid_address(address.trim()) => {
                Decision::Import(address.trim().to_string())
            }
            Some(OperatorChoice::ImportCustom(_)) => Decision::ManualReview,
            Some(OperatorChoice::Skip) => Decision::Skip,
            Some(OperatorChoice::Delete) => Decision::Delete,
            None => Decision::ManualReview,
        },
    }
}

/// Source of operator answers in interactive mode
pub trait DecisionPrompt {
    fn choose(&self, resource: &ResourceDescriptor, suggestion: &Suggestion) -> anyhow::Result<OperatorChoice>;
}

/// Prompts through [`UserInput`]
pub struct UserInputPrompt {
    input: Arc<dyn UserInput>,
}

const CHOICE_CUSTOM: &str = "Import at a custom address";
const CHOICE_SKIP: &str = "Skip (leave it alone)";
const CHOICE_DELETE: &str = "Delete it";

impl UserInputPrompt {
    pub fn new(input: Arc<dyn UserInput>) -> Self {
        Self { input }
    }

    fn suggested_label(suggestion: &Suggestion) -> String {
        format!("Import at {} ({})", suggestion.address, suggestion.confidence)
    }
}

impl DecisionPrompt for UserInputPrompt {
    fn choose(&self, resource: &ResourceDescriptor, suggestion: &Suggestion) -> anyhow::Result<OperatorChoice> {
        let suggested = Self::suggested_label(suggestion);
        let options = vec![
            suggested.clone(),
            CHOICE_CUSTOM.to_string(),
            CHOICE_SKIP.to_string(),
            CHOICE_DELETE.to_string(),
        ];
        let answer = self
            .input
            .select(&format!("{}:", resource.display_string()), options)?;

        let choice = match answer.as_str() {
            CHOICE_CUSTOM => {
                let address = self
                    .input
                    .text("Resource address:", Some(&suggestion.address))?;
                OperatorChoice::ImportCustom(address)
            }
            CHOICE_SKIP => OperatorChoice::Skip,
            CHOICE_DELETE => OperatorChoice::Delete,
            _ => OperatorChoice::ImportSuggested,
        };
        Ok(choice)
    }
}

/// An orphan with its suggestion and decision
#[derive(Debug, Clone)]
pub struct PlannedResource {
    pub resource: ResourceDescriptor,
    pub suggestion: Suggestion,
    pub decision: Decision,
}

/// Decide every orphan in order, recording each decision in the session.
///
/// Prompting stops at the first error, which includes cancellation.
pub fn plan(
    orphans: Vec<(ResourceDescriptor, Suggestion)>,
    mode: PlanMode,
    prompt: Option<&dyn DecisionPrompt>,
    session: &mut CleanupSession,
) -> anyhow::Result<Vec<PlannedResource>> {
    let mut planned = Vec::with_capacity(orphans.len());
    for (resource, suggestion) in orphans {
        let choice = match (mode, prompt) {
            (PlanMode::Interactive, Some(prompt)) => Some(prompt.choose(&resource, &suggestion)?),
            _ => None,
        };
        if let Some(OperatorChoice::ImportCustom(address)) = &choice {
            if !is_valid_address(address.trim()) {
                session.warn(&format!("'{}' is not a valid resource address", address));
            }
        }
        let decision = decide(&resource, &suggestion, mode, choice.as_ref());
        session.record_decision(&resource, decision.clone());
        planned.push(PlannedResource {
            resource,
            suggestion,
            decision,
        });
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resolver::resolve;
    use crate::resource::{ResourceType, VpcPart};
    use crate::test_helpers::test_scope;
    use crate::traits::{MockResponse, MockUserInput};

    fn bucket() -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceType::S3Bucket, "proj-documents-dev-abc", "us-east-1")
    }

    #[test]
    fn test_auto_imports_confident_suggestions() {
        let resource = bucket();
        let suggestion = resolve(&resource);
        assert_eq!(
            decide(&resource, &suggestion, PlanMode::Auto, None),
            Decision::Import("module.storage.aws_s3_bucket.documents".into())
        );
    }

    #[test]
    fn test_auto_never_imports_fallbacks_or_side_effects() {
        let topic = ResourceDescriptor::new(ResourceType::SnsTopic, "arn:x", "us-east-1").with_name("proj-misc-dev");
        assert_eq!(decide(&topic, &resolve(&topic), PlanMode::Auto, None), Decision::ManualReview);

        let eni = ResourceDescriptor::new(ResourceType::Vpc(VpcPart::Eni), "eni-1", "us-east-1");
        let suggestion = Suggestion {
            address: "module.vpc.aws_network_interface.x".into(),
            confidence: Confidence::Exact,
        };
        assert_eq!(decide(&eni, &suggestion, PlanMode::Auto, None), Decision::ManualReview);
    }

    #[test]
    fn test_interactive_choices() {
        let resource = bucket();
        let suggestion = resolve(&resource);
        let d = |c: &OperatorChoice| decide(&resource, &suggestion, PlanMode::Interactive, Some(c));
        assert_eq!(d(&OperatorChoice::Skip), Decision::Skip);
        assert_eq!(d(&OperatorChoice::Delete), Decision::Delete);
        assert_eq!(
            d(&OperatorChoice::ImportCustom(" aws_s3_bucket.docs ".into())),
            Decision::Import("aws_s3_bucket.docs".into())
        );
        assert_eq!(d(&OperatorChoice::ImportCustom("not an address".into())), Decision::ManualReview);
        assert_eq!(
            decide(&resource, &suggestion, PlanMode::Interactive, None),
            Decision::ManualReview
        );
    }

    #[test]
    fn test_prompt_custom_address() {
        let input = Arc::new(MockUserInput::with_responses(vec![
            MockResponse::Select(CHOICE_CUSTOM.into()),
            MockResponse::Text("module.storage.aws_s3_bucket.archive".into()),
        ]));
        let prompt = UserInputPrompt::new(input.clone());
        let resource = bucket();
        let choice = prompt.choose(&resource, &resolve(&resource)).unwrap();
        assert_eq!(
            choice,
            OperatorChoice::ImportCustom("module.storage.aws_s3_bucket.archive".into())
        );
        assert_eq!(input.prompts().len(), 2);
    }

    #[test]
    fn test_plan_records_decisions() {
        let resource = bucket();
        let suggestion = resolve(&resource);
        let input = Arc::new(MockUserInput::with_responses(vec![MockResponse::Select(
            UserInputPrompt::suggested_label(&suggestion),
        )]));
        let prompt = UserInputPrompt::new(input);
        let mut session = CleanupSession::in_memory("reconcile", test_scope(), false);

        let planned = plan(
            vec![(resource.clone(), suggestion)],
            PlanMode::Interactive,
            Some(&prompt),
            &mut session,
        )
        .unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(
            session.decision(&resource.key()),
            Some(&Decision::Import("module.storage.aws_s3_bucket.documents".into()))
        );
    }

    #[test]
    fn test_plan_stops_on_cancel() {
        let resource = bucket();
        let suggestion = resolve(&resource);
        let prompt = UserInputPrompt::new(Arc::new(MockUserInput::with_responses(vec![MockResponse::Cancel])));
        let mut session = CleanupSession::in_memory("reconcile", test_scope(), false);
        let err = plan(vec![(resource, suggestion)], PlanMode::Interactive, Some(&prompt), &mut session)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::UserCancellation)));
    }
}
