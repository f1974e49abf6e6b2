//! Input validation and confirmation before anything is mutated.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{EngineResult, ErrorKind};
use crate::resource::DiscoveryScope;
use crate::traits::UserInput;

lazy_static! {
    static ref PROJECT_PREFIX: Regex = Regex::new(r"^[a-z][a-z0-9-]*[a-z0-9]$").expect("valid regex");
    static ref ENVIRONMENT: Regex = Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid regex");
}

pub fn validate_project_prefix(prefix: &str) -> EngineResult<()> {
    if !(3..=32).contains(&prefix.len()) || !PROJECT_PREFIX.is_match(prefix) {
        return Err(ErrorKind::SafetyViolation(format!(
            "invalid project prefix '{}': expected 3-32 characters of lowercase letters, digits and hyphens, starting with a letter",
            prefix
        )));
    }
    Ok(())
}

pub fn validate_environment(environment: &str) -> EngineResult<()> {
    if !(2..=16).contains(&environment.len()) || !ENVIRONMENT.is_match(environment) {
        return Err(ErrorKind::SafetyViolation(format!(
            "invalid environment '{}': expected 2-16 characters of lowercase letters, digits and hyphens, starting with a letter",
            environment
        )));
    }
    Ok(())
}

/// Rejects malformed scopes and protected environments
pub struct SafetyGate {
    protected: Vec<String>,
}

impl SafetyGate {
    pub fn new(protected: &[String]) -> Self {
        Self {
            protected: protected.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// The deny-listed substring `environment` contains, if any
    pub fn protected_match(&self, environment: &str) -> Option<&str> {
        let env = environment.to_lowercase();
        self.protected
            .iter()
            .find(|p| !p.is_empty() && env.contains(p.as_str()))
            .map(|p| p.as_str())
    }

    /// Format checks plus the deny list.
    ///
    /// `allow_protected` lifts the deny list only when it repeats the
    /// environment name exactly.
    pub fn check(&self, scope: &DiscoveryScope, allow_protected: Option<&str>) -> EngineResult<()> {
        validate_project_prefix(&scope.project_prefix)?;
        validate_environment(&scope.environment)?;

        if let Some(matched) = self.protected_match(&scope.environment) {
            if allow_protected != Some(scope.environment.as_str()) {
                return Err(ErrorKind::SafetyViolation(format!(
                    "environment '{}' looks like production (contains '{}'); pass --allow-protected {} to proceed",
                    scope.environment, matched, scope.environment
                )));
            }
        }
        Ok(())
    }
}

/// What the operator must type before a destructive run
pub fn confirmation_literal(scope: &DiscoveryScope) -> String {
    format!("delete {}", scope.stack_name())
}

/// Ask for the confirmation literal.
///
/// `--yes` skips the prompt; without it a non-interactive stdin is refused.
pub fn confirm_destructive(
    input: &dyn UserInput,
    scope: &DiscoveryScope,
    assume_yes: bool,
    interactive: bool,
) -> anyhow::Result<()> {
    if assume_yes {
        return Ok(());
    }
    if !interactive {
        return Err(anyhow::Error::new(ErrorKind::SafetyViolation(
            "stdin is not a terminal; pass --yes to confirm a destructive run".to_string(),
        )));
    }

    let literal = confirmation_literal(scope);
    let answer = input.type_to_confirm(&literal)?;
    if answer.trim() != literal {
        return Err(anyhow::Error::new(ErrorKind::SafetyViolation(format!(
            "confirmation did not match '{}'",
            literal
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockResponse, MockUserInput};

    fn gate() -> SafetyGate {
        SafetyGate::new(&["prod".into(), "prd".into(), "live".into()])
    }

    fn scope(prefix: &str, env: &str) -> DiscoveryScope {
        DiscoveryScope::new(prefix, env, "us-east-1")
    }

    #[test]
    fn test_prefix_validation() {
        assert!(validate_project_prefix("enterprise-rag").is_ok());
        assert!(validate_project_prefix("ab").is_err());
        assert!(validate_project_prefix("rag-").is_err());
        assert!(validate_project_prefix("1rag").is_err());
        assert!(validate_project_prefix("Rag").is_err());
        assert!(validate_project_prefix(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_environment_validation() {
        assert!(validate_environment("dev").is_ok());
        assert!(validate_environment("qa-2").is_ok());
        assert!(validate_environment("d").is_err());
        assert!(validate_environment("dev env").is_err());
        assert!(validate_environment("averyveryverylongenv").is_err());
    }

    #[test]
    fn test_production_refused_without_exact_override() {
        let s = scope("proj", "production");
        assert!(matches!(gate().check(&s, None), Err(ErrorKind::SafetyViolation(_))));
        assert!(gate().check(&s, Some("prod")).is_err());
        assert!(gate().check(&s, Some("production")).is_ok());
        assert!(gate().check(&scope("proj", "golive"), None).is_err());
        assert!(gate().check(&scope("proj", "dev"), None).is_ok());
    }

    #[test]
    fn test_confirmation_literal() {
        assert_eq!(confirmation_literal(&scope("proj", "dev")), "delete proj-dev");
    }

    #[test]
    fn test_confirm_requires_exact_literal() {
        let s = scope("proj", "dev");
        let ok = MockUserInput::with_responses(vec![MockResponse::Text("delete proj-dev".into())]);
        assert!(confirm_destructive(&ok, &s, false, true).is_ok());

        let wrong = MockUserInput::with_responses(vec![MockResponse::Text("yes".into())]);
        let err = confirm_destructive(&wrong, &s, false, true).unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::SafetyViolation(_))));
        assert!(err.to_string().contains("confirmation did not match"));
    }

    #[test]
    fn test_escape_at_confirmation_cancels() {
        let s = scope("proj", "dev");
        let input = MockUserInput::with_responses(vec![MockResponse::Cancel]);
        let err = confirm_destructive(&input, &s, false, true).unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::UserCancellation)));
    }

    #[test]
    fn test_non_interactive_needs_yes() {
        let s = scope("proj", "dev");
        let input = MockUserInput::new();
        let err = confirm_destructive(&input, &s, false, false).unwrap_err();
        assert!(matches!(err.downcast_ref::<ErrorKind>(), Some(ErrorKind::SafetyViolation(_))));
        assert!(confirm_destructive(&input, &s, true, false).is_ok());
        assert!(input.prompts().is_empty());
    }
}
