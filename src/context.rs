use std::io::IsTerminal;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cloud::{AwsCliApi, CloudApi, RetryingCloudApi};
use crate::config::EngineConfig;
use crate::handlers::{DefaultHandlerRegistry, HandlerRegistry, WaitPolicies};
use crate::iac::{IacExecutor, TerraformCli};
use crate::traits::{
    CommandExecutor, InquireUserInput, Output, RealCommandExecutor, TerminalOutput, UserInput,
};
#[cfg(test)]
use crate::traits::{MockOutput, MockUserInput};

/// Application context that holds all dependencies for dependency injection
pub struct Context {
    pub input: Arc<dyn UserInput>,
    pub output: Arc<dyn Output>,
    pub cloud: Arc<dyn CloudApi>,
    pub iac: Arc<dyn IacExecutor>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub waits: WaitPolicies,
    /// Set by the Ctrl-C handler; checked between teardown levels
    pub cancel: Arc<AtomicBool>,
    /// Whether stdin is a terminal an operator can answer prompts on
    pub interactive: bool,
}

impl Context {
    /// Create a context with real implementations (for production use)
    pub fn from_config(config: &EngineConfig) -> Self {
        let command: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor::new());
        let aws: Arc<dyn CloudApi> = Arc::new(AwsCliApi::new(command.clone(), &config.region));
        Self {
            input: Arc::new(InquireUserInput),
            output: Arc::new(TerminalOutput),
            cloud: Arc::new(RetryingCloudApi::new(aws, config.retry.api.to_policy())),
            iac: Arc::new(TerraformCli::new(
                command,
                &config.iac.binary,
                &config.iac.working_dir,
            )),
            handlers: Arc::new(DefaultHandlerRegistry::with_defaults()),
            waits: WaitPolicies::from_config(&config.retry),
            cancel: Arc::new(AtomicBool::new(false)),
            interactive: std::io::stdin().is_terminal(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create a test context with specific fakes and non-sleeping waits
    #[cfg(test)]
    pub fn test_with(
        cloud: Arc<dyn CloudApi>,
        iac: Arc<dyn IacExecutor>,
        input: Arc<dyn UserInput>,
        output: Arc<dyn Output>,
        interactive: bool,
    ) -> Self {
        Self {
            input,
            output,
            cloud,
            iac,
            handlers: Arc::new(DefaultHandlerRegistry::with_defaults()),
            waits: WaitPolicies::immediate(3),
            cancel: Arc::new(AtomicBool::new(false)),
            interactive,
        }
    }

    /// Test context with a mock prompt and captured output
    #[cfg(test)]
    pub fn test(cloud: Arc<dyn CloudApi>, iac: Arc<dyn IacExecutor>) -> Self {
        Self::test_with(
            cloud,
            iac,
            Arc::new(MockUserInput::new()),
            Arc::new(MockOutput::new()),
            false,
        )
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            input: Arc::clone(&self.input),
            output: Arc::clone(&self.output),
            cloud: Arc::clone(&self.cloud),
            iac: Arc::clone(&self.iac),
            handlers: Arc::clone(&self.handlers),
            waits: self.waits,
            cancel: Arc::clone(&self.cancel),
            interactive: self.interactive,
        }
    }
}
