pub mod command;
pub mod output;
pub mod user_input;

pub use command::{CommandExecutor, MockCommandExecutor, MockCommandResult, RealCommandExecutor};
pub use output::{MockOutput, Output, OutputMessage, Progress, TerminalOutput};
pub use user_input::{InquireUserInput, MockResponse, MockUserInput, UserInput};
