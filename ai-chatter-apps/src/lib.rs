//! Application runtime and programs for ai-chatter
//!
//! An [`Application`] owns the settings, the session, the provider and the
//! communicator; a [`Program`] drives it.

pub mod application;
pub mod chat;
pub mod communicator;
pub mod error;
pub mod howto;
pub mod web;

pub use application::{Application, Program};
pub use chat::Chatter;
pub use communicator::{CliCommunicator, Communicator};
pub use error::{AppError, AppResult};
pub use howto::ShellHowTo;
pub use web::SummarizePage;
