pub mod commands;
pub mod output;

pub mod cmd {
    pub use super::commands::{Cli, Outcome};
}
