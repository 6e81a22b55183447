//! Chat command syntax: `[/]module command [arg ...]`.

use crate::domain::errors::ParseError;
use shared_types::Action;

/// A parsed `(module, command, args)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub module: String,
    pub command: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub fn action(&self) -> Action {
        Action::new(self.module.clone(), self.command.clone())
    }
}

/// Parse chat text into a command.
///
/// Leading/trailing whitespace and one leading `/` are ignored; tokens are
/// whitespace separated. Fewer than two tokens is an error.
pub fn parse_text_command(text: &str) -> Result<ParsedCommand, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let body = trimmed.strip_prefix('/').unwrap_or(trimmed);

    let mut parts = body.split_whitespace();
    let (Some(module), Some(command)) = (parts.next(), parts.next()) else {
        return Err(ParseError::MissingCommand(trimmed.to_string()));
    };

    Ok(ParsedCommand {
        module: module.to_string(),
        command: command.to_string(),
        args: parts.map(str::to_string).collect(),
    })
}
