//! Combines file-sourced tokens with explicit command-line tokens.

use serde::Serialize;

use crate::document::OptionSection;

/// Final ordered argument tokens handed to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MergedArguments {
    tokens: Vec<String>,
}

impl MergedArguments {
    /// Tokens in launch order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Consumes the arguments, returning the tokens.
    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true when there is nothing to pass.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Re-expresses the merged tokens as a section for `subcommand`.
    pub fn to_section(&self, subcommand: &str) -> OptionSection {
        OptionSection::from_tokens(subcommand, self.tokens.iter().cloned())
    }
}

/// Merges a configuration section with command-line tokens.
///
/// File tokens come first and command-line tokens follow, so the server's own
/// parser applies last-token-wins and the command line takes precedence. With
/// no section the command-line tokens pass through unchanged.
pub fn merge(file: Option<&OptionSection>, cli: &[String]) -> MergedArguments {
    let file_tokens = file.map(OptionSection::tokens).unwrap_or_default();
    let mut tokens = Vec::with_capacity(file_tokens.len() + cli.len());
    tokens.extend_from_slice(file_tokens);
    tokens.extend_from_slice(cli);
    MergedArguments { tokens }
}
