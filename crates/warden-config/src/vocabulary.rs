//! Flag vocabularies describing what a server subcommand accepts.
//!
//! The server process remains the authority on its own flags. A vocabulary is
//! the harness's copy of that argument specification, used only to predict
//! whether the server will reject a configuration.

use std::collections::BTreeMap;

use clap::Command;

/// Recognised flag spellings for one subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagVocabulary {
    /// Maps each spelling (`--port`, `-p`) to whether it consumes a value.
    flags: BTreeMap<String, bool>,
}

impl FlagVocabulary {
    /// Creates an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a switch that takes no value.
    #[must_use]
    pub fn flag(mut self, spelling: impl Into<String>) -> Self {
        self.flags.insert(spelling.into(), false);
        self
    }

    /// Adds an option that consumes a value.
    #[must_use]
    pub fn option(mut self, spelling: impl Into<String>) -> Self {
        self.flags.insert(spelling.into(), true);
        self
    }

    /// Derives the vocabulary from a clap argument specification.
    ///
    /// Long names, long aliases, short names and short aliases are all
    /// recorded. The implicit help flag is included unless the command
    /// disables it.
    pub fn from_command(command: &Command) -> Self {
        let mut vocabulary = Self::new();
        for argument in command.get_arguments() {
            if argument.is_positional() {
                continue;
            }
            let takes_value = argument.get_action().takes_values();
            let longs = argument
                .get_long()
                .into_iter()
                .chain(argument.get_all_aliases().unwrap_or_default());
            for long in longs {
                vocabulary.flags.insert(format!("--{long}"), takes_value);
            }
            let shorts = argument
                .get_short()
                .into_iter()
                .chain(argument.get_all_short_aliases().unwrap_or_default());
            for short in shorts {
                vocabulary.flags.insert(format!("-{short}"), takes_value);
            }
        }
        if !command.is_disable_help_flag_set() {
            vocabulary.flags.entry(String::from("--help")).or_insert(false);
            vocabulary.flags.entry(String::from("-h")).or_insert(false);
        }
        vocabulary
    }

    /// Derives the vocabulary of the named subcommand of `root`.
    pub fn from_subcommand(root: &Command, subcommand: &str) -> Option<Self> {
        root.find_subcommand(subcommand).map(Self::from_command)
    }

    /// Looks up a spelling, returning whether it consumes a value.
    pub fn lookup(&self, spelling: &str) -> Option<bool> {
        self.flags.get(spelling).copied()
    }

    /// Returns true when the vocabulary knows the spelling.
    pub fn recognises(&self, spelling: &str) -> bool {
        self.flags.contains_key(spelling)
    }

    /// Number of recognised spellings.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true when no spelling is recognised.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
