//! Lifecycle event name translation.
//!
//! Hook event names are camel-case words such as `preSave` or `beforeSave`.
//! The first word is the instruction (when the middleware runs), the rest is
//! the command (which lifecycle point it attaches to). Lucid-style spellings
//! are mapped onto the native middleware vocabulary:
//!
//! | event          | instruction | command  |
//! |----------------|-------------|----------|
//! | `preSave`      | `pre`       | `save`   |
//! | `beforeSave`   | `pre`       | `save`   |
//! | `afterSave`    | `post`      | `save`   |
//! | `preDelete`    | `pre`       | `remove` |
//!
//! Every hook registration goes through [`format`].

use crate::error::TranslationError;
use std::fmt;
use std::str::FromStr;

/// Valid middleware instructions.
pub const INSTRUCTIONS: [&str; 2] = ["pre", "post"];

/// Valid middleware commands (lifecycle points).
pub const COMMANDS: [&str; 11] = [
    "init",
    "validate",
    "save",
    "remove",
    "find",
    "update",
    "findOne",
    "findOneAndRemove",
    "findOneAndUpdate",
    "aggregate",
    "insertMany",
];

const INSTRUCTION_SYNONYMS: [(&str, &str); 2] = [("before", "pre"), ("after", "post")];
const COMMAND_SYNONYMS: [(&str, &str); 1] = [("delete", "remove")];

/// When a middleware runs relative to its lifecycle point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Pre,
    Post,
}

impl Instruction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instruction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            _ => Err(()),
        }
    }
}

/// A lifecycle point middleware can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Init,
    Validate,
    Save,
    Remove,
    Find,
    Update,
    FindOne,
    FindOneAndRemove,
    FindOneAndUpdate,
    Aggregate,
    InsertMany,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Self::Init,
        Self::Validate,
        Self::Save,
        Self::Remove,
        Self::Find,
        Self::Update,
        Self::FindOne,
        Self::FindOneAndRemove,
        Self::FindOneAndUpdate,
        Self::Aggregate,
        Self::InsertMany,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Validate => "validate",
            Self::Save => "save",
            Self::Remove => "remove",
            Self::Find => "find",
            Self::Update => "update",
            Self::FindOne => "findOne",
            Self::FindOneAndRemove => "findOneAndRemove",
            Self::FindOneAndUpdate => "findOneAndUpdate",
            Self::Aggregate => "aggregate",
            Self::InsertMany => "insertMany",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

/// Splits a string before every ASCII upper-case letter.
///
/// The first character never starts a new segment, so `"AbcDef"` splits into
/// `["Abc", "Def"]` and `""` yields `[""]`.
pub fn split_on_caps(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        if i > 0 && ch.is_ascii_uppercase() {
            parts.push(&s[start..i]);
            start = i;
        }
    }
    parts.push(&s[start..]);
    parts
}

fn first_lower_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn translate<'a>(token: &'a str, synonyms: &[(&str, &'a str)]) -> &'a str {
    synonyms
        .iter()
        .find(|(from, _)| *from == token)
        .map_or(token, |(_, to)| *to)
}

/// Splits an event name into raw `(instruction, command)` tokens and applies
/// the synonym tables. The result is not validated.
pub fn deconstruct(event: &str) -> (String, String) {
    let parts = split_on_caps(event);
    let (head, rest) = parts.split_first().map_or(("", &[][..]), |(h, r)| (*h, r));
    let command = first_lower_case(&rest.concat());

    let instruction = translate(head, &INSTRUCTION_SYNONYMS).to_string();
    let command = translate(&command, &COMMAND_SYNONYMS).to_string();
    (instruction, command)
}

/// Checks both tokens against the known vocabularies.
pub fn validate(instruction: &str, command: &str) -> (bool, bool) {
    (
        INSTRUCTIONS.contains(&instruction),
        COMMANDS.contains(&command),
    )
}

/// Translates an event name into a validated middleware point.
///
/// The instruction is checked first, so `"presSaved"` reports `pres`.
pub fn format(event: &str) -> Result<(Instruction, Command), TranslationError> {
    let (instruction, command) = deconstruct(event);

    let Ok(parsed_instruction) = instruction.parse::<Instruction>() else {
        return Err(TranslationError::InvalidInstruction {
            instruction,
            event: event.to_string(),
        });
    };
    let Ok(parsed_command) = command.parse::<Command>() else {
        return Err(TranslationError::InvalidCommand {
            command,
            event: event.to_string(),
        });
    };

    Ok((parsed_instruction, parsed_command))
}
