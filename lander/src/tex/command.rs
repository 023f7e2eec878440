//! Code for locating invocations of a LaTeX command and extracting the raw content of its arguments.
//!
//! A command is described once with [`LatexCommand::new`] as a name plus an ordered list of argument slots,
//! then matched against any number of sources with [`LatexCommand::parse`].

use crate::error::CommandParseError;
use regex::{Matches, Regex};
use std::sync::LazyLock;

// A whitespace-delimited argument, as in `\input file`
static WHITESPACE_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^\s%]+)[ %\t\n]+").expect("whitespace argument pattern should be valid")
});

/// The delimiters around a command argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bracket {
    /// `[...]`, conventionally an optional argument
    Square,
    /// `{...}`, conventionally a required argument
    Curly,
}

impl Bracket {
    #[must_use]
    pub const fn open(self) -> u8 {
        match self {
            Self::Square => b'[',
            Self::Curly => b'{',
        }
    }

    #[must_use]
    pub const fn close(self) -> u8 {
        match self {
            Self::Square => b']',
            Self::Curly => b'}',
        }
    }
}

/// One declared argument position of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgumentSlot {
    pub bracket: Bracket,
    pub required: bool,
    pub name: Option<&'static str>,
    index: usize,
}

impl ArgumentSlot {
    #[must_use]
    pub const fn required(bracket: Bracket) -> Self {
        Self {
            bracket,
            required: true,
            name: None,
            index: 0,
        }
    }

    #[must_use]
    pub const fn optional(bracket: Bracket) -> Self {
        Self {
            bracket,
            required: false,
            name: None,
            index: 0,
        }
    }

    /// Labels the slot so its parsed content can be retrieved by name.
    #[must_use]
    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Position of the slot within its command.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

/// The syntax of a LaTeX command: its name (without the leading backslash) and its argument slots.
#[derive(Debug, Clone)]
pub struct LatexCommand {
    name: Box<str>,
    slots: Box<[ArgumentSlot]>,
    pattern: Regex,
}

impl LatexCommand {
    /// Creates a command description. Slot indices are assigned in the order the slots are given.
    #[must_use]
    pub fn new<I>(name: &str, slots: I) -> Self
    where
        I: IntoIterator<Item = ArgumentSlot>,
    {
        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| ArgumentSlot { index, ..slot })
            .collect();

        // The name must be followed by whitespace, an argument bracket, or a comment
        // so that `\title` does not match `\titlename`.
        let pattern = Regex::new(&format!(r"\\{}[\s{{\[%]", regex::escape(name)))
            .expect("escaped command pattern should be valid");

        Self {
            name: name.into(),
            slots,
            pattern,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn slots(&self) -> &[ArgumentSlot] {
        &self.slots
    }

    /// Scans `source` for every invocation of this command, in source order.
    ///
    /// Each item is parsed independently, so a malformed invocation yields an error
    /// without stopping the scan for later invocations. Calling this again restarts the scan.
    #[must_use]
    pub fn parse<'a>(&'a self, source: &'a str) -> ParsedCommands<'a> {
        ParsedCommands {
            command: self,
            source,
            matches: self.pattern.find_iter(source),
        }
    }

    /// Parses the invocation whose backslash is at `start`.
    fn parse_at<'a>(
        &'a self,
        source: &'a str,
        start: usize,
    ) -> Result<ParsedCommand<'a>, CommandParseError> {
        let bytes = source.as_bytes();
        let name_end = start + 1 + self.name.len();

        let mut arguments = Vec::with_capacity(self.slots.len());
        let mut cursor = name_end;

        for slot in &self.slots {
            let open = slot.bracket.open();
            let mut open_at = None;

            for (offset, &byte) in bytes[cursor..].iter().enumerate() {
                if byte == open {
                    open_at = Some(cursor + offset);
                    break;
                } else if byte == b'\n' {
                    if slot.required {
                        return self.parse_whitespace_argument(source, start, name_end, slot);
                    }
                    break;
                } else if !slot.required && !byte.is_ascii_whitespace() {
                    // Something other than this slot's bracket comes next
                    break;
                }
            }

            let Some(open_at) = open_at else {
                if slot.required {
                    return Err(CommandParseError::MissingArgument {
                        command: self.name.to_string(),
                        offset: start,
                        index: slot.index,
                    });
                }
                continue;
            };

            let close_at = balanced_group(source, open_at, slot.bracket).ok_or_else(|| {
                CommandParseError::UnbalancedArgument {
                    command: self.name.to_string(),
                    offset: start,
                    index: slot.index,
                }
            })?;

            arguments.push(ParsedArgument {
                index: slot.index,
                name: slot.name,
                content: source[open_at + 1..close_at].trim(),
            });
            cursor = close_at + 1;
        }

        Ok(ParsedCommand {
            name: &self.name,
            start,
            source: &source[start..cursor],
            arguments,
        })
    }

    /// Falls back to a single token after the command name for commands like `\input file`.
    /// The command ends at that token; no further slots are parsed.
    fn parse_whitespace_argument<'a>(
        &'a self,
        source: &'a str,
        start: usize,
        name_end: usize,
        slot: &ArgumentSlot,
    ) -> Result<ParsedCommand<'a>, CommandParseError> {
        let token = WHITESPACE_ARGUMENT
            .captures(&source[name_end..])
            .and_then(|captures| captures.get(1))
            .ok_or_else(|| CommandParseError::MissingWhitespaceArgument {
                command: self.name.to_string(),
                offset: start,
                index: slot.index,
            })?;

        let end = name_end + token.end();

        Ok(ParsedCommand {
            name: &self.name,
            start,
            source: &source[start..end],
            arguments: vec![ParsedArgument {
                index: slot.index,
                name: slot.name,
                content: token.as_str().trim(),
            }],
        })
    }
}

/// Finds the closing bracket that balances the opening bracket at `open_at`.
///
/// Only brackets of the same kind are counted, so `{a[b}` closes at the `}`.
/// Returns `None` if the source ends before the group is closed
/// or if `open_at` does not point to an opening bracket of the given kind.
#[must_use]
pub fn balanced_group(source: &str, open_at: usize, bracket: Bracket) -> Option<usize> {
    let bytes = source.as_bytes();
    if bytes.get(open_at) != Some(&bracket.open()) {
        return None;
    }

    let mut balance = 0_usize;
    for (offset, &byte) in bytes[open_at..].iter().enumerate() {
        if byte == bracket.open() {
            balance += 1;
        } else if byte == bracket.close() {
            balance -= 1;
            if balance == 0 {
                return Some(open_at + offset);
            }
        }
    }

    None
}

/// Iterator over the invocations of a command in one source, created by [`LatexCommand::parse`].
pub struct ParsedCommands<'a> {
    command: &'a LatexCommand,
    source: &'a str,
    matches: Matches<'a, 'a>,
}

impl<'a> Iterator for ParsedCommands<'a> {
    type Item = Result<ParsedCommand<'a>, CommandParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let found = self.matches.next()?;
        Some(self.command.parse_at(self.source, found.start()))
    }
}

/// The content of one argument found in an invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedArgument<'a> {
    pub index: usize,
    pub name: Option<&'a str>,
    // Trimmed of surrounding whitespace
    pub content: &'a str,
}

/// A key for looking up a parsed argument, either by slot index or by slot name.
#[derive(Clone, Copy, Debug)]
pub enum ArgumentKey<'k> {
    Index(usize),
    Name(&'k str),
}

impl From<usize> for ArgumentKey<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'k> From<&'k str> for ArgumentKey<'k> {
    fn from(name: &'k str) -> Self {
        Self::Name(name)
    }
}

/// One matched invocation of a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    // Byte offset of the leading backslash
    pub start: usize,
    // Verbatim source of the whole invocation
    pub source: &'a str,
    arguments: Vec<ParsedArgument<'a>>,
}

impl<'a> ParsedCommand<'a> {
    /// Arguments that were found, in slot order. Absent optional slots are not included.
    #[must_use]
    pub fn arguments(&self) -> &[ParsedArgument<'a>] {
        &self.arguments
    }

    /// Returns the content of an argument, or `None` if the slot was absent.
    /// An argument that was present but empty is `Some("")`.
    #[must_use]
    pub fn get<'k>(&self, key: impl Into<ArgumentKey<'k>>) -> Option<&'a str> {
        let key = key.into();
        self.arguments
            .iter()
            .find(|argument| match key {
                ArgumentKey::Index(index) => argument.index == index,
                ArgumentKey::Name(name) => argument.name == Some(name),
            })
            .map(|argument| argument.content)
    }

    #[must_use]
    pub fn contains<'k>(&self, key: impl Into<ArgumentKey<'k>>) -> bool {
        self.get(key).is_some()
    }
}
