//! The TeX engine: source normalization, macro handling, and command parsing.

mod citelink;
mod command;
mod macros;
mod normalize;

pub use citelink::CitationLinker;
pub use command::{
    balanced_group, ArgumentKey, ArgumentSlot, Bracket, LatexCommand, ParsedArgument,
    ParsedCommand, ParsedCommands,
};
pub use macros::{expand_macros, scrape_macros, MacroTable};
pub use normalize::{
    normalize, read_tex_file, read_tex_file_in, remove_comments, remove_trailing_whitespace,
};
