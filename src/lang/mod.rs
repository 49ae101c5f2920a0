/*!
# Rust Language Module

This Rust module defines the calculator's instruction set: the command
table, instruction arguments, the bytecode they are stored as, and a
parser for the text form used by listings and the command line.

*/

#[macro_use]
mod error;
mod arg;
pub mod codec;
mod opcode;
mod parse;

pub use arg::canonical_text;
pub use arg::Arg;
pub use arg::Instruction;
pub use arg::StackReg;
pub use arg::MAX_TEXT;
pub use arg::MAX_XSTR;
pub use error::Error;
pub use error::ErrorCode;
pub use opcode::ArgKind;
pub use opcode::Opcode;
pub use parse::parse;
pub use parse::parse_arg_for;
pub use parse::Parsed;
