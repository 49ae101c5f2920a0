/*!
## Rust Machine Module

The calculator itself: programs, the value stack, variables, the
return stack and everything that runs on them, plus the state file.

*/

/// Byte offset of an instruction inside its program.
pub type Address = usize;

mod command;
mod display;
mod flags;
mod format;
mod func;
mod function;
mod keybuf;
mod keys;
mod link;
mod load;
mod matedit;
mod operation;
mod print;
mod program;
mod rtn;
mod runtime;
mod save;
mod shell;
mod solve;
mod stack;
mod val;
mod var;

#[cfg(test)]
mod tests;

pub use display::Display;
pub use flags::{AngleMode, DisplayMode, Flags};
pub use format::format_val;
pub use function::Function;
pub use keybuf::{Key, KeyBuf};
pub use keys::Entry;
pub use link::Link;
pub use load::{state_version, LoadOutcome};
pub use matedit::MatEdit;
pub use operation::Operation;
pub use program::{Program, Programs, Target};
pub use rtn::{Frame, Owner, MAX_RTNS};
pub use runtime::{Event, InputPrompt, RtnStatus, Runtime, Task};
pub use save::{CURRENT_VERSION, MAGIC, MIN_VERSION};
pub use shell::{NullShell, Shell};
pub use solve::{IntegState, SolveState};
pub use stack::{RegStack, Stack};
pub use val::{Cell, ComplexMatrix, RealMatrix, Shared, Text};
pub use val::Val;
pub use var::{Var, Vars};
