//! # RPN Engine
//!
//! The core of a programmable RPN calculator in the HP-42S tradition:
//! programs stored as compact bytecode, a stack of four or more levels,
//! named variables and matrices, subroutines with local variables, the
//! SOLVE and ∫ applications, and a state file that carries all of it
//! across sessions.
//!
//! A host drives a [`mach::Runtime`] by feeding it key presses or
//! command lines and calling `execute` in slices:
//! ```
//! use rpn::mach::{Event, Runtime};
//! let mut r = Runtime::default();
//! r.enter("2");
//! r.enter("3");
//! r.enter("+");
//! assert_eq!(r.execute(100), Event::Stopped);
//! assert_eq!(r.stack().x().unwrap(), &rpn::mach::Val::Real(5.0));
//! ```
//!
//! The `rpn` binary is a line-oriented front end over the same engine.

pub mod lang;
pub mod mach;
pub mod term;
