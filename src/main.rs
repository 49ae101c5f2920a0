//! # rpn
//!
//! Command line front end for the calculator engine.

use clap::Parser;
use env_logger::Env;
use rpn::term::{self, Config};

fn main() {
    let config = Config::parse();
    env_logger::Builder::from_env(Env::new().filter_or("RPN_LOG", "warn")).init();
    term::main(config);
}
