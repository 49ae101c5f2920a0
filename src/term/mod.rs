/*!
## Terminal front end

A line editor over the engine. Each line is a command, a number or, in
program mode, a line to insert. `KEY` followed by key codes presses
calculator keys (`KEY 13 S36`, `S` for shifted). `QUIT` saves and
leaves.

*/

use crate::error;
use crate::lang::Error;
use crate::mach::{format_val, state_version, Event, Runtime, Shell};
use ansi_term::Style;
use clap::Parser;
use linefeed::{Interface, ReadResult, Signal};
use log::{info, warn};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, ErrorKind};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Programmable RPN calculator.
#[derive(Parser, Debug, Clone)]
#[command(name = "rpn", version, about)]
pub struct Config {
    /// State file, loaded at start and saved on exit
    #[arg(long, default_value = "rpn.state")]
    pub state: PathBuf,

    /// Instructions run between checks for output and interrupts
    #[arg(long, default_value_t = 5000)]
    pub cycles: usize,

    /// Leave the state file alone on exit
    #[arg(long)]
    pub no_save: bool,
}

/// Printer output collected until the loop can show it.
#[derive(Default)]
struct TermShell {
    printed: Rc<RefCell<Vec<String>>>,
}

impl Shell for TermShell {
    fn blit(&mut self, _bits: &[u8], _bpl: usize, _x: usize, _y: usize, _w: usize, _h: usize) {}

    fn repaint(&mut self, _bits: &[u8]) {}

    fn print_lines(&mut self, bytes: &[u8], is_graphic: bool) {
        if !is_graphic {
            let line = String::from_utf8_lossy(bytes).into_owned();
            self.printed.borrow_mut().push(line);
        }
    }

    fn platform(&self) -> String {
        format!(
            "rpn-engine {} {}",
            env!("CARGO_PKG_VERSION"),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )
    }
}

pub fn main(config: Config) {
    let interrupted = Arc::new(AtomicBool::new(false));
    let int_moved = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        int_moved.store(true, Ordering::SeqCst);
    }) {
        warn!("no Ctrl-C handler: {}", e);
    }
    if let Err(error) = main_loop(&config, interrupted) {
        eprintln!("{}", error);
    }
}

fn main_loop(config: &Config, interrupted: Arc<AtomicBool>) -> std::io::Result<()> {
    let printed = Rc::new(RefCell::new(vec![]));
    let shell = TermShell {
        printed: printed.clone(),
    };
    let mut runtime = Runtime::new(Box::new(shell));
    let command = Interface::new("rpn")?;
    command.set_report_signal(Signal::Interrupt, true);
    if let Err(e) = load_state(&mut runtime, config) {
        command.write_fmt(format_args!("{}\n", Style::new().bold().paint(e.to_string())))?;
    }

    loop {
        if interrupted.swap(false, Ordering::SeqCst) {
            runtime.interrupt();
        }
        let event = runtime.execute(config.cycles);
        for line in printed.borrow_mut().drain(..) {
            command.write_fmt(format_args!("{}\n", line))?;
        }
        match event {
            Event::Running => {}
            Event::Errors(errors) => {
                for error in errors.iter() {
                    command.write_fmt(format_args!(
                        "{}\n",
                        Style::new().bold().paint(error.to_string())
                    ))?;
                }
            }
            Event::Message(m) => {
                command.write_fmt(format_args!("{}\n", m))?;
            }
            Event::Input(prompt) => {
                command.set_prompt(&format!("{}? ", prompt))?;
                match command.read_line()? {
                    ReadResult::Input(line) => {
                        runtime.enter(&line);
                    }
                    ReadResult::Signal(Signal::Interrupt) => {
                        command.set_buffer("")?;
                        runtime.enter("EXIT");
                    }
                    ReadResult::Signal(_) | ReadResult::Eof => break,
                }
            }
            Event::Stopped => {
                show(&command, &runtime)?;
                command.set_prompt(&prompt(&runtime))?;
                let line = match command.read_line()? {
                    ReadResult::Input(line) => line,
                    ReadResult::Signal(Signal::Interrupt) => {
                        command.set_buffer("")?;
                        runtime.interrupt();
                        continue;
                    }
                    ReadResult::Signal(_) | ReadResult::Eof => break,
                };
                if line.trim().eq_ignore_ascii_case("QUIT") {
                    break;
                }
                let accepted = match key_line(&line) {
                    Some(keys) => {
                        for (shift, code) in keys {
                            runtime.keydown(shift, code);
                        }
                        true
                    }
                    None => runtime.enter(&line),
                };
                if accepted {
                    command.add_history_unique(line);
                }
            }
        }
    }

    if !config.no_save {
        if let Err(e) = save_state(&runtime, config) {
            eprintln!("{}", Style::new().bold().paint(e.to_string()));
        }
    }
    Ok(())
}

/// `KEY 13 S36` as key presses; `None` for any other line.
fn key_line(line: &str) -> Option<Vec<(bool, u8)>> {
    let mut words = line.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("KEY") {
        return None;
    }
    words
        .map(|w| {
            let (shift, num) = match w.strip_prefix(|c: char| c == 'S' || c == 's') {
                Some(rest) => (true, rest),
                None => (false, w),
            };
            match num.parse::<u8>() {
                Ok(code) if (1..=37).contains(&code) => Some((shift, code)),
                _ => None,
            }
        })
        .collect()
}

fn prompt(runtime: &Runtime) -> String {
    if let Some(op) = runtime.pending() {
        return format!("{} _ ", op.name());
    }
    match runtime.entry_text() {
        Some(text) => format!("{}_ ", text),
        None if runtime.is_prgm_mode() => "PRGM> ".to_string(),
        None => "> ".to_string(),
    }
}

/// The current program line in program mode, otherwise the stack.
fn show<T: linefeed::Terminal>(command: &Interface<T>, runtime: &Runtime) -> std::io::Result<()> {
    if runtime.is_prgm_mode() {
        return command.write_fmt(format_args!("{}\n", runtime.current_line()));
    }
    const NAMES: [&str; 4] = ["x", "y", "z", "t"];
    let stack = runtime.stack();
    let shown = if stack.is_big() { stack.depth().min(8) } else { 4 };
    for depth in (0..shown).rev() {
        let name = match NAMES.get(depth) {
            Some(n) => n.to_string(),
            None => (depth + 1).to_string(),
        };
        if let Some(v) = stack.get(depth) {
            command.write_fmt(format_args!("{}: {}\n", name, format_val(v, runtime.flags())))?;
        }
    }
    Ok(())
}

fn load_state(runtime: &mut Runtime, config: &Config) -> Result<(), Error> {
    let mut file = match File::open(&config.state) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no state file at {}", config.state.display());
            return Ok(());
        }
        Err(e) => return Err(Error::from(e)),
    };
    let version = state_version(&mut file)?;
    let outcome = runtime.load(&mut file, version);
    if outcome.too_new {
        return Err(error!(InvalidData; "STATE FILE FROM A NEWER VERSION"));
    }
    if outcome.needs_clear {
        return Err(error!(InvalidData; "STATE FILE DAMAGED, MEMORY CLEARED"));
    }
    Ok(())
}

fn save_state(runtime: &Runtime, config: &Config) -> Result<(), Error> {
    let file = File::create(&config.state)?;
    let mut out = BufWriter::new(file);
    runtime.save(&mut out)?;
    info!("state saved to {}", config.state.display());
    Ok(())
}
