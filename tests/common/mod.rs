#![allow(dead_code)]

use rpn::mach::{Event, Runtime, Shell, Val};
use std::cell::RefCell;
use std::rc::Rc;

pub fn exec(runtime: &mut Runtime) -> String {
    exec_n(runtime, 5000)
}

pub fn exec_n(runtime: &mut Runtime, cycles: usize) -> String {
    let mut s = String::new();
    let mut prev_running = false;
    loop {
        let event = runtime.execute(cycles);
        match &event {
            Event::Stopped => {
                break;
            }
            Event::Errors(errors) => {
                for error in errors.iter() {
                    s.push_str(&format!("{}\n", error));
                }
            }
            Event::Running => {
                if prev_running {
                    s.push_str(&format!("\n{} Execution cycles exceeded.\n", cycles));
                    break;
                }
            }
            Event::Message(m) => {
                s.push_str(&format!("{}\n", m));
            }
            Event::Input(prompt) => {
                s.push_str(&format!("{}\n", prompt));
                break;
            }
        }
        match event {
            Event::Running => prev_running = true,
            _ => prev_running = false,
        }
    }
    s
}

/// Enters each line and runs until the engine stops.
pub fn enter_all(runtime: &mut Runtime, lines: &[&str]) -> String {
    let mut s = String::new();
    for line in lines {
        runtime.enter(line);
        s.push_str(&exec(runtime));
    }
    s
}

/// Types `lines` into program mode, then leaves it.
pub fn program(runtime: &mut Runtime, lines: &[&str]) {
    runtime.enter("PRGM");
    for line in lines {
        assert!(runtime.enter(line), "rejected {}", line);
    }
    runtime.enter("PRGM");
    assert_eq!(exec(runtime), "");
}

pub fn x(runtime: &Runtime) -> f64 {
    runtime.stack().x().unwrap().as_real().unwrap()
}

pub fn reg(runtime: &Runtime, depth: usize) -> &Val {
    runtime.stack().get(depth).unwrap()
}

/// A host that keeps what was printed.
#[derive(Default, Clone)]
pub struct Paper {
    pub lines: Rc<RefCell<Vec<String>>>,
}

impl Paper {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

impl Shell for Paper {
    fn blit(&mut self, _bits: &[u8], _bpl: usize, _x: usize, _y: usize, _w: usize, _h: usize) {}

    fn repaint(&mut self, _bits: &[u8]) {}

    fn print_lines(&mut self, bytes: &[u8], is_graphic: bool) {
        if !is_graphic {
            let line = String::from_utf8_lossy(bytes).into_owned();
            self.lines.borrow_mut().push(line);
        }
    }
}
