use crate::mach::{Event, Runtime, Val};

mod func_test;
mod matedit_test;
mod prgm_test;
mod rtn_test;
mod state_test;

fn run(runtime: &mut Runtime) -> String {
    run_cycles(runtime, 5000)
}

fn run_cycles(runtime: &mut Runtime, cycles: usize) -> String {
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

/// Types `lines` into program mode, then leaves it.
fn program(runtime: &mut Runtime, lines: &[&str]) {
    runtime.enter("PRGM");
    for line in lines {
        assert!(runtime.enter(line), "rejected {}", line);
    }
    runtime.enter("PRGM");
    assert_eq!(run(runtime), "");
}

fn x(runtime: &Runtime) -> f64 {
    runtime.stack().x().unwrap().as_real().unwrap()
}

fn y(runtime: &Runtime) -> f64 {
    runtime.stack().get(1).unwrap().as_real().unwrap()
}

fn real(runtime: &Runtime, name: &str) -> Option<f64> {
    runtime.recall_var(name).map(|v| match v {
        Val::Real(x) => *x,
        other => panic!("{:?}", other),
    })
}
