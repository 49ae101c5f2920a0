use super::*;

fn lines(r: &Runtime) -> Vec<String> {
    r.listing().into_iter().skip(1).collect()
}

#[test]
fn test_insert_after_current_line() {
    let mut r = Runtime::default();
    r.enter("PRGM");
    assert!(r.current_line().starts_with("00 {"));
    r.enter("LBL \"A\"");
    r.enter("1");
    r.enter("2");
    r.enter("BST");
    assert_eq!(r.current_line(), "02 1");
    r.enter("+");
    assert_eq!(r.current_line(), "03 +");
    assert_eq!(lines(&r), vec!["01 LBL \"A\"", "02 1", "03 +", "04 2", "05 .END."]);
}

#[test]
fn test_sst_and_bst_wrap() {
    let mut r = Runtime::default();
    r.enter("PRGM");
    r.enter("LBL \"A\"");
    r.enter("SST");
    assert_eq!(r.current_line(), "02 .END.");
    r.enter("SST");
    assert!(r.current_line().starts_with("00 {"));
    r.enter("BST");
    assert_eq!(r.current_line(), "02 .END.");
}

#[test]
fn test_delete_lines() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "1", "2", "3"]);
    r.enter("PRGM");
    r.enter("GTO . 02");
    assert_eq!(r.current_line(), "02 1");
    r.enter("DEL 2");
    assert_eq!(lines(&r), vec!["01 LBL \"A\"", "02 3", "03 .END."]);
}

#[test]
fn test_end_splits_program() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "1", "2"]);
    r.enter("PRGM");
    r.enter("GTO . 02");
    r.enter("END");
    r.enter("PRGM");
    assert_eq!(r.programs().len(), 2);
    assert_eq!(r.programs().listing(1)[1], "01 2");
    assert_eq!(r.programs().find_global_label(b"A").map(|(p, _)| p), Some(0));
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 1.0);
    assert_eq!(r.current().0, 0);
}

#[test]
fn test_gto_dot_dot_starts_new_program() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "1"]);
    r.enter("GTO ..");
    assert_eq!(r.programs().len(), 2);
    assert_eq!(r.current(), (1, None));
    r.enter("GTO ..");
    assert_eq!(r.programs().len(), 2);
}

#[test]
fn test_clear_program_by_label() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "1"]);
    r.enter("GTO ..");
    program(&mut r, &["LBL \"B\"", "2"]);
    r.enter("CLP \"A\"");
    assert_eq!(run(&mut r), "");
    assert!(r.programs().find_global_label(b"A").is_none());
    assert_eq!(r.programs().find_global_label(b"B").map(|(p, _)| p), Some(0));
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "Label Not Found\n");
}

#[test]
fn test_local_labels_and_loops() {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"A\"", "0", "STO 00", "1.005", "STO 01", "LBL 10", "RCL 01", "IP", "STO+ 00", "ISG 01", "GTO 10", "RCL 00", "RTN"],
    );
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(x(&r), 15.0);
}

#[test]
fn test_single_step_outside_program_mode() {
    let mut r = Runtime::default();
    program(&mut r, &["LBL \"A\"", "2", "3", "+"]);
    r.enter("GTO \"A\"");
    for _ in 0..3 {
        r.enter("SST");
        assert_eq!(run(&mut r), "");
    }
    assert_eq!(x(&r), 3.0);
    r.enter("SST");
    assert_eq!(x(&r), 5.0);
    assert!(!r.is_running());
}

#[test]
fn test_trace_prints_each_line() {
    use crate::mach::Shell;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Paper(Rc<RefCell<Vec<String>>>);
    impl Shell for Paper {
        fn blit(&mut self, _: &[u8], _: usize, _: usize, _: usize, _: usize, _: usize) {}
        fn repaint(&mut self, _: &[u8]) {}
        fn print_lines(&mut self, bytes: &[u8], _: bool) {
            self.0.borrow_mut().push(String::from_utf8_lossy(bytes).into_owned());
        }
    }

    let paper = Rc::new(RefCell::new(vec![]));
    let mut r = Runtime::new(Box::new(Paper(paper.clone())));
    program(&mut r, &["LBL \"A\"", "2", "RTN"]);
    r.enter("PRON");
    r.enter("TRACE");
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert!(paper.borrow().iter().any(|l| l.contains("2")));
    paper.borrow_mut().clear();
    r.enter("PRSTK");
    assert_eq!(paper.borrow().last().map(|s| s.as_str()), Some("X=2.0000"));
}
