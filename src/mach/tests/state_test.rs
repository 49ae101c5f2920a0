use super::*;
use crate::mach::var::GLOBAL;
use std::io::Cursor;

/// Stopped inside a FUNC subroutine holding a local `L`.
fn suspended() -> Runtime {
    let mut r = Runtime::default();
    program(
        &mut r,
        &["LBL \"A\"", "XEQ \"B\"", "RTN", "LBL \"B\"", "FUNC 11", "5", "LSTO \"L\"", "STOP", "RTN"],
    );
    r.enter("3");
    r.enter("XEQ \"A\"");
    assert_eq!(run(&mut r), "");
    assert_eq!(r.rtn_depth(), 1);
    assert!(r.frames().last().unwrap().func);
    r
}

fn reload(runtime: &Runtime, version: u32) -> Runtime {
    let mut bytes = vec![];
    runtime.save_as(&mut bytes, version).unwrap();
    let mut back = Runtime::default();
    assert!(back.load(&mut Cursor::new(bytes), version).success, "v{}", version);
    back
}

fn var_l(runtime: &Runtime) -> (i32, u8) {
    let var = runtime.vars.iter().find(|v| v.name == b"L").unwrap();
    (var.level, var.flags)
}

fn has_func_package(runtime: &Runtime) -> bool {
    runtime.vars.iter().any(|v| v.name == b"\x02FUNC")
}

#[test]
fn test_layouts_without_levels_flatten_locals() {
    let r = suspended();
    assert_eq!(var_l(&r), (1, 0));
    assert!(has_func_package(&r));

    for &version in &[26, 30, 33] {
        let back = reload(&r, version);
        assert_eq!(var_l(&back), (GLOBAL, 0), "v{}", version);
        assert_eq!(real(&back, "L"), Some(5.0), "v{}", version);
        assert!(!has_func_package(&back), "v{}", version);
        assert_eq!(back.rtn_depth(), 1, "v{}", version);
        let frame = back.frames().last().unwrap();
        assert!(
            !frame.func && !frame.matedit && !frame.stack_lift_disable && !frame.stop,
            "v{}",
            version
        );
    }
}

#[test]
fn test_frame_flags_kept_from_42() {
    let r = suspended();
    let back = reload(&r, 42);
    assert_eq!(var_l(&back), (1, 0));
    assert!(has_func_package(&back));
    assert!(back.frames().last().unwrap().func);
}

#[test]
fn test_single_seed_before_pairs() {
    let mut r = Runtime::default();
    r.rng = (0x0123_4567_89AB_CDEF, 0xFEDC_BA98_7654_3211);

    let back = reload(&r, 26);
    let mut expected = Runtime::default();
    expected.seed((r.rng.1 >> 11) as f64 / (1u64 << 53) as f64);
    assert_eq!(back.rng, expected.rng);
    assert_ne!(back.rng, r.rng);

    for &version in &[30, 33, 42] {
        assert_eq!(reload(&r, version).rng, r.rng, "v{}", version);
    }
}
