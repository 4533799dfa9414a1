//! Integration test: buffer and stashf round trips.
//!
//! Validates: typed values read back bit-identical in write order; a
//! failed write leaves the cursor where it was; decoded text matches what
//! the C library's `snprintf` renders for the same format and values.

use proptest::prelude::*;
use rtapi_common::error::RtapiError;
use rtapi_core::buffer::Buffer;
use rtapi_core::stashf::{self, Arg, NoTranslation};
use std::ffi::CString;

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Field {
    Byte(u8),
    Int(i32),
    Long(i64),
    F32(f32),
    F64(f64),
    Str(String),
}

fn field() -> impl Strategy<Value = Field> {
    prop_oneof![
        any::<u8>().prop_map(Field::Byte),
        any::<i32>().prop_map(Field::Int),
        any::<i64>().prop_map(Field::Long),
        any::<f32>().prop_map(Field::F32),
        any::<f64>().prop_map(Field::F64),
        "[a-zA-Z0-9 _.-]{0,24}".prop_map(Field::Str),
    ]
}

fn stashed(format: &str, args: &[Arg<'_>]) -> String {
    let mut buf = Buffer::new(512);
    stashf::encode(&mut buf.cursor_mut(), format, args).unwrap();
    stashf::decode(&mut buf.cursor(), &NoTranslation).unwrap()
}

/// Render through the C library.
fn c_format(format: &str, render: impl FnOnce(*mut libc::c_char, usize, *const libc::c_char) -> libc::c_int) -> String {
    let fmt = CString::new(format).unwrap();
    let mut out = [0u8; 512];
    let n = render(out.as_mut_ptr().cast(), out.len(), fmt.as_ptr());
    assert!(n >= 0 && (n as usize) < out.len());
    String::from_utf8(out[..n as usize].to_vec()).unwrap()
}

fn c_int(format: &str, v: libc::c_int) -> String {
    c_format(format, |out, len, fmt| unsafe { libc::snprintf(out, len, fmt, v) })
}

fn c_long(format: &str, v: libc::c_long) -> String {
    c_format(format, |out, len, fmt| unsafe { libc::snprintf(out, len, fmt, v) })
}

fn c_double(format: &str, v: libc::c_double) -> String {
    c_format(format, |out, len, fmt| unsafe { libc::snprintf(out, len, fmt, v) })
}

fn c_str(format: &str, s: &str) -> String {
    let s = CString::new(s).unwrap();
    c_format(format, |out, len, fmt| unsafe { libc::snprintf(out, len, fmt, s.as_ptr()) })
}

const INT_FORMATS: &[&str] = &[
    "%d", "%i", "%5d", "%-7d|", "%+d", "% d", "%08d", "%.4d", "%-+6.3d|", "%u", "%x", "%X",
    "%#x", "%#10X", "%010x", "%.0d", "%c",
];

const LONG_FORMATS: &[&str] = &["%ld", "%li", "%20ld", "%-+21ld|", "%lu", "%lx", "%#lX", "%.12ld"];

// Precision stays small enough that the digits printed are exact in both
// implementations; random inputs make exact rounding ties vanishingly rare.
const FLOAT_FORMATS: &[&str] = &[
    "%f", "%.0f", "%.3f", "%12.4f", "%-12.2f|", "%+f", "%012.3f", "%e", "%.2e", "%E", "%+.4E",
    "%g", "%.3g", "%10.5g", "%G", "%#g", "%#.0f", "%#.0e",
];

const STR_FORMATS: &[&str] = &["%s", "%10s", "%-10s|", "%.3s", "%8.2s"];

// ── Properties ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn buffer_reads_back_what_was_written(fields in prop::collection::vec(field(), 0..32)) {
        let mut buf = Buffer::new(2048);
        {
            let mut w = buf.cursor_mut();
            for f in &fields {
                match f {
                    Field::Byte(v) => w.put_u8(*v).unwrap(),
                    Field::Int(v) => w.put_int(*v).unwrap(),
                    Field::Long(v) => w.put_long(*v as libc::c_long).unwrap(),
                    Field::F32(v) => w.put_f32(*v).unwrap(),
                    Field::F64(v) => w.put_f64(*v).unwrap(),
                    Field::Str(s) => w.put_str(s.as_str()).unwrap(),
                }
            }
        }

        let mut r = buf.cursor();
        for f in &fields {
            match f {
                Field::Byte(v) => prop_assert_eq!(r.get_u8().unwrap(), *v),
                Field::Int(v) => prop_assert_eq!(r.get_int().unwrap(), *v),
                Field::Long(v) => prop_assert_eq!(r.get_long().unwrap(), *v as libc::c_long),
                Field::F32(v) => prop_assert_eq!(r.get_f32().unwrap().to_bits(), v.to_bits()),
                Field::F64(v) => prop_assert_eq!(r.get_f64().unwrap().to_bits(), v.to_bits()),
                Field::Str(s) => prop_assert_eq!(r.get_str().unwrap(), s.as_bytes()),
            }
        }
    }

    #[test]
    fn short_write_leaves_offset(capacity in 0usize..16, fill in 0usize..16, v in any::<f64>()) {
        let mut buf = Buffer::new(capacity);
        let mut w = buf.cursor_mut();
        let fill = fill.min(capacity);
        for _ in 0..fill {
            w.put_u8(0xAA).unwrap();
        }
        let before = w.position();
        match w.put_f64(v) {
            Ok(()) => prop_assert!(before + 8 <= capacity),
            Err(RtapiError::OutOfSpace { needed, remaining }) => {
                prop_assert_eq!(needed, 8);
                prop_assert_eq!(remaining, capacity - before);
                prop_assert_eq!(w.position(), before);
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }

    #[test]
    fn int_conversions_match_libc(idx in 0..INT_FORMATS.len(), v in any::<i32>()) {
        let format = INT_FORMATS[idx];
        // %c of a non-ASCII byte is not valid UTF-8 on the C side.
        let v = if format == "%c" { v.rem_euclid(95) + 32 } else { v };
        prop_assert_eq!(stashed(format, &[v.into()]), c_int(format, v));
    }

    #[test]
    fn long_conversions_match_libc(idx in 0..LONG_FORMATS.len(), v in any::<i64>()) {
        let format = LONG_FORMATS[idx];
        prop_assert_eq!(stashed(format, &[v.into()]), c_long(format, v as libc::c_long));
    }

    #[test]
    fn float_conversions_match_libc(
        idx in 0..FLOAT_FORMATS.len(),
        v in prop_oneof![-1.0e6..1.0e6f64, -1.0e-3..1.0e-3f64, -1.0e30..1.0e30f64],
    ) {
        let format = FLOAT_FORMATS[idx];
        prop_assert_eq!(stashed(format, &[v.into()]), c_double(format, v));
    }

    #[test]
    fn string_conversions_match_libc(idx in 0..STR_FORMATS.len(), s in "[a-zA-Z0-9 ]{0,16}") {
        let format = STR_FORMATS[idx];
        prop_assert_eq!(stashed(format, &[s.as_str().into()]), c_str(format, &s));
    }

    #[test]
    fn mixed_record_keeps_literal_text(a in any::<i32>(), b in any::<i64>(), s in "[a-z]{1,8}") {
        let text = stashed("a=%d b=%ld s=%s 100%%", &[a.into(), b.into(), s.as_str().into()]);
        prop_assert_eq!(text, format!("a={a} b={b} s={s} 100%"));
    }
}

// ── Fixed Cases ─────────────────────────────────────────────────────

#[test]
fn pointer_matches_libc() {
    let value = 0x7ffd_1234_5678usize;
    let ptr = value as *const u8;
    assert_eq!(
        stashed("%p", &[ptr.into()]),
        c_format("%p", |out, len, fmt| unsafe { libc::snprintf(out, len, fmt, ptr) })
    );
    assert_eq!(stashed("%p", &[core::ptr::null::<u8>().into()]), "(nil)");
}

#[test]
fn special_floats_match_libc() {
    for v in [f64::INFINITY, f64::NEG_INFINITY, 0.0, -0.0, 1.0e-310] {
        for format in ["%f", "%e", "%g", "%E", "%8.3G"] {
            assert_eq!(stashed(format, &[v.into()]), c_double(format, v), "{format} of {v}");
        }
    }
}

#[test]
fn scenario_x_y() {
    assert_eq!(stashed("x=%d y=%s", &[42.into(), "ok".into()]), "x=42 y=ok");
}
