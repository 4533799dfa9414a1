//! C `printf` rendering of decoded values.

use super::format::{Conversion, FormatFlags, Spec};
use core::ffi::{c_int, c_long, c_uint, c_ulong};
use rtapi_common::error::{RtapiError, RtapiResult};

/// Value read back from a stash buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Stored as native `int`.
    Int(i64),
    /// Stored as native `long`.
    Long(i64),
    /// Stored as `double`.
    Float(f64),
    /// Stored as a NUL-terminated string.
    Str(&'a str),
}

/// Append the text for one conversion to `out`.
pub fn conversion(out: &mut String, spec: &Spec, value: Value<'_>) -> RtapiResult<()> {
    let mismatch = RtapiError::InvalidFormat {
        offset: spec.offset,
        reason: "argument type does not match conversion",
    };
    match (spec.conv, value) {
        (Conversion::Char, Value::Int(v) | Value::Long(v)) => {
            let mut buf = [0u8; 4];
            let body = char::from(v as u8).encode_utf8(&mut buf);
            pad(out, spec, "", "", body, false);
        }
        (Conversion::Signed, Value::Int(v) | Value::Long(v)) => {
            integer(out, spec, v < 0, v.unsigned_abs());
        }
        (
            Conversion::Unsigned | Conversion::Hex | Conversion::HexUpper | Conversion::Pointer,
            Value::Int(_) | Value::Long(_),
        ) => integer(out, spec, false, unsigned(value)),
        (
            Conversion::Exp { .. } | Conversion::Fixed { .. } | Conversion::General { .. },
            Value::Float(v),
        ) => float(out, spec, v),
        (Conversion::Str, Value::Str(s)) => {
            let s = match spec.precision {
                Some(p) if p < s.len() => &s[..floor_char_boundary(s, p)],
                _ => s,
            };
            pad(out, spec, "", "", s, false);
        }
        _ => return Err(mismatch),
    }
    Ok(())
}

fn unsigned(value: Value<'_>) -> u64 {
    match value {
        Value::Int(v) => u64::from(v as c_int as c_uint),
        Value::Long(v) => v as c_long as c_ulong as u64,
        _ => 0,
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn sign(spec: &Spec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.flags.contains(FormatFlags::PLUS) {
        "+"
    } else if spec.flags.contains(FormatFlags::SPACE) {
        " "
    } else {
        ""
    }
}

fn integer(out: &mut String, spec: &Spec, negative: bool, magnitude: u64) {
    if spec.conv == Conversion::Pointer && magnitude == 0 {
        pad(out, spec, "", "", "(nil)", false);
        return;
    }

    let mut digits = match spec.conv {
        Conversion::Hex | Conversion::Pointer => format!("{magnitude:x}"),
        Conversion::HexUpper => format!("{magnitude:X}"),
        _ => magnitude.to_string(),
    };
    if let Some(p) = spec.precision {
        if p == 0 && magnitude == 0 {
            digits.clear();
        } else if digits.len() < p {
            digits.insert_str(0, &"0".repeat(p - digits.len()));
        }
    }

    let alt = spec.flags.contains(FormatFlags::ALT) && magnitude != 0;
    let prefix = match spec.conv {
        Conversion::Pointer => "0x",
        Conversion::Hex if alt => "0x",
        Conversion::HexUpper if alt => "0X",
        _ => "",
    };
    let sign = match spec.conv {
        Conversion::Signed | Conversion::Pointer => sign(spec, negative),
        _ => "",
    };
    pad(out, spec, sign, prefix, &digits, spec.precision.is_none());
}

fn float(out: &mut String, spec: &Spec, v: f64) {
    let upper = matches!(
        spec.conv,
        Conversion::Exp { upper: true } | Conversion::Fixed { upper: true } | Conversion::General { upper: true }
    );
    let sign = sign(spec, v.is_sign_negative());

    if !v.is_finite() {
        let body = match (v.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        pad(out, spec, sign, "", body, false);
        return;
    }

    let a = v.abs();
    let prec = spec.precision.unwrap_or(6);
    let alt = spec.flags.contains(FormatFlags::ALT);
    let body = match spec.conv {
        Conversion::Fixed { .. } => fixed(a, prec, alt),
        Conversion::Exp { .. } => exponent(a, prec, alt, upper),
        _ => general(a, prec, alt, upper),
    };
    pad(out, spec, sign, "", &body, true);
}

fn fixed(a: f64, prec: usize, alt: bool) -> String {
    let mut s = format!("{:.*}", prec, a);
    if alt && prec == 0 {
        s.push('.');
    }
    s
}

/// Split Rust's `1.5e3` notation into mantissa and decimal exponent.
fn scientific(a: f64, prec: usize) -> (String, i32) {
    let s = format!("{:.*e}", prec, a);
    match s.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_owned(), exp.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn exponent(a: f64, prec: usize, alt: bool, upper: bool) -> String {
    let (mut body, exp) = scientific(a, prec);
    if alt && !body.contains('.') {
        body.push('.');
    }
    body.push(if upper { 'E' } else { 'e' });
    body.push(if exp < 0 { '-' } else { '+' });
    body.push_str(&format!("{:02}", exp.unsigned_abs()));
    body
}

/// `%g`: `%e` when the exponent is below -4 or at least the precision,
/// `%f` otherwise, trailing zeros removed unless `#`.
fn general(a: f64, prec: usize, alt: bool, upper: bool) -> String {
    let p = prec.max(1);
    let x = if a == 0.0 { 0 } else { scientific(a, p - 1).1 };
    let mut body = if x >= -4 && (x as i64) < p as i64 {
        fixed(a, (p as i64 - 1 - x as i64) as usize, alt)
    } else {
        exponent(a, p - 1, alt, upper)
    };
    if !alt {
        strip_trailing_zeros(&mut body);
    }
    body
}

fn strip_trailing_zeros(body: &mut String) {
    let split = body.find(['e', 'E']).unwrap_or(body.len());
    let (mantissa, suffix) = body.split_at(split);
    if mantissa.contains('.') {
        let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
        *body = format!("{trimmed}{suffix}");
    }
}

/// Lay out `sign prefix body` in the field width.
fn pad(out: &mut String, spec: &Spec, sign: &str, prefix: &str, body: &str, zero_ok: bool) {
    let len = sign.len() + prefix.len() + body.len();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    let left = spec.flags.contains(FormatFlags::LEFT);
    let zero = zero_ok && !left && spec.flags.contains(FormatFlags::ZERO);

    if !left && !zero {
        out.extend(core::iter::repeat_n(' ', fill));
    }
    out.push_str(sign);
    out.push_str(prefix);
    if zero {
        out.extend(core::iter::repeat_n('0', fill));
    }
    out.push_str(body);
    if left {
        out.extend(core::iter::repeat_n(' ', fill));
    }
}
