//! Textual rendering of values for the print and conversion opcodes

/// `%d`
pub fn int_to_string(i: i32) -> String {
    i.to_string()
}

fn non_finite(f: f64) -> Option<&'static str> {
    if f.is_nan() {
        Some("nan")
    } else if f == f64::INFINITY {
        Some("inf")
    } else if f == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

/// `%f`: six decimals, used by `FPRINT`
pub fn float_to_print(f: f32) -> String {
    let f = f as f64;
    match non_finite(f) {
        Some(s) => s.to_string(),
        None => format!("{:.6}", f),
    }
}

/// `%1.2f`: two decimals, used by `F2S` and vector rendering
pub fn float_to_string(f: f64) -> String {
    match non_finite(f) {
        Some(s) => s.to_string(),
        None => format!("{:.2}", f),
    }
}

/// `true` / `false`
pub fn bool_to_string(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

/// `[e0, e1, ...]` with two decimals per element
pub fn vector_to_string(elements: &[f64]) -> String {
    let mut out = String::with_capacity(2 + elements.len() * 6);
    out.push('[');
    for (i, e) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&float_to_string(*e));
    }
    out.push(']');
    out
}
