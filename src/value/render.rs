//! Canonical textual rendering of values, as specified by `spec.md` §6's
//! "Value output format" table.

use super::{Data, Value};

pub(super) fn render(value: &Value) -> String {
    match &value.data {
        Data::Bool(b) => if *b { "true".to_string() } else { "false".to_string() },
        Data::Int(i) => i.to_string(),
        Data::Rat(r) => format!("{}/{}", r.numer(), r.denom()),
        Data::Float(f) => render_float(*f),
        Data::Str(s) => render_string(s),
        Data::List(list) => {
            let elems: Vec<String> = list.borrow().iter().map(render).collect();
            format!("[{}]", elems.join(", "))
        }
        Data::Stream(_) => "<stream>".to_string(),
        Data::Ref(r) => {
            if r.has_sub() {
                format!("ref:{}.{}", r.name, r.sub)
            } else {
                format!("ref:{}", r.name)
            }
        }
        Data::Err(e) => format!("Error: {}", e.message),
        Data::Opaque(o) => o.borrow().render(),
    }
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Inf".to_string() } else { "-Inf".to_string() }
    } else {
        // Rust's f64 Display already produces the shortest round-trip
        // decimal representation.
        format!("{}", f)
    }
}

fn render_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
