//! EXPLAIN rendering of a primitive tree

use super::primitive::{Primitive, PrimitiveDescription};

/// Describes `primitive` and, recursively, all of its inputs
pub fn describe(primitive: &dyn Primitive) -> PrimitiveDescription {
    let mut desc = primitive.description();
    desc.inputs = primitive.inputs().into_iter().map(describe).collect();
    desc
}

/// Renders the tree as indented text, one primitive per line
pub fn render_text(desc: &PrimitiveDescription) -> String {
    let mut out = String::new();
    render_into(desc, 0, &mut out);
    out
}

fn render_into(desc: &PrimitiveDescription, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&desc.operator_type);
    if !desc.variant.is_empty() {
        out.push('.');
        out.push_str(&desc.variant);
    }
    if let Some(keyspace) = &desc.keyspace {
        out.push_str(" keyspace=");
        out.push_str(keyspace);
    }
    for (key, value) in &desc.other {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        out.push_str(&value.to_string());
    }
    out.push('\n');
    for input in &desc.inputs {
        render_into(input, depth + 1, out);
    }
}
