//! Type mapping between domain values and protocol metric values.
//!
//! Pure functions, no state. Kind resolution guards against upstream
//! metadata bugs: a literal value whose own type is unambiguous wins over
//! whatever kind the event asserted.

use crate::metric::{MetricMember, MetricValue};
use crate::value::{ValueKind, VarValue};

/// Resolve the effective kind of a variable from its declared kind and
/// the literal value actually observed.
///
/// A numeric literal resolves to `Number` and a boolean literal to
/// `Boolean` regardless of the declaration; structured literals are
/// always `Structured`. A text literal keeps a `Text` declaration and
/// otherwise resolves to `Text`, since it cannot be represented under
/// any other kind.
pub fn effective_kind(declared: ValueKind, value: &VarValue) -> ValueKind {
    let literal = value.kind();
    if literal == declared { declared } else { literal }
}

/// Convert a domain value into its protocol primitive representation.
///
/// Structured values are not handled here; the template decomposer owns
/// composite conversion. A structured value passed anyway degrades to
/// `Null` rather than panicking.
pub fn to_metric_value(value: &VarValue) -> MetricValue {
    match value {
        VarValue::Number(n) => MetricValue::Number(*n),
        VarValue::Boolean(b) => MetricValue::Boolean(*b),
        VarValue::Text(s) => MetricValue::Text(s.clone()),
        VarValue::Structured(_) => MetricValue::Null,
    }
}

/// Inverse conversion: protocol primitive back to a domain value.
///
/// `kind` is the variable's declared kind when known. When it is absent
/// (unknown variable), the payload's own runtime shape decides.
pub fn from_metric_value(kind: Option<ValueKind>, value: &MetricValue) -> Option<VarValue> {
    match value {
        MetricValue::Number(n) => Some(coerce_number(kind, *n)),
        MetricValue::Boolean(b) => Some(VarValue::Boolean(*b)),
        MetricValue::Text(s) => Some(coerce_text(kind, s)),
        MetricValue::Null | MetricValue::Template(_) => None,
    }
}

/// Numbers targeting a boolean variable are mapped to false/non-zero.
fn coerce_number(kind: Option<ValueKind>, n: f64) -> VarValue {
    match kind {
        Some(ValueKind::Boolean) => VarValue::Boolean(n != 0.0),
        Some(ValueKind::Text) => VarValue::Text(format_number(n)),
        _ => VarValue::Number(n),
    }
}

/// Text targeting a numeric or boolean variable is parsed when possible,
/// forwarded as text otherwise.
fn coerce_text(kind: Option<ValueKind>, s: &str) -> VarValue {
    match kind {
        Some(ValueKind::Number) => s
            .trim()
            .parse::<f64>()
            .map(VarValue::Number)
            .unwrap_or_else(|_| VarValue::Text(s.to_string())),
        Some(ValueKind::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => VarValue::Boolean(true),
            "false" | "off" | "0" => VarValue::Boolean(false),
            _ => VarValue::Text(s.to_string()),
        },
        _ => VarValue::Text(s.to_string()),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Convert a structured domain value's single member to a metric member,
/// using the template's declared member kind.
pub fn member_to_metric(name: &str, kind: ValueKind, value: Option<&VarValue>) -> MetricMember {
    match value {
        Some(v) => MetricMember::new(name, kind, to_metric_value(v)),
        // Missing members resolve to a null member value, never an error.
        None => MetricMember::new(name, kind, MetricValue::Null),
    }
}
