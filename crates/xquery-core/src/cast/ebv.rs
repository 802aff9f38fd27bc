use crate::error::Error;
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem};

use super::numeric;
use super::xml_helpers::string_like_value;

/// Effective boolean value of a sequence.
///
/// - `()` is false
/// - a sequence whose first item is a node is true
/// - a single boolean, string-like or numeric value follows its own rule
///   (empty string, zero and NaN are false)
/// - anything else raises `FORG0006`
pub fn effective_boolean_value<N: XdmNode>(seq: &[XdmItem<N>]) -> Result<bool, Error> {
    let Some(first) = seq.first() else {
        return Ok(false);
    };
    let atom = match first {
        XdmItem::Node(_) => return Ok(true),
        XdmItem::Atomic(a) => a,
    };
    if seq.len() > 1 {
        return Err(Error::ebv_undefined(format!(
            "effective boolean value is not defined for a sequence of {} atomic values",
            seq.len()
        )));
    }
    atomic_ebv(atom)
}

fn atomic_ebv(atom: &XdmAtomicValue) -> Result<bool, Error> {
    if let XdmAtomicValue::Boolean(b) = atom {
        return Ok(*b);
    }
    if let Some(s) = string_like_value(atom) {
        return Ok(!s.is_empty());
    }
    match atom {
        XdmAtomicValue::Double(d) => Ok(!d.is_nan() && *d != 0.0),
        XdmAtomicValue::Float(f) => Ok(!f.is_nan() && *f != 0.0),
        XdmAtomicValue::Decimal(d) => Ok(!d.is_zero()),
        other => match numeric::integer_value(other) {
            Some(i) => Ok(i != 0),
            None => Err(Error::ebv_undefined(format!(
                "effective boolean value is not defined for {}",
                other.atomic_type()
            ))),
        },
    }
}
