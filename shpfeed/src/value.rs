//! Conversion des valeurs dBase vers JSON

use serde_json::{Number, Value};
use shapefile::dbase::{FieldValue, Record};

use crate::types::Properties;

/// Convertit un enregistrement .dbf en attributs JSON
pub fn record_to_properties(record: Record) -> Properties {
    record
        .into_iter()
        .map(|(name, value)| (name, field_to_json(value)))
        .collect()
}

/// Convertit une valeur de champ dBase en valeur JSON
///
/// Les champs vides deviennent `null`, les chaînes sont nettoyées des
/// espaces de remplissage.
pub fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) => Value::String(s.trim_end().to_string()),
        FieldValue::Memo(s) => Value::String(s),
        FieldValue::Numeric(Some(n)) => float_to_json(n),
        FieldValue::Float(Some(f)) => float_to_json(f64::from(f)),
        FieldValue::Double(d) => float_to_json(d),
        FieldValue::Currency(c) => float_to_json(c),
        FieldValue::Integer(i) => Value::Number(Number::from(i)),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        FieldValue::Date(Some(d)) => {
            Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        _ => Value::Null,
    }
}

/// Les entiers restent des entiers JSON (les champs N du dBase sont des f64)
fn float_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
