//! Conversion between scalar values, dates, strings and enum members.
//!
//! Numeric conversions are range-checked; floating values truncate toward
//! zero when converted to integral kinds. Dates convert to and from strings
//! with a chrono format string and to and from `long` as epoch milliseconds.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use objmap_model::{EnumValue, ScalarKind, Schema, TypeRef, Value};

use crate::error::{ConversionError, Result};

/// Format used for dates when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats tried, in order, when parsing a date without a configured format.
const DATE_PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy)]
enum Number {
    Integral(i64),
    Floating(f64),
}

/// Scalar converter.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveConverter<'a> {
    schema: &'a Schema,
    date_format: Option<&'a str>,
}

impl<'a> PrimitiveConverter<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            date_format: None,
        }
    }

    pub fn with_date_format(mut self, format: Option<&'a str>) -> Self {
        self.date_format = format;
        self
    }

    /// Convert `value` to `target`.
    ///
    /// Null converts to null. `any` accepts the value unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when no conversion exists, the value is
    /// out of range, text does not parse, or an enum member is unknown.
    pub fn convert(&self, value: &Value, target: &TypeRef) -> Result<Value> {
        if value.is_null() || target.is_any() {
            return Ok(value.clone());
        }
        match target {
            TypeRef::Scalar(kind) => self.to_scalar(value, *kind, target),
            TypeRef::Enum(name) => self.to_enum(value, name),
            _ => Err(unsupported(value, target)),
        }
    }

    /// Text form of a scalar, date or enum value.
    pub fn to_text(&self, value: &Value) -> Result<String> {
        let text = match value {
            Value::Bool(b) => b.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Str(s) => s.clone(),
            Value::Date(d) => self.format_date(d)?,
            Value::Enum(e) => e.member.clone(),
            other => return Err(unsupported(other, &TypeRef::string())),
        };
        Ok(text)
    }

    fn format_date(&self, date: &NaiveDateTime) -> Result<String> {
        let format = self.date_format.unwrap_or(DEFAULT_DATE_FORMAT);
        let mut out = String::new();
        write!(out, "{}", date.format(format)).map_err(|_| ConversionError::Parse {
            value: format.to_string(),
            to: TypeRef::string(),
        })?;
        Ok(out)
    }

    fn parse_date(&self, text: &str) -> Result<NaiveDateTime> {
        let text = text.trim();
        let parsed = match self.date_format {
            Some(format) => NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
            None => DATE_PARSE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                }),
        };
        parsed.ok_or_else(|| ConversionError::Parse {
            value: text.to_string(),
            to: TypeRef::Scalar(ScalarKind::Date),
        })
    }

    fn to_scalar(&self, value: &Value, kind: ScalarKind, target: &TypeRef) -> Result<Value> {
        if value.runtime_type() == *target {
            return Ok(value.clone());
        }
        match kind {
            ScalarKind::String => self.to_text(value).map(Value::Str),
            ScalarKind::Bool => to_bool(value, target),
            ScalarKind::Char => to_char(value, target),
            ScalarKind::Date => match value {
                Value::Str(s) => self.parse_date(s).map(Value::Date),
                Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => number(value)
                    .and_then(integral)
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|d| Value::Date(d.naive_utc()))
                    .ok_or_else(|| out_of_range(value, target)),
                other => Err(unsupported(other, target)),
            },
            _ => {
                let n = match value {
                    Value::Str(s) => parse_number(s.trim(), kind, target)?,
                    Value::Date(d) => Number::Integral(d.and_utc().timestamp_millis()),
                    other => number(other).ok_or_else(|| unsupported(other, target))?,
                };
                numeric(n, kind).ok_or_else(|| out_of_range(value, target))
            }
        }
    }

    fn to_enum(&self, value: &Value, enum_name: &str) -> Result<Value> {
        let member = match value {
            Value::Enum(e) => e.member.as_str(),
            Value::Str(s) => s.as_str(),
            other => return Err(unsupported(other, &TypeRef::Enum(enum_name.to_string()))),
        };
        let known = self
            .schema
            .enum_def(enum_name)
            .is_some_and(|def| def.has_member(member));
        if known {
            Ok(Value::Enum(EnumValue::new(enum_name, member)))
        } else {
            Err(ConversionError::UnknownEnumMember {
                enum_name: enum_name.to_string(),
                member: member.to_string(),
            })
        }
    }
}

fn number(value: &Value) -> Option<Number> {
    let n = match value {
        Value::Byte(v) => Number::Integral(i64::from(*v)),
        Value::Short(v) => Number::Integral(i64::from(*v)),
        Value::Int(v) => Number::Integral(i64::from(*v)),
        Value::Long(v) => Number::Integral(*v),
        Value::Float(v) => Number::Floating(f64::from(*v)),
        Value::Double(v) => Number::Floating(*v),
        Value::Bool(b) => Number::Integral(i64::from(*b)),
        Value::Char(c) => Number::Integral(i64::from(u32::from(*c))),
        _ => return None,
    };
    Some(n)
}

fn parse_number(text: &str, kind: ScalarKind, target: &TypeRef) -> Result<Number> {
    let parse_error = || ConversionError::Parse {
        value: text.to_string(),
        to: target.clone(),
    };
    if kind.is_integral() {
        text.parse::<i64>().map(Number::Integral).map_err(|_| parse_error())
    } else {
        text.parse::<f64>().map(Number::Floating).map_err(|_| parse_error())
    }
}

fn integral(n: Number) -> Option<i64> {
    match n {
        Number::Integral(v) => Some(v),
        Number::Floating(f) => {
            let t = f.trunc();
            // i64::MAX is not representable as f64; the bound is exclusive.
            (t.is_finite() && t >= -9_223_372_036_854_775_808.0 && t < 9_223_372_036_854_775_808.0)
                .then_some(t as i64)
        }
    }
}

fn numeric(n: Number, kind: ScalarKind) -> Option<Value> {
    match kind {
        ScalarKind::Byte => integral(n).and_then(|v| i8::try_from(v).ok()).map(Value::Byte),
        ScalarKind::Short => integral(n).and_then(|v| i16::try_from(v).ok()).map(Value::Short),
        ScalarKind::Int => integral(n).and_then(|v| i32::try_from(v).ok()).map(Value::Int),
        ScalarKind::Long => integral(n).map(Value::Long),
        ScalarKind::Float => {
            let f = match n {
                Number::Integral(v) => v as f64,
                Number::Floating(f) => f,
            };
            let narrowed = f as f32;
            (narrowed.is_finite() || !f.is_finite()).then_some(Value::Float(narrowed))
        }
        ScalarKind::Double => Some(Value::Double(match n {
            Number::Integral(v) => v as f64,
            Number::Floating(f) => f,
        })),
        _ => None,
    }
}

fn to_bool(value: &Value, target: &TypeRef) -> Result<Value> {
    if let Value::Str(s) = value {
        return match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(ConversionError::Parse {
                value: s.clone(),
                to: target.clone(),
            }),
        };
    }
    match number(value).and_then(integral) {
        Some(0) => Ok(Value::Bool(false)),
        Some(1) => Ok(Value::Bool(true)),
        Some(_) => Err(out_of_range(value, target)),
        None => Err(unsupported(value, target)),
    }
}

fn to_char(value: &Value, target: &TypeRef) -> Result<Value> {
    if let Value::Str(s) = value {
        let mut chars = s.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Char(c)),
            _ => Err(ConversionError::Parse {
                value: s.clone(),
                to: target.clone(),
            }),
        };
    }
    let code = number(value)
        .and_then(integral)
        .ok_or_else(|| unsupported(value, target))?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| out_of_range(value, target))
}

fn render(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{s}'"),
        Value::Bool(b) => b.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::Short(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Char(c) => format!("'{c}'"),
        Value::Enum(e) => format!("{}.{}", e.type_name, e.member),
        other => format!("{other:?}"),
    }
}

fn unsupported(value: &Value, target: &TypeRef) -> ConversionError {
    ConversionError::Unsupported {
        value: render(value),
        from: value.runtime_type(),
        to: target.clone(),
    }
}

fn out_of_range(value: &Value, target: &TypeRef) -> ConversionError {
    ConversionError::OutOfRange {
        value: render(value),
        to: target.clone(),
    }
}

#[cfg(test)]
mod tests {
    use objmap_model::EnumDef;

    use super::*;

    fn ty(expr: &str) -> TypeRef {
        expr.parse().unwrap()
    }

    #[test]
    fn narrows_with_range_checks() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema);
        assert_eq!(conv.convert(&Value::Int(100), &ty("byte")).unwrap(), Value::Byte(100));
        let err = conv.convert(&Value::Int(300), &ty("byte")).unwrap_err();
        insta::assert_snapshot!(err, @"Value 300 is out of range for byte");
    }

    #[test]
    fn floats_truncate_toward_zero() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema);
        assert_eq!(conv.convert(&Value::Double(-2.9), &ty("int")).unwrap(), Value::Int(-2));
        assert!(conv.convert(&Value::Double(f64::NAN), &ty("long")).is_err());
    }

    #[test]
    fn parses_booleans_leniently() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema);
        for (text, expected) in [("Yes", true), (" on ", true), ("0", false), ("N", false)] {
            assert_eq!(
                conv.convert(&Value::from(text), &ty("bool")).unwrap(),
                Value::Bool(expected),
                "{text}"
            );
        }
        assert!(conv.convert(&Value::from("maybe"), &ty("bool")).is_err());
    }

    #[test]
    fn dates_use_configured_format() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema).with_date_format(Some("%d/%m/%Y"));
        let date = conv.convert(&Value::from("05/03/2024"), &ty("date")).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(date, Value::Date(expected));
        assert_eq!(conv.convert(&date, &ty("string")).unwrap(), Value::from("05/03/2024"));
    }

    #[test]
    fn dates_round_trip_epoch_millis() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema);
        let date = conv.convert(&Value::from("2024-03-05T10:15:30"), &ty("date")).unwrap();
        let millis = conv.convert(&date, &ty("long")).unwrap();
        assert_eq!(millis, Value::Long(1_709_633_730_000));
        assert_eq!(conv.convert(&millis, &ty("date")).unwrap(), date);
    }

    #[test]
    fn enums_convert_by_member_name() {
        let schema = Schema::new().with_enum(EnumDef::new("Colour", ["RED", "GREEN"]));
        let conv = PrimitiveConverter::new(&schema);
        let red = conv.convert(&Value::from("RED"), &TypeRef::enumeration("Colour")).unwrap();
        assert_eq!(red, Value::Enum(EnumValue::new("Colour", "RED")));
        assert_eq!(conv.convert(&red, &ty("string")).unwrap(), Value::from("RED"));

        let err = conv
            .convert(&Value::from("BLUE"), &TypeRef::enumeration("Colour"))
            .unwrap_err();
        insta::assert_snapshot!(err, @"'BLUE' is not a member of enum Colour");
    }

    #[test]
    fn null_stays_null() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema);
        assert_eq!(conv.convert(&Value::Null, &ty("int")).unwrap(), Value::Null);
    }

    #[test]
    fn objects_are_not_scalars() {
        let schema = Schema::new();
        let conv = PrimitiveConverter::new(&schema);
        let err = conv
            .convert(&Value::List(vec![]), &ty("int"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported { .. }));
    }
}
