//! Lenient numeric field reads.
//!
//! Senders encode numbers as JSON integers, floats or strings, sometimes
//! mixed within one message. Every read accepts all three. Integer targets
//! truncate floats and saturate at the type bounds (unsigned targets clamp
//! negatives to 0). A string that is not a number reads as 0. Booleans,
//! null, arrays and objects are not numbers: the field keeps its default.

use serde_json::{Map, Value};

enum Scalar {
    Int(i128),
    Float(f64),
    Unparsable,
}

fn scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::Number(n) => Some(
            n.as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from))
                .map(Scalar::Int)
                .unwrap_or_else(|| Scalar::Float(n.as_f64().unwrap_or_default())),
        ),
        Value::String(s) => {
            let s = s.trim();
            Some(match s.parse::<i128>() {
                Ok(i) => Scalar::Int(i),
                Err(_) => match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => Scalar::Float(f),
                    _ => Scalar::Unparsable,
                },
            })
        }
        _ => None,
    }
}

/// Numeric type readable from a JSON member.
pub trait FromJsonNumber: Sized + Default {
    /// Convert, or `None` if the value is not numeric at all.
    fn from_json(value: &Value) -> Option<Self>;
}

macro_rules! integer_from_json {
    ($($ty:ty),*) => {$(
        impl FromJsonNumber for $ty {
            fn from_json(value: &Value) -> Option<Self> {
                let wide = match scalar(value)? {
                    Scalar::Int(i) => i,
                    // `as` saturates and maps NaN to 0.
                    Scalar::Float(f) => f.trunc() as i128,
                    Scalar::Unparsable => 0,
                };
                Some(wide.clamp(i128::from(<$ty>::MIN), i128::from(<$ty>::MAX)) as $ty)
            }
        }
    )*};
}

integer_from_json!(u8, u16, u32, i16);

impl FromJsonNumber for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        Some(match scalar(value)? {
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
            Scalar::Unparsable => 0.0,
        })
    }
}

impl FromJsonNumber for f32 {
    fn from_json(value: &Value) -> Option<Self> {
        f64::from_json(value).map(|v| v as f32)
    }
}

/// Typed reads over one JSON object.
#[derive(Clone, Copy)]
pub struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    /// Wrap an object.
    pub fn new(obj: &'a Map<String, Value>) -> Self {
        Self(obj)
    }

    /// Read `name`, defaulting to zero when absent or non-numeric.
    pub fn get<T: FromJsonNumber>(&self, name: &str) -> T {
        self.0
            .get(name)
            .and_then(T::from_json)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unsigned_clamps_and_saturates() {
        let obj = fields(json!({
            "neg": -5, "big": 70000, "float": 12.9, "text": "300", "huge": u64::MAX
        }));
        let f = Fields::new(&obj);
        assert_eq!(f.get::<u16>("neg"), 0);
        assert_eq!(f.get::<u16>("big"), u16::MAX);
        assert_eq!(f.get::<u8>("float"), 12);
        assert_eq!(f.get::<u8>("text"), u8::MAX);
        assert_eq!(f.get::<u16>("text"), 300);
        assert_eq!(f.get::<u32>("huge"), u32::MAX);
    }

    #[test]
    fn signed_saturates_both_ends() {
        let obj = fields(json!({"lo": -40000, "hi": "40000", "mid": -12.7}));
        let f = Fields::new(&obj);
        assert_eq!(f.get::<i16>("lo"), i16::MIN);
        assert_eq!(f.get::<i16>("hi"), i16::MAX);
        assert_eq!(f.get::<i16>("mid"), -12);
    }

    #[test]
    fn floats_accept_all_encodings() {
        let obj = fields(json!({"i": 3, "f": 1.25, "s": " 2.5 ", "e": "1e3"}));
        let f = Fields::new(&obj);
        assert_eq!(f.get::<f64>("i"), 3.0);
        assert_eq!(f.get::<f64>("f"), 1.25);
        assert_eq!(f.get::<f32>("s"), 2.5);
        assert_eq!(f.get::<f64>("e"), 1000.0);
    }

    #[test]
    fn string_integers_fall_back_to_float_parse() {
        let obj = fields(json!({"s": "7.9"}));
        assert_eq!(Fields::new(&obj).get::<u32>("s"), 7);
    }

    #[test]
    fn unparsable_string_reads_zero_non_numbers_keep_default() {
        let obj = fields(json!({"s": "abc", "b": true, "n": null, "a": [1]}));
        let f = Fields::new(&obj);
        assert_eq!(f.get::<u16>("s"), 0);
        assert_eq!(f.get::<f64>("s"), 0.0);
        assert_eq!(f.get::<u16>("b"), 0);
        assert_eq!(f.get::<u16>("n"), 0);
        assert_eq!(f.get::<f32>("a"), 0.0);
        assert_eq!(f.get::<u8>("missing"), 0);
    }
}
