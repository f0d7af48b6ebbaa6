use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// Object storage: string keys, iterated in sorted order.
pub type Map = BTreeMap<String, Value>;

/// A JSON value flowing through models, outputs and library calls.
///
/// Containers are reference counted. Cloning a value is O(1), and writing
/// into a nested location with [`Rc::make_mut`] copies only the containers on
/// the written path, so untouched siblings stay pointer-identical. Equality
/// checks use that identity as a fast path, which is what keeps
/// change detection cheap after a mutation.
///
/// # Type Preservation
///
/// Integers and floats are distinct variants, but compare numerically:
/// `Value::Integer(1) == Value::Float(1.0)`. `NaN` is equal to itself so that
/// equality stays reflexive and values can be used as hash keys.
///
/// # Examples
///
/// ```
/// use derivo::Value;
///
/// let items = Value::array(vec![Value::Integer(1), Value::from("two")]);
/// assert_eq!(items.len(), Some(2));
/// assert!(Value::object(Default::default()).is_truthy());
/// assert!(!Value::Integer(0).is_truthy());
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// JSON null
    #[default]
    Null,

    /// JSON boolean (true/false)
    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(Rc<str>),

    /// Ordered sequence of values
    Array(Rc<Vec<Value>>),

    /// Object with string keys
    Object(Rc<Map>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    pub fn object(map: Map) -> Self {
        Value::Object(Rc::new(map))
    }

    pub fn empty_array() -> Self {
        Value::array(Vec::new())
    }

    pub fn empty_object() -> Self {
        Value::object(Map::new())
    }

    /// Truthiness used by `filter`, `any`, `ternary`, `and`, `or` and `not`.
    ///
    /// `null`, `false`, zero, `NaN` and the empty string are falsy. Every
    /// container is truthy, empty or not.
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n != 0.0 && !n.is_nan(),
            Integer(n) => *n != 0,
            String(s) => !s.is_empty(),
            Array(_) | Object(_) => true,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer; floats only convert when they are whole and within
    /// `i64` range
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => whole_float(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Element or key count of a container
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns a human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Whether two values share the same allocation (or are the same scalar).
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn numbers_equal(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// 2^63, the first float past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Converts a float to the integer it denotes exactly, if any.
fn whole_float(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&n) {
        Some(n as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => numbers_equal(*a, *b),
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                whole_float(*b) == Some(*a)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => state.write_u8(0),
            Value::Boolean(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            // whole floats hash like the equal integer
            Value::Integer(_) | Value::Float(_) => {
                state.write_u8(2);
                match self.as_int() {
                    Some(n) => n.hash(state),
                    None => match self {
                        Value::Float(f) if f.is_nan() => state.write_u64(u64::MAX),
                        Value::Float(f) => f.to_bits().hash(state),
                        _ => {}
                    },
                }
            }
            Value::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::Array(items) => {
                state.write_u8(4);
                items.hash(state);
            }
            Value::Object(map) => {
                state.write_u8(5);
                map.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::convert::to_json(self.clone()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_numeric_equality_across_variants() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_eq!(hash_of(&Value::Integer(2)), hash_of(&Value::Float(2.0)));
        assert_ne!(Value::Integer(2), Value::Float(2.5));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_large_numbers_compare_exactly() {
        let wide = 1i64 << 53;
        assert_eq!(Value::Integer(wide), Value::Float(wide as f64));
        assert_ne!(Value::Integer(wide + 1), Value::Float(wide as f64));
        assert_ne!(Value::Integer(i64::MAX), Value::Float(9.3e18));
        assert_eq!(Value::Float(1e20).as_int(), None);
        assert_eq!(Value::Float(-9_223_372_036_854_775_808.0).as_int(), Some(i64::MIN));
        assert_ne!(hash_of(&Value::Float(1e20)), hash_of(&Value::Float(1e21)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
        assert!(Value::empty_array().is_truthy());
        assert!(Value::empty_object().is_truthy());
    }

    #[test]
    fn test_shared_containers_compare_by_identity_first() {
        let inner = Value::array(vec![Value::Integer(1)]);
        let a = Value::array(vec![inner.clone(), Value::Integer(2)]);
        let b = Value::array(vec![inner, Value::Integer(2)]);
        assert_eq!(a, b);
        assert!(a.clone().ptr_eq(&a));
        assert!(!a.ptr_eq(&b));
    }
}
