//! Built-in `invoke_functions` module: the arithmetic, comparison,
//! logical, and container primitives available to configuration files.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::str::FromStr;

// Layer 2: Third-party crate imports
use serde_json::{Map, Number, Value};
use uuid::Uuid;

// Layer 3: Internal module imports
use super::error::ExpressionError;
use super::invoke::{InvokeFn, InvokeModule};

/// Truthiness rules shared by filters, `if_else`, and the logical
/// operators: null, false, zero, and empty containers/strings are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Target type of an `evaluate_expression(<expr>, <type>)` coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionType {
    Int,
    Float,
    Bool,
    Str,
    List,
    Dict,
}

impl FromStr for CoercionType {
    type Err = ExpressionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "str" => Ok(Self::Str),
            "list" => Ok(Self::List),
            "dict" => Ok(Self::Dict),
            other => Err(ExpressionError::TypeMismatch {
                expected: "int|float|bool|str|list|dict",
                found: other.to_string(),
            }),
        }
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Coerce an evaluated value to the requested type.
pub fn coerce_value(value: Value, target: CoercionType) -> Result<Value, ExpressionError> {
    match target {
        CoercionType::Int => match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::from)
                .ok_or(ExpressionError::TypeMismatch {
                    expected: "int",
                    found: type_name(&value),
                }),
            Value::String(s) => {
                s.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| ExpressionError::TypeMismatch {
                        expected: "int",
                        found: format!("string \"{s}\""),
                    })
            }
            Value::Bool(b) => Ok(Value::from(i64::from(*b))),
            _ => Err(ExpressionError::TypeMismatch {
                expected: "int",
                found: type_name(&value),
            }),
        },
        CoercionType::Float => match &value {
            Value::Number(n) => {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or(ExpressionError::TypeMismatch {
                        expected: "float",
                        found: type_name(&value),
                    })
            }
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ExpressionError::TypeMismatch {
                    expected: "float",
                    found: format!("string \"{s}\""),
                }),
            _ => Err(ExpressionError::TypeMismatch {
                expected: "float",
                found: type_name(&value),
            }),
        },
        CoercionType::Bool => Ok(Value::Bool(is_truthy(&value))),
        CoercionType::Str => Ok(Value::String(stringify(&value))),
        CoercionType::List => match value {
            Value::Array(_) => Ok(value),
            Value::Null => Ok(Value::Array(Vec::new())),
            other => Err(ExpressionError::TypeMismatch {
                expected: "list",
                found: type_name(&other),
            }),
        },
        CoercionType::Dict => match value {
            Value::Object(_) => Ok(value),
            other => Err(ExpressionError::TypeMismatch {
                expected: "dict",
                found: type_name(&other),
            }),
        },
    }
}

/// Render a value as display text: strings verbatim, null empty, anything
/// else compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric equality is value-based (`1 == 1.0`); everything else is
/// structural.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn arity_error(function: &'static str, expected: usize, got: usize) -> ExpressionError {
    ExpressionError::Function {
        module: MODULE_NAME.to_string(),
        function: function.to_string(),
        reason: format!("expected {expected} positional arguments, got {got}"),
    }
}

fn args2<'v>(
    function: &'static str,
    args: &'v [Value],
) -> Result<(&'v Value, &'v Value), ExpressionError> {
    match args {
        [a, b] => Ok((a, b)),
        other => Err(arity_error(function, 2, other.len())),
    }
}

fn args1<'v>(function: &'static str, args: &'v [Value]) -> Result<&'v Value, ExpressionError> {
    match args {
        [a] => Ok(a),
        other => Err(arity_error(function, 1, other.len())),
    }
}

fn numeric_pair(
    function: &'static str,
    a: &Value,
    b: &Value,
) -> Result<(f64, f64, bool), ExpressionError> {
    let ints = a.is_i64() && b.is_i64();
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok((x, y, ints)),
        _ => Err(ExpressionError::Function {
            module: MODULE_NAME.to_string(),
            function: function.to_string(),
            reason: format!("expected numbers, got {} and {}", type_name(a), type_name(b)),
        }),
    }
}

fn number_value(function: &'static str, result: f64, as_int: bool) -> Result<Value, ExpressionError> {
    if as_int && result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        return Ok(Value::from(result as i64));
    }
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::Function {
            module: MODULE_NAME.to_string(),
            function: function.to_string(),
            reason: "result is not a representable number".to_string(),
        })
}

fn add(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("add", args)?;
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(Value::String(format!("{x}{y}"))),
        (Value::Array(x), Value::Array(y)) => {
            let mut combined = x.clone();
            combined.extend(y.iter().cloned());
            Ok(Value::Array(combined))
        }
        _ => {
            let (x, y, ints) = numeric_pair("add", a, b)?;
            number_value("add", x + y, ints)
        }
    }
}

fn subtract(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("subtract", args)?;
    let (x, y, ints) = numeric_pair("subtract", a, b)?;
    number_value("subtract", x - y, ints)
}

fn multiply(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("multiply", args)?;
    let (x, y, ints) = numeric_pair("multiply", a, b)?;
    number_value("multiply", x * y, ints)
}

fn divide(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("divide", args)?;
    let (x, y, _) = numeric_pair("divide", a, b)?;
    if y == 0.0 {
        return Err(ExpressionError::Function {
            module: MODULE_NAME.to_string(),
            function: "divide".to_string(),
            reason: "division by zero".to_string(),
        });
    }
    number_value("divide", x / y, false)
}

fn modulus(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("modulus", args)?;
    let (x, y, ints) = numeric_pair("modulus", a, b)?;
    if y == 0.0 {
        return Err(ExpressionError::Function {
            module: MODULE_NAME.to_string(),
            function: "modulus".to_string(),
            reason: "division by zero".to_string(),
        });
    }
    number_value("modulus", x % y, ints)
}

fn power(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("power", args)?;
    let (x, y, ints) = numeric_pair("power", a, b)?;
    number_value("power", x.powf(y), ints && y >= 0.0)
}

fn equal(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("equal", args)?;
    Ok(Value::Bool(loose_eq(a, b)))
}

fn not_equal(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("not_equal", args)?;
    Ok(Value::Bool(!loose_eq(a, b)))
}

fn compare(
    function: &'static str,
    args: &[Value],
    cmp: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, ExpressionError> {
    let (a, b) = args2(function, args)?;
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(Value::Bool(cmp(x.cmp(y)))),
        _ => {
            let (x, y, _) = numeric_pair(function, a, b)?;
            let ordering = x
                .partial_cmp(&y)
                .ok_or_else(|| ExpressionError::Function {
                    module: MODULE_NAME.to_string(),
                    function: function.to_string(),
                    reason: "values are not comparable".to_string(),
                })?;
            Ok(Value::Bool(cmp(ordering)))
        }
    }
}

fn greater_than(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    compare("greater_than", args, std::cmp::Ordering::is_gt)
}

fn less_than(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    compare("less_than", args, std::cmp::Ordering::is_lt)
}

fn greater_than_or_equal(
    args: &[Value],
    _kw: &Map<String, Value>,
) -> Result<Value, ExpressionError> {
    compare("greater_than_or_equal", args, std::cmp::Ordering::is_ge)
}

fn less_than_or_equal(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    compare("less_than_or_equal", args, std::cmp::Ordering::is_le)
}

fn and_op(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("and_op", args)?;
    Ok(if is_truthy(a) { b.clone() } else { a.clone() })
}

fn or_op(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (a, b) = args2("or_op", args)?;
    Ok(if is_truthy(a) { a.clone() } else { b.clone() })
}

fn not_op(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let a = args1("not_op", args)?;
    Ok(Value::Bool(!is_truthy(a)))
}

fn in_op(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (needle, haystack) = args2("in_op", args)?;
    let found = match haystack {
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::String(text) => match needle {
            Value::String(sub) => text.contains(sub.as_str()),
            _ => false,
        },
        Value::Object(map) => match needle {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        _ => {
            return Err(ExpressionError::Function {
                module: MODULE_NAME.to_string(),
                function: "in_op".to_string(),
                reason: format!("cannot test membership in {}", type_name(haystack)),
            })
        }
    };
    Ok(Value::Bool(found))
}

fn append_fn(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let (list, item) = args2("append", args)?;
    match list {
        Value::Array(items) => {
            let mut extended = items.clone();
            extended.push(item.clone());
            Ok(Value::Array(extended))
        }
        Value::Null => Ok(Value::Array(vec![item.clone()])),
        other => Err(ExpressionError::Function {
            module: MODULE_NAME.to_string(),
            function: "append".to_string(),
            reason: format!("cannot append to {}", type_name(other)),
        }),
    }
}

fn negate(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let a = args1("negate", args)?;
    let as_int = a.is_i64();
    let x = a.as_f64().ok_or_else(|| ExpressionError::Function {
        module: MODULE_NAME.to_string(),
        function: "negate".to_string(),
        reason: format!("expected a number, got {}", type_name(a)),
    })?;
    number_value("negate", -x, as_int)
}

fn if_else(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    match args {
        [cond, then, otherwise] => Ok(if is_truthy(cond) {
            then.clone()
        } else {
            otherwise.clone()
        }),
        other => Err(arity_error("if_else", 3, other.len())),
    }
}

fn uuid_fn(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    if !args.is_empty() {
        return Err(arity_error("uuid", 0, args.len()));
    }
    Ok(Value::String(Uuid::new_v4().to_string()))
}

fn empty<const KIND: u8>(args: &[Value], _kw: &Map<String, Value>) -> Result<Value, ExpressionError> {
    if !args.is_empty() {
        return Err(arity_error("empty_*", 0, args.len()));
    }
    Ok(match KIND {
        0 => Value::Array(Vec::new()),
        1 => Value::Object(Map::new()),
        2 => Value::String(String::new()),
        3 => Value::from(0.0),
        _ => Value::from(0),
    })
}

/// Name the built-in module is registered under.
pub const MODULE_NAME: &str = "invoke_functions";

/// Build the built-in function module.
pub fn builtin_module() -> InvokeModule {
    let mut functions: HashMap<String, InvokeFn> = HashMap::new();
    let table: &[(&str, InvokeFn)] = &[
        ("add", add),
        ("subtract", subtract),
        ("multiply", multiply),
        ("divide", divide),
        ("modulus", modulus),
        ("power", power),
        ("equal", equal),
        ("not_equal", not_equal),
        ("greater_than", greater_than),
        ("less_than", less_than),
        ("greater_than_or_equal", greater_than_or_equal),
        ("less_than_or_equal", less_than_or_equal),
        ("and_op", and_op),
        ("or_op", or_op),
        ("not_op", not_op),
        ("in_op", in_op),
        ("append", append_fn),
        ("negate", negate),
        ("if_else", if_else),
        ("uuid", uuid_fn),
        ("empty_list", empty::<0>),
        ("empty_dict", empty::<1>),
        ("empty_string", empty::<2>),
        ("empty_set", empty::<0>),
        ("empty_tuple", empty::<0>),
        ("empty_float", empty::<3>),
        ("empty_int", empty::<4>),
    ];
    for (name, function) in table {
        functions.insert((*name).to_string(), *function);
    }
    InvokeModule::new(functions)
}
