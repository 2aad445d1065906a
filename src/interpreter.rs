//! The token interpreter: turns a token produced by the scanner into a
//! value. Pure — it never consumes input itself, and never suspends.
//!
//! Applies the checks from spec.md §4.4 in order: literal nil/true/false,
//! then the integer grammar, then the floating grammar, then the
//! symbol/keyword grammar. Numbers and symbols/keywords are recognized with
//! the regex-driven classifiers the spec calls for.

use std::sync::OnceLock;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use ordered_float::OrderedFloat;
use regex::Regex;

use crate::error::{ReadError, ReadErrorKind};
use crate::resolver::Resolver;
use crate::value::{Integer, Symbol, Value};

fn integer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<sign>[-+]?)(?:",
            r"(?P<zero>0)",
            r"|(?P<dec>[1-9][0-9]*)",
            r"|0[xX](?P<hex>[0-9A-Fa-f]+)",
            r"|0(?P<oct>[0-7]+)",
            r"|(?P<radix>[0-9]+)[rR](?P<radixdigits>[0-9A-Za-z]+)",
            r"|0(?P<badoct>[0-9]+)",
            r")(?P<big>N)?$"
        ))
        .unwrap()
    })
}

fn float_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<sign>[-+]?)(?P<int>[0-9]+)(?:\.(?P<frac>[0-9]*))?(?:[eE](?P<exp>[-+]?[0-9]+))?(?P<bigdec>M)?$",
        )
        .unwrap()
    })
}

fn symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<dcolon>::)?(?P<colon>:)?(?:(?P<ns>[^0-9/:][^/]*)/)?(?P<name>/|[^0-9/][^/]*)$",
        )
        .unwrap()
    })
}

/// Interpret a bare token (not a string/char/regexp literal, which have
/// their own readers) into a value.
pub(crate) fn interpret_token(
    token: &str,
    resolver: &dyn Resolver,
) -> Result<Value, ReadError> {
    match token {
        "nil" => return Ok(Value::Nil),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if let Some(value) = try_integer(token)? {
        return Ok(value);
    }
    if let Some(value) = try_float(token)? {
        return Ok(value);
    }
    try_symbol_or_keyword(token, resolver)
}

fn try_integer(token: &str) -> Result<Option<Value>, ReadError> {
    let Some(caps) = integer_regex().captures(token) else {
        return Ok(None);
    };

    if caps.name("badoct").is_some() {
        return Err(ReadError::new(ReadErrorKind::MalformedToken(
            token.to_string(),
        )));
    }

    let negative = caps.name("sign").map(|m| m.as_str()) == Some("-");
    let big_suffix = caps.name("big").is_some();

    let magnitude: BigInt = if caps.name("zero").is_some() {
        BigInt::from(0)
    } else if let Some(m) = caps.name("dec") {
        BigInt::parse_bytes(m.as_str().as_bytes(), 10).expect("regex guarantees decimal digits")
    } else if let Some(m) = caps.name("hex") {
        BigInt::parse_bytes(m.as_str().as_bytes(), 16).expect("regex guarantees hex digits")
    } else if let Some(m) = caps.name("oct") {
        BigInt::parse_bytes(m.as_str().as_bytes(), 8).expect("regex guarantees octal digits")
    } else if let (Some(radix), Some(digits)) = (caps.name("radix"), caps.name("radixdigits")) {
        let radix: u32 = radix.as_str().parse().map_err(|_| {
            ReadError::new(ReadErrorKind::MalformedToken(token.to_string()))
        })?;
        if !(2..=36).contains(&radix) {
            return Err(ReadError::new(ReadErrorKind::MalformedToken(
                token.to_string(),
            )));
        }
        BigInt::parse_bytes(digits.as_str().as_bytes(), radix).ok_or_else(|| {
            ReadError::new(ReadErrorKind::MalformedToken(token.to_string()))
        })?
    } else {
        return Err(ReadError::new(ReadErrorKind::MalformedToken(
            token.to_string(),
        )));
    };

    let magnitude = if negative { -magnitude } else { magnitude };

    if big_suffix {
        return Ok(Some(Value::Int(Integer::Big(magnitude))));
    }

    match magnitude.to_i64() {
        Some(small) => Ok(Some(Value::Int(Integer::Fixed(small)))),
        None => Ok(Some(Value::Int(Integer::Big(magnitude)))),
    }
}

fn try_float(token: &str) -> Result<Option<Value>, ReadError> {
    let Some(caps) = float_regex().captures(token) else {
        return Ok(None);
    };

    // An integer-shaped token (no '.', no exponent, no M) would already have
    // matched `try_integer`; reaching here means at least one of those is
    // present, or the token matched the float grammar but not the integer
    // grammar. Require a fractional part, exponent, or `M` suffix so plain
    // `123` never falls through to this branch in the first place.
    let has_frac = caps.name("frac").is_some();
    let has_exp = caps.name("exp").is_some();
    let has_bigdec = caps.name("bigdec").is_some();
    if !has_frac && !has_exp && !has_bigdec {
        return Ok(None);
    }

    if has_bigdec {
        return Err(ReadError::new(ReadErrorKind::BigDecimalUnsupported));
    }

    let rebuilt = format!(
        "{}{}{}{}",
        &caps["sign"],
        &caps["int"],
        caps.name("frac")
            .map(|m| format!(".{}", if m.as_str().is_empty() { "0" } else { m.as_str() }))
            .unwrap_or_default(),
        caps.name("exp")
            .map(|m| format!("e{}", m.as_str()))
            .unwrap_or_default(),
    );

    rebuilt
        .parse::<f64>()
        .map(|f| Some(Value::Float(OrderedFloat(f))))
        .map_err(|_| ReadError::new(ReadErrorKind::MalformedToken(token.to_string())))
}

fn try_symbol_or_keyword(
    token: &str,
    resolver: &dyn Resolver,
) -> Result<Value, ReadError> {
    if token.contains("::") && !token.starts_with("::") {
        return Err(ReadError::new(ReadErrorKind::MalformedToken(
            token.to_string(),
        )));
    }
    if token.len() > 1 && token.ends_with(':') {
        return Err(ReadError::new(ReadErrorKind::MalformedToken(
            token.to_string(),
        )));
    }

    let caps = symbol_regex()
        .captures(token)
        .ok_or_else(|| ReadError::new(ReadErrorKind::MalformedToken(token.to_string())))?;

    let is_double_colon = caps.name("dcolon").is_some();
    let is_keyword = is_double_colon || caps.name("colon").is_some();
    let ns = caps.name("ns").map(|m| m.as_str());
    let name = &caps["name"];

    if ns.is_some_and(|n| n.ends_with(':')) {
        return Err(ReadError::new(ReadErrorKind::MalformedToken(
            token.to_string(),
        )));
    }

    if is_double_colon {
        let sym = match ns {
            Some(alias) => resolver
                .resolve_alias(&Symbol::new(alias))
                .ok_or_else(|| {
                    ReadError::new(ReadErrorKind::UnresolvableSymbol(alias.to_string()))
                })?,
            None => resolver.current_namespace(),
        };
        return Ok(Value::Keyword(Symbol::with_namespace(
            sym.name().to_string(),
            name,
        )));
    }

    let symbol = match ns {
        Some(ns) => Symbol::with_namespace(ns, name),
        None => Symbol::new(name),
    };

    if is_keyword {
        Ok(Value::Keyword(symbol))
    } else {
        Ok(Value::Symbol(symbol))
    }
}
