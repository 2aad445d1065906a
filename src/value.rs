//! The reader's output alphabet: the values a completed form turns into.

use std::fmt;

use ordered_float::OrderedFloat;
use triomphe::Arc;

use crate::bowstring::BowString;

/// A namespace-qualified name, shared by symbols and keywords.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub namespace: Option<BowString>,
    pub name: BowString,
}

impl Symbol {
    pub fn new(name: impl Into<BowString>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn with_namespace(namespace: impl Into<BowString>, name: impl Into<BowString>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An integer literal: fixed-width unless suffixed with `N`, in which case
/// it carries arbitrary precision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Integer {
    Fixed(i64),
    Big(num_bigint::BigInt),
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Integer::Fixed(n) => write!(f, "{n}"),
            Integer::Big(n) => write!(f, "{n}"),
        }
    }
}

/// A tagged literal whose tag had no known reader: the raw `(tag, value)`
/// pair, passed through to a host-supplied default handler.
#[derive(Clone, Debug, PartialEq)]
pub struct TaggedLiteral {
    pub tag: Symbol,
    pub value: Value,
}

/// A value produced by the reader.
///
/// Collections use [`triomphe::Arc`] slices so that cloning a `Value` (which
/// the syntax-quote expander and metadata reader both do routinely) is an
/// atomic refcount bump, not a deep copy. Sets and maps enforce uniqueness
/// at construction time; see `DESIGN.md` for the last-value-wins rule on
/// duplicate map keys.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(Integer),
    Float(OrderedFloat<f64>),
    Char(char),
    Str(BowString),
    Symbol(Symbol),
    Keyword(Symbol),
    List(Arc<[Value]>),
    Vector(Arc<[Value]>),
    Set(Arc<[Value]>),
    Map(Arc<[(Value, Value)]>),
    Regex(Arc<RegexValue>),
    Tagged(Arc<TaggedLiteral>),
    /// `meta`, then the underlying value it's attached to.
    WithMeta(Arc<Value>, Arc<Value>),
}

/// A compiled regular expression, wrapping `regex::Regex` with the `Eq`
/// impl the value tree needs (regexes compare by source pattern, matching
/// how most hosts treat two textually-identical `#"..."` literals).
pub struct RegexValue {
    pub source: String,
    pub compiled: regex::Regex,
}

impl fmt::Debug for RegexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#\"{}\"", self.source)
    }
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Value {
    /// Does this value support carrying metadata? Symbols, collections, and
    /// tagged literals do; atoms (nil, booleans, numbers, characters,
    /// strings, keywords, regexes) do not.
    pub fn supports_metadata(&self) -> bool {
        matches!(
            self,
            Value::Symbol(_)
                | Value::List(_)
                | Value::Vector(_)
                | Value::Set(_)
                | Value::Map(_)
                | Value::Tagged(_)
                | Value::WithMeta(_, _)
        )
    }

    /// A short name for this value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "a boolean",
            Value::Int(_) | Value::Float(_) => "a number",
            Value::Char(_) => "a character",
            Value::Str(_) => "a string",
            Value::Symbol(_) => "a symbol",
            Value::Keyword(_) => "a keyword",
            Value::List(_) => "a list",
            Value::Vector(_) => "a vector",
            Value::Set(_) => "a set",
            Value::Map(_) => "a map",
            Value::Regex(_) => "a regexp",
            Value::Tagged(_) => "a tagged literal",
            Value::WithMeta(_, _) => "a value with metadata",
        }
    }

    /// Attach `meta` to `self`, or error if `self` doesn't support metadata.
    pub fn with_meta(self, meta: Value) -> Result<Value, &'static str> {
        if self.supports_metadata() {
            Ok(Value::WithMeta(Arc::new(meta), Arc::new(self)))
        } else {
            Err(self.kind_name())
        }
    }

    /// The metadata attached to this value, if any.
    pub fn meta(&self) -> Option<&Value> {
        match self {
            Value::WithMeta(meta, _) => Some(meta),
            _ => None,
        }
    }

    /// This value with any `WithMeta` wrapper peeled away.
    pub fn strip_meta(&self) -> &Value {
        match self {
            Value::WithMeta(_, inner) => inner.strip_meta(),
            other => other,
        }
    }
}

/// Builds `(name arg0 arg1 ...)` — the list shape every wrapping reader
/// (`quote`, `deref`, `unquote`, `var`, ...) and the anonymous-fn expander
/// produce.
pub(crate) fn call(name: &str, args: Vec<Value>) -> Value {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::Symbol(Symbol::new(name)));
    items.extend(args);
    Value::List(Arc::from(items))
}

/// Builds a `Set` value, keeping first-seen order and de-duplicating by
/// structural equality (last value for a duplicate wins, matching map
/// semantics below).
pub(crate) fn build_set(items: Vec<Value>) -> Value {
    let mut deduped: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(slot) = deduped.iter_mut().find(|existing| **existing == item) {
            *slot = item;
        } else {
            deduped.push(item);
        }
    }
    Value::Set(Arc::from(deduped))
}

/// Builds a `Map` value from alternating key/value items, preserving
/// insertion order and letting a later duplicate key overwrite an earlier
/// one (its position in the order is the *first* occurrence's, matching
/// common EDN reader behavior — see `DESIGN.md`).
pub(crate) fn build_map(pairs: Vec<(Value, Value)>) -> Value {
    let mut entries: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
    for (k, v) in pairs {
        if let Some(slot) = entries.iter_mut().find(|(existing, _)| *existing == k) {
            slot.1 = v;
        } else {
            entries.push((k, v));
        }
    }
    Value::Map(Arc::from(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_display_with_and_without_namespace() {
        assert_eq!(Symbol::new("foo").to_string(), "foo");
        assert_eq!(Symbol::with_namespace("ns", "foo").to_string(), "ns/foo");
    }

    #[test]
    fn metadata_supported_only_on_reference_types() {
        assert!(Value::Symbol(Symbol::new("x")).supports_metadata());
        assert!(Value::List(Arc::from(vec![])).supports_metadata());
        assert!(!Value::Int(Integer::Fixed(1)).supports_metadata());
        assert!(!Value::Keyword(Symbol::new("k")).supports_metadata());
    }

    #[test]
    fn with_meta_rejects_unsupported_targets() {
        let err = Value::Int(Integer::Fixed(1))
            .with_meta(Value::Bool(true))
            .unwrap_err();
        assert_eq!(err, "a number");
    }

    #[test]
    fn set_dedupes_keeping_first_position() {
        let set = build_set(vec![
            Value::Int(Integer::Fixed(1)),
            Value::Int(Integer::Fixed(2)),
            Value::Int(Integer::Fixed(1)),
        ]);
        match set {
            Value::Set(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected a set"),
        }
    }

    #[test]
    fn map_last_value_wins_for_duplicate_keys() {
        let map = build_map(vec![
            (Value::Keyword(Symbol::new("a")), Value::Int(Integer::Fixed(1))),
            (Value::Keyword(Symbol::new("a")), Value::Int(Integer::Fixed(2))),
        ]);
        match map {
            Value::Map(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].1, Value::Int(Integer::Fixed(2)));
            }
            _ => panic!("expected a map"),
        }
    }
}
