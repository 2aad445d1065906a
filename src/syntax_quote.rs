//! The syntax-quote expander: a pure tree-rewrite over an already-completed
//! form, never touching the character stream (spec.md §5: "never inside...
//! the syntax-quote expander, which runs to completion on already-buffered
//! ...values").
//!
//! The syntax-quote form reader (in `engine`) reads exactly one raw form
//! with the generic (possibly-suspending) reader, then calls [`expand`] once
//! that form is complete. `expand` mints gensyms through a fresh, per-quote
//! table that is discarded the moment the `` ` `` frame pops — matching the
//! "LIFO-scoped to a specific stack depth" invariant in spec.md §3.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use triomphe::Arc;

use crate::error::{ReadError, ReadErrorKind};
use crate::resolver::Resolver;
use crate::value::{call, Symbol, Value};

static GENSYM_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_gensym_id() -> u64 {
    GENSYM_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Per-syntax-quote gensym table: `foo#` tokens map to a single minted
/// symbol for the lifetime of one `` ` `` form.
#[derive(Debug, Default)]
pub(crate) struct GensymEnv {
    bindings: HashMap<String, Symbol>,
}

impl GensymEnv {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn resolve(&mut self, stem: &str) -> Symbol {
        self.bindings
            .entry(stem.to_string())
            .or_insert_with(|| Symbol::new(format!("{stem}__{}__auto__", next_gensym_id())))
            .clone()
    }
}

const SPECIAL_FORMS: &[&str] = &[
    "quote", "do", "if", "fn*", "let*", "loop*", "recur", "def", "var", "throw", "new", "case*",
    "monitor-enter", "monitor-exit", "catch", "finally", "try", "deftype*", "reify*", "import*",
    ".", "set!",
];

fn is_special_form(sym: &Symbol) -> bool {
    sym.namespace().is_none() && SPECIAL_FORMS.contains(&sym.name())
}

fn is_unquote(value: &Value, tag: &str) -> Option<Value> {
    if let Value::List(items) = value {
        if items.len() == 2 {
            if let Value::Symbol(sym) = &items[0] {
                if sym.namespace().is_none() && sym.name() == tag {
                    return Some(items[1].clone());
                }
            }
        }
    }
    None
}

/// Expand one syntax-quoted form.
pub(crate) fn expand(
    form: &Value,
    resolver: &dyn Resolver,
    gensyms: &mut GensymEnv,
) -> Result<Value, ReadError> {
    if let Some(inner) = is_unquote(form, "unquote") {
        return Ok(inner);
    }
    if is_unquote(form, "unquote-splicing").is_some() {
        return Err(ReadError::new(ReadErrorKind::SpliceOutsideCollection));
    }

    match form {
        Value::Symbol(sym) => expand_symbol(sym, resolver, gensyms),
        Value::List(items) => expand_seq_ctor(items, "seq-concat", resolver, gensyms),
        Value::Vector(items) => expand_seq_ctor(items, "vector", resolver, gensyms),
        Value::Set(items) => expand_seq_ctor(items, "hash-set", resolver, gensyms),
        Value::Map(entries) => {
            let flattened: Vec<Value> = entries
                .iter()
                .flat_map(|(k, v)| [k.clone(), v.clone()])
                .collect();
            expand_seq_ctor(&flattened, "hash-map", resolver, gensyms)
        }
        // Nil, Bool, Int, Float, Char, Str, Keyword, Regex, Tagged, WithMeta: self-evaluating.
        other => Ok(other.clone()),
    }
}

fn expand_symbol(
    sym: &Symbol,
    resolver: &dyn Resolver,
    gensyms: &mut GensymEnv,
) -> Result<Value, ReadError> {
    if is_special_form(sym) {
        return Ok(call("quote", vec![Value::Symbol(sym.clone())]));
    }

    if sym.namespace().is_none() && sym.name().ends_with('#') && sym.name() != "#" {
        let stem = &sym.name()[..sym.name().len() - 1];
        return Ok(Value::Symbol(gensyms.resolve(stem)));
    }

    if sym.namespace().is_none() && sym.name().starts_with('.') && sym.name() != "." {
        return Ok(Value::Symbol(sym.clone()));
    }

    if sym.namespace().is_none() && sym.name().ends_with('.') && sym.name() != "." {
        let stem = &sym.name()[..sym.name().len() - 1];
        let resolved = resolver
            .resolve_class(&Symbol::new(stem))
            .unwrap_or_else(|| Symbol::new(stem));
        let name = format!("{}.", resolved.name());
        let reappended = match resolved.namespace() {
            Some(ns) => Symbol::with_namespace(ns.to_string(), name),
            None => Symbol::new(name),
        };
        return Ok(Value::Symbol(reappended));
    }

    let resolved = resolver
        .resolve_alias(sym)
        .or_else(|| resolver.resolve_class(sym))
        .or_else(|| resolver.resolve_var(sym));

    let resolved = match resolved {
        Some(sym) => sym,
        None if sym.namespace().is_none() => {
            Symbol::with_namespace(resolver.current_namespace().name().to_string(), sym.name())
        }
        None => sym.clone(),
    };

    Ok(call("quote", vec![Value::Symbol(resolved)]))
}

/// Builds `(apply ctor (seq (concat (list elt) ... )))`, splicing raw
/// `(unquote-splicing x)` pieces in directly.
fn expand_seq_ctor(
    items: &[Value],
    ctor: &str,
    resolver: &dyn Resolver,
    gensyms: &mut GensymEnv,
) -> Result<Value, ReadError> {
    let mut pieces = Vec::with_capacity(items.len());
    for item in items {
        if let Some(spliced) = is_unquote(item, "unquote-splicing") {
            pieces.push(spliced);
        } else {
            let expanded = expand(item, resolver, gensyms)?;
            pieces.push(call("list", vec![expanded]));
        }
    }

    let concatenated = call("concat", pieces);
    let seqed = call("seq", vec![concatenated]);

    if ctor == "seq-concat" {
        Ok(seqed)
    } else {
        Ok(call("apply", vec![Value::Symbol(Symbol::new(ctor)), seqed]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DefaultResolver;
    use crate::value::Integer;

    fn sym(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::from(items))
    }

    #[test]
    fn literals_pass_through_unchanged() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let n = Value::Int(Integer::Fixed(42));
        assert_eq!(expand(&n, &resolver, &mut gensyms).unwrap(), n);
    }

    #[test]
    fn special_forms_are_quoted() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let result = expand(&sym("if"), &resolver, &mut gensyms).unwrap();
        assert_eq!(result, call("quote", vec![sym("if")]));
    }

    #[test]
    fn plain_symbol_gets_namespace_qualified_and_quoted() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let result = expand(&sym("foo"), &resolver, &mut gensyms).unwrap();
        assert_eq!(
            result,
            call("quote", vec![Value::Symbol(Symbol::with_namespace("user", "foo"))])
        );
    }

    #[test]
    fn gensym_symbol_is_stable_within_one_expansion() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let first = expand(&sym("x#"), &resolver, &mut gensyms).unwrap();
        let second = expand(&sym("x#"), &resolver, &mut gensyms).unwrap();
        assert_eq!(first, second);
        match first {
            Value::Symbol(s) => assert!(s.name().starts_with("x__") && s.name().ends_with("__auto__")),
            _ => panic!("expected a symbol"),
        }
    }

    #[test]
    fn top_level_unquote_returns_inner_value_unexpanded() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let unquoted = list(vec![sym("unquote"), sym("b")]);
        let result = expand(&unquoted, &resolver, &mut gensyms).unwrap();
        assert_eq!(result, sym("b"));
    }

    #[test]
    fn splice_outside_collection_errors() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let spliced = list(vec![sym("unquote-splicing"), sym("c")]);
        let err = expand(&spliced, &resolver, &mut gensyms).unwrap_err();
        assert!(matches!(err.kind(), ReadErrorKind::SpliceOutsideCollection));
    }

    #[test]
    fn list_expansion_builds_concat_of_lists() {
        let resolver = DefaultResolver::new();
        let mut gensyms = GensymEnv::new();
        let form = list(vec![sym("a"), list(vec![sym("unquote"), sym("b")])]);
        let result = expand(&form, &resolver, &mut gensyms).unwrap();
        // (seq (concat (list 'a) b))
        match result {
            Value::List(items) => {
                assert_eq!(items[0], sym("seq"));
            }
            _ => panic!("expected a list"),
        }
    }
}
