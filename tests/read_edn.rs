//! End-to-end coverage of `read_string`/`read_all_string`/`Reader` against
//! representative forms from every [MODULE] in spec.md, plus the chunk-split
//! and stack-depth properties spec.md §8 calls out explicitly.

use pretty_assertions::assert_eq;

use edn_reader::{read_all_string, read_string, Integer, Reader, Symbol, Value};

fn sym(name: &str) -> Value {
    Value::Symbol(Symbol::new(name))
}

fn kw(name: &str) -> Value {
    Value::Keyword(Symbol::new(name))
}

#[test]
fn reads_a_list() {
    let v = read_string("(1 2 3)").unwrap();
    match v {
        Value::List(items) => assert_eq!(
            &*items,
            &[
                Value::Int(Integer::Fixed(1)),
                Value::Int(Integer::Fixed(2)),
                Value::Int(Integer::Fixed(3)),
            ]
        ),
        other => panic!("expected a list, got {other:?}"),
    }
}

#[test]
fn reads_a_vector() {
    let v = read_string("[1 2 3]").unwrap();
    match v {
        Value::Vector(items) => assert_eq!(items.len(), 3),
        other => panic!("expected a vector, got {other:?}"),
    }
}

#[test]
fn reads_a_map_with_commas_as_whitespace() {
    let v = read_string("{:a 1, :b 2}").unwrap();
    match v {
        Value::Map(entries) => {
            assert_eq!(entries.len(), 2);
            assert!(entries.contains(&(kw("a"), Value::Int(Integer::Fixed(1)))));
            assert!(entries.contains(&(kw("b"), Value::Int(Integer::Fixed(2)))));
        }
        other => panic!("expected a map, got {other:?}"),
    }
}

#[test]
fn map_with_odd_entries_is_an_error() {
    let err = read_string("{:a 1 :b}").unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::OddMapEntries
    ));
}

#[test]
fn reads_a_set_deduplicating_elements() {
    let v = read_string("#{1 2 3 2 1}").unwrap();
    match v {
        Value::Set(items) => assert_eq!(items.len(), 3),
        other => panic!("expected a set, got {other:?}"),
    }
}

#[test]
fn reads_a_string_with_escapes_and_unicode() {
    let v = read_string(r#""a\nbA""#).unwrap();
    assert_eq!(v, Value::Str("a\nbA".into()));
}

#[test]
fn invalid_unicode_escape_is_an_error() {
    let err = read_string(r#""\u00""#).unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::InvalidEscape(_)
    ));
}

#[test]
fn reads_named_and_single_char_literals() {
    assert_eq!(read_string(r"\newline").unwrap(), Value::Char('\n'));
    assert_eq!(read_string(r"\A").unwrap(), Value::Char('A'));
}

#[test]
fn reads_unicode_char_literal_by_codepoint() {
    let backslash_u_0041 = "\\u0041";
    assert_eq!(read_string(backslash_u_0041).unwrap(), Value::Char('A'));
}

#[test]
fn truncated_unicode_char_escape_is_an_error() {
    let err = read_string(r"\u00").unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::InvalidCharLiteral(_)
    ));
}

#[test]
fn reads_bignum_and_radix_integers() {
    match read_string("1N").unwrap() {
        Value::Int(Integer::Big(n)) => assert_eq!(n.to_string(), "1"),
        other => panic!("expected a bignum, got {other:?}"),
    }
    assert_eq!(read_string("16rFF").unwrap(), Value::Int(Integer::Fixed(255)));
}

#[test]
fn bigdecimal_literals_are_refused() {
    let err = read_string("1.5M").unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::BigDecimalUnsupported
    ));
}

#[test]
fn ratio_shaped_tokens_are_malformed() {
    // Ratios are a Non-goal (spec.md §1); `1/2` matches no numeric grammar
    // and isn't a valid namespaced symbol (namespaces can't start with a
    // digit), so it falls through to the generic malformed-token error.
    let err = read_string("1/2").unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::MalformedToken(_)
    ));
}

#[test]
fn reads_symbolic_float_values() {
    assert!(matches!(read_string("##Inf").unwrap(), Value::Float(f) if f.into_inner().is_infinite() && f.into_inner() > 0.0));
    assert!(matches!(read_string("##-Inf").unwrap(), Value::Float(f) if f.into_inner().is_infinite() && f.into_inner() < 0.0));
    assert!(matches!(read_string("##NaN").unwrap(), Value::Float(f) if f.into_inner().is_nan()));
}

#[test]
fn reads_metadata_shorthand_and_attaches_it() {
    let v = read_string("^:dynamic foo").unwrap();
    match v {
        Value::WithMeta(meta, inner) => {
            assert_eq!(*inner, sym("foo"));
            match &*meta {
                Value::Map(entries) => {
                    assert_eq!(&**entries, &[(kw("dynamic"), Value::Bool(true))]);
                }
                other => panic!("expected meta map, got {other:?}"),
            }
        }
        other => panic!("expected metadata wrapper, got {other:?}"),
    }
}

#[test]
fn discard_skips_the_next_form() {
    let v = read_string("#_ 1 2").unwrap();
    assert_eq!(v, Value::Int(Integer::Fixed(2)));
}

#[test]
fn comment_is_skipped_before_the_next_form() {
    let v = read_string(";x\n42").unwrap();
    assert_eq!(v, Value::Int(Integer::Fixed(42)));
}

#[test]
fn syntax_quote_expands_unquote_and_splice() {
    let v = read_string("`(a ~b ~@c)").unwrap();
    match v {
        Value::List(items) => {
            assert_eq!(items[0], sym("seq"));
            match &items[1] {
                Value::List(concat_call) => assert_eq!(concat_call[0], sym("concat")),
                other => panic!("expected (concat ...), got {other:?}"),
            }
        }
        other => panic!("expected a (seq (concat ...)) expansion, got {other:?}"),
    }
}

#[test]
fn anonymous_fn_literal_expands_percent_args() {
    let v = read_string("#(inc %)").unwrap();
    match v {
        Value::List(items) => {
            assert_eq!(items[0], sym("fn*"));
        }
        other => panic!("expected an (fn* ...) expansion, got {other:?}"),
    }
}

#[test]
fn read_all_string_reads_every_top_level_form() {
    let values = read_all_string("(1 2 3) [4 5] :k").unwrap();
    assert_eq!(values.len(), 3);
}

#[test]
fn gensym_token_outside_syntax_quote_is_an_error() {
    let err = read_string("foo#").unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::GensymOutsideSyntaxQuote(stem) if stem == "foo"
    ));
}

#[test]
fn gensym_token_resolves_to_a_fresh_symbol_inside_syntax_quote() {
    let v = read_string("`(foo# foo#)").unwrap();
    // `(seq (concat (list 'foo__N__auto__) (list 'foo__N__auto__)))` — same
    // gensym both times within one syntax-quote.
    match v {
        Value::List(items) => {
            assert_eq!(items[0], sym("seq"));
        }
        other => panic!("expected a (seq (concat ...)) expansion, got {other:?}"),
    }
}

#[test]
fn stray_closing_delimiter_is_an_error() {
    let err = read_string(")").unwrap_err();
    assert!(matches!(
        err.kind(),
        edn_reader::ReadErrorKind::StrayDelimiter(')')
    ));
}

// --- Chunk-boundary tests: splitting a complete input at every possible
// character boundary must produce the same forms as reading it whole. ---

fn read_via_every_split(input: &str) -> Vec<Vec<Value>> {
    let chars: Vec<char> = input.chars().collect();
    (0..=chars.len())
        .map(|cut| {
            let (head, tail): (String, String) =
                (chars[..cut].iter().collect(), chars[cut..].iter().collect());
            let mut reader = Reader::default();
            let mut forms = reader.feed(&head).unwrap();
            forms.extend(reader.feed(&tail).unwrap());
            forms.extend(reader.finish().unwrap());
            forms
        })
        .collect()
}

#[test]
fn list_reads_identically_regardless_of_chunk_split() {
    let whole = read_all_string("(1 2 3)").unwrap();
    for split in read_via_every_split("(1 2 3)") {
        assert_eq!(split, whole);
    }
}

#[test]
fn string_with_escapes_reads_identically_regardless_of_chunk_split() {
    let whole = read_all_string(r#""a\nbA""#).unwrap();
    for split in read_via_every_split(r#""a\nbA""#) {
        assert_eq!(split, whole);
    }
}

#[test]
fn map_reads_identically_regardless_of_chunk_split() {
    let whole = read_all_string("{:a 1 :b 2}").unwrap();
    for split in read_via_every_split("{:a 1 :b 2}") {
        assert_eq!(split, whole);
    }
}

#[test]
fn chunked_list_split_mid_token_completes_on_next_feed() {
    let mut reader = Reader::default();
    assert!(reader.feed("(1 2").unwrap().is_empty());
    let values = reader.feed(" 3)").unwrap();
    assert_eq!(values.len(), 1);
    match &values[0] {
        Value::List(items) => assert_eq!(items.len(), 3),
        other => panic!("expected a list, got {other:?}"),
    }
}

// --- Stack-depth test: a 10,000-deep nested vector must not blow the
// native stack, per spec.md §1/§7. ---

#[test]
fn deeply_nested_vectors_do_not_overflow_the_stack() {
    const DEPTH: usize = 10_000;
    let mut input = String::with_capacity(DEPTH * 2 + 1);
    for _ in 0..DEPTH {
        input.push('[');
    }
    input.push('1');
    for _ in 0..DEPTH {
        input.push(']');
    }

    let v = read_string(&input).unwrap();
    let mut depth = 0;
    let mut current = v;
    loop {
        match current {
            Value::Vector(items) if items.len() == 1 => {
                depth += 1;
                current = items[0].clone();
            }
            Value::Int(Integer::Fixed(1)) => break,
            other => panic!("unexpected structure at depth {depth}: {other:?}"),
        }
    }
    assert_eq!(depth, DEPTH);
}
