//! Every frame that can sit on the reader's parse stack, and the step logic
//! that drives each one. A frame owns exactly the state it needs to resume:
//! a partially filled buffer, a partially built collection, a decision not
//! yet made. None of them recurse into each other directly — a frame that
//! needs a nested form pushes a child and returns [`Outcome::Push`]; the
//! engine re-invokes the parent with the child's result stashed in
//! `Engine::pending` once that child is done. See `DESIGN.md` for why this
//! gives resumability and bounded native-stack depth for free.

use std::collections::HashMap;

use triomphe::Arc;

use super::{Engine, Outcome};
use crate::classifier;
use crate::data_readers;
use crate::error::{ReadError, ReadErrorKind};
use crate::gensym;
use crate::interpreter::interpret_token;
use crate::scanner::Scanner;
use crate::syntax_quote::{self, GensymEnv};
use crate::value::{self, Integer, RegexValue, Symbol, TaggedLiteral, Value};

pub(crate) enum Frame {
    /// The top-level "read the next form" frame the engine primes the stack
    /// with. Unlike `Dispatch`, idling here at true EOF is not an error: it
    /// means input ended between forms (or consisted only of whitespace and
    /// comments), which `read-stream`'s contract tolerates. A form that's
    /// actually begun (an open string, collection, wrapper, ...) always
    /// replaces or pushes past this frame before EOF could strand it.
    TopLevel,
    Dispatch { context: &'static str },
    HashDispatch,
    Token(Scanner),
    StringLit { buf: String, escape: bool },
    CharLit(CharLitState),
    RegexLit { buf: String, escape: bool },
    LineComment,
    Collection(CollectionState),
    AnonFn(AnonFnState),
    Meta(MetaState),
    Wrap { sym: &'static str },
    Tilde,
    Discard,
    Tagged(TaggedState),
    SymbolicValue(Scanner),
    NamespacedMap(NamespacedMapState),
    SyntaxQuote(GensymEnv),
}

impl Frame {
    pub(crate) fn dispatch(context: &'static str) -> Frame {
        Frame::Dispatch { context }
    }

    pub(crate) fn top_level() -> Frame {
        Frame::TopLevel
    }

    /// Consume more input. `engine` gives access to the pending child
    /// result, the resolver, the data-reader table and (for `%` lookups)
    /// the rest of the stack.
    pub(crate) fn run(
        &mut self,
        engine: &mut Engine,
        chars: &[char],
        pos: &mut usize,
    ) -> Result<Outcome, ReadError> {
        match self {
            Frame::TopLevel | Frame::Dispatch { .. } => run_dispatch(chars, pos),
            Frame::HashDispatch => run_hash_dispatch(chars, pos),
            Frame::Token(scanner) => {
                if scanner.resume(chars, pos) {
                    let token = std::mem::take(&mut scanner.buf);
                    Ok(Outcome::Done(Some(interpret_or_bind(&token, engine)?)))
                } else {
                    Ok(Outcome::Suspend)
                }
            }
            Frame::StringLit { buf, escape } => run_string_lit(buf, escape, chars, pos),
            Frame::CharLit(state) => run_char_lit(state, chars, pos),
            Frame::RegexLit { buf, escape } => run_regex_lit(buf, escape, chars, pos),
            Frame::LineComment => {
                while *pos < chars.len() {
                    let c = chars[*pos];
                    *pos += 1;
                    if c == '\n' {
                        return Ok(Outcome::Done(None));
                    }
                }
                Ok(Outcome::Suspend)
            }
            Frame::Collection(state) => state.run(engine, chars, pos),
            Frame::AnonFn(state) => state.run(engine, chars, pos),
            Frame::Meta(state) => state.run(engine, chars, pos),
            Frame::Wrap { sym } => run_wrap(*sym, engine),
            Frame::Tilde => run_tilde(chars, pos),
            Frame::Discard => run_discard(engine),
            Frame::Tagged(state) => state.run(engine, chars, pos),
            Frame::SymbolicValue(scanner) => {
                if scanner.resume(chars, pos) {
                    let token = std::mem::take(&mut scanner.buf);
                    Ok(Outcome::Done(Some(interpret_symbolic(&token)?)))
                } else {
                    Ok(Outcome::Suspend)
                }
            }
            Frame::NamespacedMap(state) => state.run(engine, chars, pos),
            Frame::SyntaxQuote(gensyms) => run_syntax_quote(gensyms, engine),
        }
    }

    /// True EOF: no more input will ever come.
    pub(crate) fn finalize_eof(self, engine: &mut Engine) -> Result<Outcome, ReadError> {
        match self {
            Frame::TopLevel => {
                let _ = engine.take_pending();
                Ok(Outcome::Done(None))
            }
            Frame::Dispatch { context } => {
                let _ = engine.take_pending();
                Err(ReadError::eof(context))
            }
            Frame::HashDispatch => Err(ReadError::eof("a dispatch macro")),
            Frame::Token(scanner) => {
                let token = scanner.finalize();
                Ok(Outcome::Done(Some(interpret_or_bind(&token, engine)?)))
            }
            Frame::StringLit { .. } => Err(ReadError::eof("a string")),
            Frame::CharLit(state) => state.finalize_eof(),
            Frame::RegexLit { .. } => Err(ReadError::eof("a regexp")),
            Frame::LineComment => Ok(Outcome::Done(None)),
            Frame::Collection(state) => {
                let _ = engine.take_pending();
                Err(ReadError::eof(state.kind.form_name()))
            }
            Frame::AnonFn(_) => {
                let _ = engine.take_pending();
                Err(ReadError::eof("an anonymous function"))
            }
            Frame::Meta(state) => state.finalize_eof(engine),
            Frame::Wrap { sym } => match engine.take_pending().flatten() {
                Some(v) => Ok(Outcome::Done(Some(value::call(sym, vec![v])))),
                None => Err(ReadError::eof(wrap_context(sym))),
            },
            Frame::Tilde => Err(ReadError::eof("an unquote")),
            Frame::Discard => match engine.take_pending().flatten() {
                Some(_) => Ok(Outcome::Done(None)),
                None => Err(ReadError::eof("a discarded form")),
            },
            Frame::Tagged(state) => state.finalize_eof(engine),
            Frame::SymbolicValue(scanner) => {
                Ok(Outcome::Done(Some(interpret_symbolic(&scanner.finalize())?)))
            }
            Frame::NamespacedMap(state) => state.finalize_eof(engine),
            Frame::SyntaxQuote(mut gensyms) => match engine.take_pending().flatten() {
                Some(v) => {
                    let expanded = syntax_quote::expand(&v, engine.resolver(), &mut gensyms)?;
                    Ok(Outcome::Done(Some(expanded)))
                }
                None => Err(ReadError::eof("a syntax-quoted form")),
            },
        }
    }
}

fn skip_ws_and_commas(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && classifier::is_whitespace_or_comma(chars[*pos]) {
        *pos += 1;
    }
}

fn run_dispatch(chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
    skip_ws_and_commas(chars, pos);
    if *pos >= chars.len() {
        return Ok(Outcome::Suspend);
    }
    let c = chars[*pos];
    match c {
        ';' => {
            *pos += 1;
            Ok(Outcome::Push(Frame::LineComment))
        }
        '"' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::StringLit {
                buf: String::new(),
                escape: false,
            }))
        }
        '\\' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::CharLit(CharLitState::NeedFirst)))
        }
        '~' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Tilde))
        }
        '`' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::SyntaxQuote(GensymEnv::new())))
        }
        '(' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Collection(CollectionState::new(
                CollectionKind::List,
                ')',
            ))))
        }
        '{' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Collection(CollectionState::new(
                CollectionKind::Map,
                '}',
            ))))
        }
        '[' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Collection(CollectionState::new(
                CollectionKind::Vector,
                ']',
            ))))
        }
        ')' | ']' | '}' => Err(ReadError::new(ReadErrorKind::StrayDelimiter(c))),
        '^' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Meta(MetaState::ReadingMetaForm)))
        }
        '@' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Wrap { sym: "deref" }))
        }
        '\'' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Wrap { sym: "quote" }))
        }
        '#' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::HashDispatch))
        }
        _ => Ok(Outcome::Replace(Frame::Token(Scanner::new()))),
    }
}

fn run_hash_dispatch(chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
    if *pos >= chars.len() {
        return Ok(Outcome::Suspend);
    }
    let c = chars[*pos];
    match c {
        '_' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Discard))
        }
        '(' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::AnonFn(AnonFnState::new())))
        }
        '{' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Collection(CollectionState::new(
                CollectionKind::Set,
                '}',
            ))))
        }
        '"' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::RegexLit {
                buf: String::new(),
                escape: false,
            }))
        }
        '\'' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::Wrap { sym: "var" }))
        }
        ':' => Ok(Outcome::Replace(Frame::NamespacedMap(
            NamespacedMapState::new(),
        ))),
        '#' => {
            *pos += 1;
            Ok(Outcome::Replace(Frame::SymbolicValue(Scanner::new())))
        }
        _ => Ok(Outcome::Replace(Frame::Tagged(TaggedState::ScanningTag(
            Scanner::new(),
        )))),
    }
}

fn run_string_lit(
    buf: &mut String,
    escape: &mut bool,
    chars: &[char],
    pos: &mut usize,
) -> Result<Outcome, ReadError> {
    while *pos < chars.len() {
        let c = chars[*pos];
        *pos += 1;
        if *escape {
            buf.push(c);
            *escape = false;
            continue;
        }
        if c == '\\' {
            buf.push(c);
            *escape = true;
            continue;
        }
        if c == '"' {
            let unescaped = unescape_string(buf)?;
            return Ok(Outcome::Done(Some(Value::Str(unescaped.into()))));
        }
        buf.push(c);
    }
    Ok(Outcome::Suspend)
}

fn unescape_string(raw: &str) -> Result<String, ReadError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('u') => {
                let hex: String = (&mut chars).take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| ReadError::new(ReadErrorKind::InvalidEscape(format!("u{hex}"))))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| ReadError::new(ReadErrorKind::InvalidEscape(format!("u{hex}"))))?;
                out.push(ch);
            }
            Some(d) if classifier::is_octal_digit(d) => {
                let mut digits = String::new();
                digits.push(d);
                for _ in 0..2 {
                    if let Some(&next) = chars.peek() {
                        if classifier::is_octal_digit(next) {
                            digits.push(next);
                            chars.next();
                            continue;
                        }
                    }
                    break;
                }
                let code = u32::from_str_radix(&digits, 8)
                    .map_err(|_| ReadError::new(ReadErrorKind::InvalidEscape(digits.clone())))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| ReadError::new(ReadErrorKind::InvalidEscape(digits.clone())))?;
                out.push(ch);
            }
            Some(other) => {
                return Err(ReadError::new(ReadErrorKind::InvalidEscape(
                    other.to_string(),
                )))
            }
            None => return Err(ReadError::new(ReadErrorKind::InvalidEscape(String::new()))),
        }
    }
    Ok(out)
}

pub(crate) enum CharLitState {
    NeedFirst,
    Scanning(Scanner),
}

fn run_char_lit(
    state: &mut CharLitState,
    chars: &[char],
    pos: &mut usize,
) -> Result<Outcome, ReadError> {
    loop {
        match state {
            CharLitState::NeedFirst => {
                if *pos >= chars.len() {
                    return Ok(Outcome::Suspend);
                }
                let c = chars[*pos];
                *pos += 1;
                if c.is_alphabetic() {
                    let mut scanner = Scanner::new();
                    scanner.buf.push(c);
                    *state = CharLitState::Scanning(scanner);
                    continue;
                }
                return Ok(Outcome::Done(Some(Value::Char(c))));
            }
            CharLitState::Scanning(scanner) => {
                if scanner.resume(chars, pos) {
                    let token = std::mem::take(&mut scanner.buf);
                    return Ok(Outcome::Done(Some(interpret_char_token(&token)?)));
                }
                return Ok(Outcome::Suspend);
            }
        }
    }
}

impl CharLitState {
    fn finalize_eof(self) -> Result<Outcome, ReadError> {
        match self {
            CharLitState::NeedFirst => Err(ReadError::eof("a character")),
            CharLitState::Scanning(scanner) => {
                Ok(Outcome::Done(Some(interpret_char_token(&scanner.finalize())?)))
            }
        }
    }
}

fn interpret_char_token(token: &str) -> Result<Value, ReadError> {
    if token.chars().count() == 1 {
        return Ok(Value::Char(token.chars().next().unwrap()));
    }
    match token {
        "newline" => return Ok(Value::Char('\n')),
        "space" => return Ok(Value::Char(' ')),
        "tab" => return Ok(Value::Char('\t')),
        "backspace" => return Ok(Value::Char('\u{8}')),
        "formfeed" => return Ok(Value::Char('\u{c}')),
        "return" => return Ok(Value::Char('\r')),
        _ => {}
    }
    if let Some(hex) = token.strip_prefix('u') {
        if hex.len() == 4 && hex.chars().all(|c| classifier::is_hex_digit(c)) {
            let code = u32::from_str_radix(hex, 16)
                .map_err(|_| ReadError::new(ReadErrorKind::InvalidCharLiteral(token.to_string())))?;
            let ch = char::from_u32(code)
                .ok_or_else(|| ReadError::new(ReadErrorKind::InvalidCharLiteral(token.to_string())))?;
            return Ok(Value::Char(ch));
        }
    }
    if let Some(oct) = token.strip_prefix('o') {
        if !oct.is_empty()
            && oct.len() <= 3
            && oct.chars().all(classifier::is_octal_digit)
        {
            let code = u32::from_str_radix(oct, 8)
                .map_err(|_| ReadError::new(ReadErrorKind::InvalidCharLiteral(token.to_string())))?;
            if code <= 0o377 {
                if let Some(ch) = char::from_u32(code) {
                    return Ok(Value::Char(ch));
                }
            }
        }
    }
    Err(ReadError::new(ReadErrorKind::InvalidCharLiteral(
        token.to_string(),
    )))
}

fn run_regex_lit(
    buf: &mut String,
    escape: &mut bool,
    chars: &[char],
    pos: &mut usize,
) -> Result<Outcome, ReadError> {
    while *pos < chars.len() {
        let c = chars[*pos];
        *pos += 1;
        if *escape {
            buf.push(c);
            *escape = false;
            continue;
        }
        if c == '\\' {
            buf.push(c);
            *escape = true;
            continue;
        }
        if c == '"' {
            let compiled = regex::Regex::new(buf).map_err(|_| {
                ReadError::new(ReadErrorKind::MalformedToken(format!(
                    "invalid regexp: {buf}"
                )))
            })?;
            return Ok(Outcome::Done(Some(Value::Regex(Arc::new(RegexValue {
                source: buf.clone(),
                compiled,
            })))));
        }
        buf.push(c);
    }
    Ok(Outcome::Suspend)
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectionKind {
    List,
    Vector,
    Set,
    Map,
}

impl CollectionKind {
    fn form_name(self) -> &'static str {
        match self {
            CollectionKind::List => "a list",
            CollectionKind::Vector => "a vector",
            CollectionKind::Set => "a set",
            CollectionKind::Map => "a map",
        }
    }

    fn finalize(self, items: Vec<Value>) -> Result<Value, ReadError> {
        match self {
            CollectionKind::List => Ok(Value::List(Arc::from(items))),
            CollectionKind::Vector => Ok(Value::Vector(Arc::from(items))),
            CollectionKind::Set => Ok(value::build_set(items)),
            CollectionKind::Map => {
                if items.len() % 2 != 0 {
                    return Err(ReadError::new(ReadErrorKind::OddMapEntries));
                }
                let pairs = items
                    .chunks_exact(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect();
                Ok(value::build_map(pairs))
            }
        }
    }
}

pub(crate) struct CollectionState {
    kind: CollectionKind,
    closer: char,
    items: Vec<Value>,
}

impl CollectionState {
    fn new(kind: CollectionKind, closer: char) -> Self {
        Self {
            kind,
            closer,
            items: Vec::new(),
        }
    }

    fn run(&mut self, engine: &mut Engine, chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
        if let Some(v) = engine.take_pending().flatten() {
            self.items.push(v);
        }
        skip_ws_and_commas(chars, pos);
        if *pos >= chars.len() {
            return Ok(Outcome::Suspend);
        }
        if chars[*pos] == self.closer {
            *pos += 1;
            let items = std::mem::take(&mut self.items);
            return Ok(Outcome::Done(Some(self.kind.finalize(items)?)));
        }
        if matches!(chars[*pos], ')' | ']' | '}') {
            let c = chars[*pos];
            return Err(ReadError::new(ReadErrorKind::StrayDelimiter(c)));
        }
        Ok(Outcome::Push(Frame::dispatch("an item")))
    }
}

pub(crate) struct AnonFnState {
    items: Vec<Value>,
    args: HashMap<i64, Symbol>,
    max_positive: i64,
}

impl AnonFnState {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            args: HashMap::new(),
            max_positive: 0,
        }
    }

    fn run(&mut self, engine: &mut Engine, chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
        if let Some(v) = engine.take_pending().flatten() {
            self.items.push(v);
        }
        skip_ws_and_commas(chars, pos);
        if *pos >= chars.len() {
            return Ok(Outcome::Suspend);
        }
        if chars[*pos] == ')' {
            *pos += 1;
            return Ok(Outcome::Done(Some(self.finalize())));
        }
        if matches!(chars[*pos], ']' | '}') {
            let c = chars[*pos];
            return Err(ReadError::new(ReadErrorKind::StrayDelimiter(c)));
        }
        Ok(Outcome::Push(Frame::dispatch("an item")))
    }

    fn finalize(&mut self) -> Value {
        let mut params: Vec<Value> = Vec::with_capacity(self.max_positive as usize + 1);
        for i in 1..=self.max_positive {
            let sym = self
                .args
                .remove(&i)
                .unwrap_or_else(|| Symbol::new(format!("p{i}__{}__auto__", gensym::next_id())));
            params.push(Value::Symbol(sym));
        }
        if let Some(rest) = self.args.remove(&-1) {
            params.push(Value::Symbol(Symbol::new("&")));
            params.push(Value::Symbol(rest));
        }
        let body = Value::List(Arc::from(std::mem::take(&mut self.items)));
        value::call("fn*", vec![Value::Vector(Arc::from(params)), body])
    }
}

fn parse_anon_arg_token(token: &str) -> Option<i64> {
    if token == "%" {
        return Some(1);
    }
    if token == "%&" {
        return Some(-1);
    }
    let rest = token.strip_prefix('%')?;
    if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
        return rest.parse::<i64>().ok();
    }
    None
}

fn interpret_or_bind(token: &str, engine: &mut Engine) -> Result<Value, ReadError> {
    if let Some(index) = parse_anon_arg_token(token) {
        if let Some(Frame::AnonFn(state)) = engine
            .stack
            .iter_mut()
            .rev()
            .find(|f| matches!(f, Frame::AnonFn(_)))
        {
            let sym = state.args.entry(index).or_insert_with(|| {
                if index < 0 {
                    Symbol::new(format!("rest__{}__auto__", gensym::next_id()))
                } else {
                    Symbol::new(format!("p{index}__{}__auto__", gensym::next_id()))
                }
            });
            let sym = sym.clone();
            if index > 0 && index > state.max_positive {
                state.max_positive = index;
            }
            return Ok(Value::Symbol(sym));
        }
    }
    if is_bare_gensym_token(token) && !engine.stack.iter().any(|f| matches!(f, Frame::SyntaxQuote(_)))
    {
        let stem = &token[..token.len() - 1];
        return Err(ReadError::new(ReadErrorKind::GensymOutsideSyntaxQuote(
            stem.to_string(),
        )));
    }
    interpret_token(token, engine.resolver())
}

/// A token shaped like `foo#` — a plain (no namespace, no leading `:`)
/// symbol ending in `#` — is only meaningful as a gensym request inside an
/// active syntax-quote; `syntax_quote::expand` resolves it once the
/// enclosing `` ` `` form completes. Outside syntax-quote it has no
/// interpretation, per spec.md §7's "Gensym literal outside syntax-quote".
fn is_bare_gensym_token(token: &str) -> bool {
    token.len() > 1 && !token.starts_with(':') && !token.contains('/') && token.ends_with('#')
}

pub(crate) enum MetaState {
    ReadingMetaForm,
    ReadingTarget(Value),
}

impl MetaState {
    fn run(&mut self, engine: &mut Engine, _chars: &[char], _pos: &mut usize) -> Result<Outcome, ReadError> {
        match self {
            MetaState::ReadingMetaForm => match engine.take_pending().flatten() {
                None => Ok(Outcome::Push(Frame::dispatch("metadata"))),
                Some(form) => {
                    let meta_map = normalize_meta(form)?;
                    *self = MetaState::ReadingTarget(meta_map);
                    Ok(Outcome::Push(Frame::dispatch("a form with metadata")))
                }
            },
            MetaState::ReadingTarget(meta_map) => match engine.take_pending().flatten() {
                None => Ok(Outcome::Push(Frame::dispatch("a form with metadata"))),
                Some(target) => Ok(Outcome::Done(Some(attach_meta(target, meta_map.clone())?))),
            },
        }
    }

    fn finalize_eof(self, engine: &mut Engine) -> Result<Outcome, ReadError> {
        match self {
            MetaState::ReadingMetaForm => {
                let _ = engine.take_pending();
                Err(ReadError::eof("metadata"))
            }
            MetaState::ReadingTarget(meta_map) => match engine.take_pending().flatten() {
                Some(target) => Ok(Outcome::Done(Some(attach_meta(target, meta_map)?))),
                None => Err(ReadError::eof("a form with metadata")),
            },
        }
    }
}

fn normalize_meta(form: Value) -> Result<Value, ReadError> {
    match form {
        Value::Map(_) => Ok(form),
        Value::Keyword(_) => Ok(value::build_map(vec![(form, Value::Bool(true))])),
        Value::Symbol(_) | Value::Str(_) => {
            Ok(value::build_map(vec![(Value::Keyword(Symbol::new("tag")), form)]))
        }
        other => Err(ReadError::new(ReadErrorKind::InvalidMetadataShorthand(
            other.kind_name(),
        ))),
    }
}

fn attach_meta(target: Value, outer_meta: Value) -> Result<Value, ReadError> {
    let merged = match target.meta() {
        Some(inner_meta) => merge_meta(inner_meta, &outer_meta),
        None => outer_meta,
    };
    let base = target.strip_meta().clone();
    base.with_meta(merged)
        .map_err(|kind| ReadError::new(ReadErrorKind::UnsupportedMetadataTarget(kind)))
}

/// Stacked `^` metas merge like `(merge inner outer)`: the outermost
/// (leftmost, last-applied) `^` wins on key collisions.
fn merge_meta(inner: &Value, outer: &Value) -> Value {
    let (Value::Map(inner), Value::Map(outer)) = (inner, outer) else {
        return outer.clone();
    };
    let mut pairs: Vec<(Value, Value)> = inner.to_vec();
    pairs.extend(outer.iter().cloned());
    value::build_map(pairs)
}

fn wrap_context(sym: &str) -> &'static str {
    match sym {
        "quote" => "a quoted form",
        "deref" => "a dereferenced form",
        "var" => "a var form",
        "unquote" => "an unquoted form",
        "unquote-splicing" => "a spliced form",
        _ => "a form",
    }
}

fn run_wrap(sym: &'static str, engine: &mut Engine) -> Result<Outcome, ReadError> {
    match engine.take_pending().flatten() {
        Some(v) => Ok(Outcome::Done(Some(value::call(sym, vec![v])))),
        None => Ok(Outcome::Push(Frame::dispatch(wrap_context(sym)))),
    }
}

fn run_tilde(chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
    if *pos >= chars.len() {
        return Ok(Outcome::Suspend);
    }
    if chars[*pos] == '@' {
        *pos += 1;
        Ok(Outcome::Replace(Frame::Wrap {
            sym: "unquote-splicing",
        }))
    } else {
        Ok(Outcome::Replace(Frame::Wrap { sym: "unquote" }))
    }
}

fn run_discard(engine: &mut Engine) -> Result<Outcome, ReadError> {
    match engine.take_pending().flatten() {
        Some(_) => Ok(Outcome::Done(None)),
        None => Ok(Outcome::Push(Frame::dispatch("a discarded form"))),
    }
}

pub(crate) enum TaggedState {
    ScanningTag(Scanner),
    ReadingForm(Symbol),
}

impl TaggedState {
    fn run(&mut self, engine: &mut Engine, chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
        loop {
            match self {
                TaggedState::ScanningTag(scanner) => {
                    if scanner.resume(chars, pos) {
                        let token = std::mem::take(&mut scanner.buf);
                        let tag = parse_tag_symbol(&token)?;
                        *self = TaggedState::ReadingForm(tag);
                        continue;
                    }
                    return Ok(Outcome::Suspend);
                }
                TaggedState::ReadingForm(tag) => {
                    return match engine.take_pending().flatten() {
                        None => Ok(Outcome::Push(Frame::dispatch("a tagged literal's value"))),
                        Some(v) => Ok(Outcome::Done(Some(
                            engine.data_readers().read(tag.clone(), v)?,
                        ))),
                    };
                }
            }
        }
    }

    fn finalize_eof(self, engine: &mut Engine) -> Result<Outcome, ReadError> {
        match self {
            TaggedState::ScanningTag(_) => Err(ReadError::eof("a tagged literal's value")),
            TaggedState::ReadingForm(tag) => match engine.take_pending().flatten() {
                Some(v) => Ok(Outcome::Done(Some(engine.data_readers().read(tag, v)?))),
                None => Err(ReadError::eof("a tagged literal's value")),
            },
        }
    }
}

fn parse_tag_symbol(token: &str) -> Result<Symbol, ReadError> {
    if token.is_empty() || token.starts_with(':') {
        return Err(ReadError::new(ReadErrorKind::TagNotSymbol));
    }
    if token.contains('.') {
        return Err(ReadError::new(ReadErrorKind::TagContainsDot(
            token.to_string(),
        )));
    }
    match token.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
            Ok(Symbol::with_namespace(ns, name))
        }
        Some(_) => Err(ReadError::new(ReadErrorKind::MalformedToken(
            token.to_string(),
        ))),
        None => Ok(Symbol::new(token)),
    }
}

fn interpret_symbolic(token: &str) -> Result<Value, ReadError> {
    match token {
        "Inf" => Ok(Value::Float(ordered_float::OrderedFloat(f64::INFINITY))),
        "-Inf" => Ok(Value::Float(ordered_float::OrderedFloat(f64::NEG_INFINITY))),
        "NaN" => Ok(Value::Float(ordered_float::OrderedFloat(f64::NAN))),
        _ => Err(ReadError::new(ReadErrorKind::UnknownSymbolicValue(
            token.to_string(),
        ))),
    }
}

pub(crate) enum NamespacedMapState {
    AfterHash,
    AfterFirstColon,
    ScanningToken(Scanner, bool),
    ReadingMap(Option<Symbol>),
}

impl NamespacedMapState {
    fn new() -> Self {
        NamespacedMapState::AfterHash
    }

    fn run(&mut self, engine: &mut Engine, chars: &[char], pos: &mut usize) -> Result<Outcome, ReadError> {
        loop {
            match self {
                NamespacedMapState::AfterHash => {
                    if *pos >= chars.len() {
                        return Ok(Outcome::Suspend);
                    }
                    *pos += 1; // consume the ':' HashDispatch peeked
                    *self = NamespacedMapState::AfterFirstColon;
                }
                NamespacedMapState::AfterFirstColon => {
                    if *pos >= chars.len() {
                        return Ok(Outcome::Suspend);
                    }
                    let double_colon = chars[*pos] == ':';
                    if double_colon {
                        *pos += 1;
                    }
                    *self = NamespacedMapState::ScanningToken(Scanner::new(), double_colon);
                }
                NamespacedMapState::ScanningToken(scanner, double_colon) => {
                    if !scanner.resume(chars, pos) {
                        return Ok(Outcome::Suspend);
                    }
                    let token = std::mem::take(&mut scanner.buf);
                    let double_colon = *double_colon;
                    if token.contains('/') {
                        return Err(ReadError::new(ReadErrorKind::MalformedToken(token)));
                    }
                    let target = if double_colon {
                        if token.is_empty() {
                            None
                        } else {
                            let alias = Symbol::new(token.clone());
                            Some(engine.resolver().resolve_alias(&alias).ok_or_else(|| {
                                ReadError::new(ReadErrorKind::UnresolvableSymbol(token.clone()))
                            })?)
                        }
                    } else {
                        if token.is_empty() {
                            return Err(ReadError::new(ReadErrorKind::MalformedToken(
                                "expected a namespace after #:".to_string(),
                            )));
                        }
                        Some(Symbol::new(token))
                    };
                    *self = NamespacedMapState::ReadingMap(target);
                }
                NamespacedMapState::ReadingMap(target) => match engine.take_pending().flatten() {
                    None => {
                        if *pos >= chars.len() {
                            return Ok(Outcome::Suspend);
                        }
                        if chars[*pos] != '{' {
                            return Err(ReadError::new(ReadErrorKind::MalformedToken(
                                "expected { to start a namespaced map".to_string(),
                            )));
                        }
                        *pos += 1;
                        return Ok(Outcome::Push(Frame::Collection(CollectionState::new(
                            CollectionKind::Map,
                            '}',
                        ))));
                    }
                    Some(map_value) => {
                        return Ok(Outcome::Done(Some(rewrite_namespaced_map(
                            map_value,
                            target.clone(),
                            engine,
                        )?)));
                    }
                },
            }
        }
    }

    fn finalize_eof(self, engine: &mut Engine) -> Result<Outcome, ReadError> {
        match self {
            NamespacedMapState::ReadingMap(target) => match engine.take_pending().flatten() {
                Some(map_value) => Ok(Outcome::Done(Some(rewrite_namespaced_map(
                    map_value, target, engine,
                )?))),
                None => Err(ReadError::eof("a namespaced map")),
            },
            _ => Err(ReadError::eof("a namespaced map")),
        }
    }
}

fn rewrite_namespaced_map(
    map_value: Value,
    target: Option<Symbol>,
    engine: &Engine,
) -> Result<Value, ReadError> {
    let Value::Map(entries) = map_value else {
        return Err(ReadError::new(ReadErrorKind::MalformedToken(
            "namespaced map must be followed by a map literal".to_string(),
        )));
    };
    let ns_str: String = match target {
        Some(sym) => sym.name().to_string(),
        None => engine.resolver().current_namespace().name().to_string(),
    };
    let rewritten = entries
        .iter()
        .map(|(k, v)| (qualify_with_namespace(k, &ns_str), v.clone()))
        .collect();
    Ok(value::build_map(rewritten))
}

fn qualify_with_namespace(key: &Value, ns: &str) -> Value {
    match key {
        Value::Keyword(sym) if sym.namespace().is_none() => {
            if ns == "_" {
                key.clone()
            } else {
                Value::Keyword(Symbol::with_namespace(ns.to_string(), sym.name().to_string()))
            }
        }
        Value::Symbol(sym) if sym.namespace().is_none() => {
            if ns == "_" {
                key.clone()
            } else {
                Value::Symbol(Symbol::with_namespace(ns.to_string(), sym.name().to_string()))
            }
        }
        other => other.clone(),
    }
}

fn run_syntax_quote(gensyms: &mut GensymEnv, engine: &mut Engine) -> Result<Outcome, ReadError> {
    match engine.take_pending().flatten() {
        None => Ok(Outcome::Push(Frame::dispatch("a syntax-quoted form"))),
        Some(v) => {
            let expanded = syntax_quote::expand(&v, engine.resolver(), gensyms)?;
            Ok(Outcome::Done(Some(expanded)))
        }
    }
}
