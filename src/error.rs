use std::fmt;

/// A parse error produced by the reader.
///
/// The reader raises exactly one structured exception kind (format/parse
/// error), with [`ReadErrorKind::UnexpectedEof`] distinguished as its own
/// subkind because the streaming entry point needs to tell "malformed" apart
/// from "ran out of input mid-form".
#[derive(thiserror::Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
}

impl ReadError {
    pub(crate) fn new(kind: ReadErrorKind) -> Self {
        Self { kind }
    }

    pub(crate) fn eof(form: &'static str) -> Self {
        Self::new(ReadErrorKind::UnexpectedEof { form })
    }

    /// The kind of failure, for callers that want to match on it.
    pub fn kind(&self) -> &ReadErrorKind {
        &self.kind
    }
}

impl fmt::Debug for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The specific reason a read failed.
///
/// Every variant here corresponds to one of the error kinds enumerated for
/// the reader: unexpected EOF (with the form that was open), stray closing
/// delimiters, malformed tokens, bad escapes, bad character literals, odd
/// map arity, unsupported metadata targets, bad tags, unknown symbolic
/// values, gensyms/splices used outside their scope, and the refused
/// BigDecimal literal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadErrorKind {
    #[error("EOF while reading {form}")]
    UnexpectedEof { form: &'static str },

    #[error("unmatched delimiter: {0}")]
    StrayDelimiter(char),

    #[error("invalid token: {0}")]
    MalformedToken(String),

    #[error("invalid escape sequence: {0}")]
    InvalidEscape(String),

    #[error("invalid character literal: \\{0}")]
    InvalidCharLiteral(String),

    #[error("map literal must contain an even number of forms")]
    OddMapEntries,

    #[error(
        "metadata can only be applied to symbols, collections or similar reference types, not {0}"
    )]
    UnsupportedMetadataTarget(&'static str),

    #[error("metadata shorthand must be a keyword, symbol, string or map, got {0}")]
    InvalidMetadataShorthand(&'static str),

    #[error("reader tag must be a symbol")]
    TagNotSymbol,

    #[error("reader tag must not contain a period: {0}")]
    TagContainsDot(String),

    #[error("no reader function for tag {0}")]
    UnknownTag(String),

    #[error("unknown symbolic value: ##{0}")]
    UnknownSymbolicValue(String),

    #[error("gensym literal {0}# used outside syntax-quote")]
    GensymOutsideSyntaxQuote(String),

    #[error("unquote-splicing used outside a collection")]
    SpliceOutsideCollection,

    #[error("cannot resolve alias/class/var for symbol: {0}")]
    UnresolvableSymbol(String),

    #[error("BigDecimal literals are not supported")]
    BigDecimalUnsupported,

    #[error("EOF while reading")]
    EmptyInput,

    #[error("form reader popped a frame it did not push")]
    StackInvariantViolated,
}
