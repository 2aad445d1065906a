//! The data-reader table: user-registered tag handlers, consulted by the
//! tagged-literal form reader. Building/discovering this table (a registry
//! keyed by classpath scanning, file metadata, etc.) is out of scope — the
//! reader only consumes whatever table the host hands it.

use std::collections::HashMap;

use triomphe::Arc;

use crate::error::{ReadError, ReadErrorKind};
use crate::value::{Symbol, Value};

type TagFn = Arc<dyn Fn(Value) -> Result<Value, ReadError> + Send + Sync>;
type DefaultTagFn = Arc<dyn Fn(Symbol, Value) -> Result<Value, ReadError> + Send + Sync>;

/// Tag -> handler lookups for `#tag form` tagged literals.
///
/// Lookup order (per spec.md §4.3): the host-supplied table, then the
/// built-in table (empty by default — see `SPEC_FULL.md`), then the
/// host-supplied default handler. If none apply, reading errors.
#[derive(Clone, Default)]
pub struct DataReaders {
    table: HashMap<Symbol, TagFn>,
    default: Option<DefaultTagFn>,
}

impl DataReaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `tag`.
    pub fn register(
        &mut self,
        tag: Symbol,
        handler: impl Fn(Value) -> Result<Value, ReadError> + Send + Sync + 'static,
    ) {
        self.table.insert(tag, Arc::new(handler));
    }

    /// Install a fallback handler for tags with no specific registration.
    pub fn set_default(
        &mut self,
        handler: impl Fn(Symbol, Value) -> Result<Value, ReadError> + Send + Sync + 'static,
    ) {
        self.default = Some(Arc::new(handler));
    }

    /// Resolve `tag` against a payload `value`, per the lookup order above.
    pub(crate) fn read(&self, tag: Symbol, value: Value) -> Result<Value, ReadError> {
        if let Some(handler) = self.table.get(&tag) {
            return handler(value);
        }
        if let Some(builtin) = built_in(&tag) {
            return builtin(value);
        }
        if let Some(default) = &self.default {
            return default(tag, value);
        }
        Err(ReadError::new(ReadErrorKind::UnknownTag(tag.to_string())))
    }
}

/// The built-in tag table. Empty: this crate recognizes no tags itself, so
/// that it stays decoupled from any calendar/UUID crate (see `SPEC_FULL.md`
/// "Built-in tagged literals"). Hosts register `#inst`/`#uuid`/etc. via
/// [`DataReaders::register`].
fn built_in(_tag: &Symbol) -> Option<fn(Value) -> Result<Value, ReadError>> {
    None
}
