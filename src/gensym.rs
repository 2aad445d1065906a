//! A process-wide monotonic counter backing the auto-generated parameter
//! names of anonymous-fn literals (`p1__<n>__auto__`). Kept separate from
//! `syntax_quote`'s own gensym counter so the two generated-name kinds
//! never look alike, even though neither can collide with the other by
//! construction (different name shapes).

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
