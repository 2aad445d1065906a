//! The resumable engine: an explicit heap-allocated stack of [`Frame`]s
//! driven by [`Engine::advance`] (per spec.md §2's `advance(state, chunk,
//! from, to)`) and [`Engine::flush`] (its `flush(state)`). Every nested form
//! reader is a `Frame` value, never a native call frame, so reader depth is
//! bounded only by the heap (spec.md §1, §7: "10,000-deep nesting must not
//! overflow the native stack").
//!
//! See `frames.rs` for the frame definitions and their step logic, and
//! `DESIGN.md` for the control-flow discipline (`Outcome::{Suspend, Push,
//! Replace, Done}`) that makes the whole thing resumable without the
//! frames needing to know about each other.

mod frames;

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::data_readers::DataReaders;
use crate::error::{ReadError, ReadErrorKind};
use crate::resolver::{DefaultResolver, Resolver};
use crate::value::Value;

pub(crate) use frames::Frame;

/// What a frame's step produced.
pub(crate) enum Outcome {
    /// Out of input for now; the frame (already mutated in place) goes back
    /// on the stack unchanged in position.
    Suspend,
    /// Push a child frame on top; the frame goes back on the stack below it
    /// and will be re-invoked, via `Engine::pending`, once the child is done.
    Push(Frame),
    /// Tail-delegate: the frame is discarded and `Frame` takes its place.
    /// Used by dispatch frames that have no further work of their own once
    /// they've identified which reader to hand off to.
    Replace(Frame),
    /// The frame is finished. `None` means it produced no value (a comment
    /// or a discarded form) — its *parent* decides what that means.
    Done(Option<Value>),
}

enum StepResult {
    Suspended,
    Advanced,
}

/// The reader's state machine: an explicit parse stack plus the host
/// capabilities (resolver, data-reader table) every frame may consult.
pub struct Engine {
    stack: Vec<Frame>,
    pending: Option<Option<Value>>,
    output: VecDeque<Value>,
    resolver: Box<dyn Resolver>,
    data_readers: DataReaders,
}

impl Engine {
    pub(crate) fn new(resolver: Box<dyn Resolver>, data_readers: DataReaders) -> Self {
        Self {
            stack: Vec::new(),
            pending: None,
            output: VecDeque::new(),
            resolver,
            data_readers,
        }
    }

    pub(crate) fn with_default_resolver() -> Self {
        Self::new(Box::new(DefaultResolver::new()), DataReaders::new())
    }

    fn take_pending(&mut self) -> Option<Option<Value>> {
        self.pending.take()
    }

    /// Feed one chunk of already-decoded characters through the engine.
    /// Every value that completes before the chunk's end is enqueued; call
    /// [`Engine::drain`] to collect them.
    pub(crate) fn advance(&mut self, chars: &[char]) -> Result<(), ReadError> {
        let mut pos = 0usize;
        loop {
            if self.stack.is_empty() {
                if pos >= chars.len() {
                    break;
                }
                self.stack.push(Frame::top_level());
            }
            match self.step(chars, &mut pos)? {
                StepResult::Suspended => break,
                StepResult::Advanced => continue,
            }
        }
        Ok(())
    }

    /// Like `advance`, but stops as soon as one value has been produced,
    /// ignoring the rest of `chars` — used by the synchronous "read one
    /// form, ignore trailing input" entry point.
    pub(crate) fn advance_until_one_value(&mut self, chars: &[char]) -> Result<(), ReadError> {
        let mut pos = 0usize;
        loop {
            if !self.output.is_empty() {
                break;
            }
            if self.stack.is_empty() {
                if pos >= chars.len() {
                    break;
                }
                self.stack.push(Frame::top_level());
            }
            match self.step(chars, &mut pos)? {
                StepResult::Suspended => break,
                StepResult::Advanced => continue,
            }
        }
        Ok(())
    }

    /// EOF: drive every still-open frame to completion or error.
    pub(crate) fn flush(&mut self) -> Result<(), ReadError> {
        while let Some(frame) = self.stack.pop() {
            let outcome = frame.finalize_eof(self).map_err(|err| {
                debug!(kind = ?err.kind(), "reader failed at end of input");
                err
            })?;
            match outcome {
                Outcome::Done(value) => {
                    if self.stack.is_empty() {
                        if let Some(v) = value {
                            self.output.push_back(v);
                        }
                    } else {
                        self.pending = Some(value);
                    }
                }
                Outcome::Suspend | Outcome::Push(_) | Outcome::Replace(_) => {
                    return Err(ReadError::new(ReadErrorKind::StackInvariantViolated));
                }
            }
        }
        Ok(())
    }

    fn step(&mut self, chars: &[char], pos: &mut usize) -> Result<StepResult, ReadError> {
        let mut frame = self.stack.pop().expect("step called with nonempty stack");
        let outcome = frame.run(self, chars, pos).map_err(|err| {
            debug!(kind = ?err.kind(), depth = self.stack.len(), "reader failed");
            err
        })?;
        match outcome {
            Outcome::Suspend => {
                trace!(depth = self.stack.len() + 1, "reader suspended, awaiting more input");
                self.stack.push(frame);
                Ok(StepResult::Suspended)
            }
            Outcome::Push(child) => {
                self.stack.push(frame);
                self.stack.push(child);
                Ok(StepResult::Advanced)
            }
            Outcome::Replace(next) => {
                self.stack.push(next);
                Ok(StepResult::Advanced)
            }
            Outcome::Done(value) => {
                if self.stack.is_empty() {
                    if let Some(v) = value {
                        trace!(kind = v.kind_name(), "reader produced a value");
                        self.output.push_back(v);
                    }
                } else {
                    self.pending = Some(value);
                }
                Ok(StepResult::Advanced)
            }
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<Value> {
        self.output.drain(..).collect()
    }

    pub(crate) fn take_one(&mut self) -> Option<Value> {
        self.output.pop_front()
    }

    pub(crate) fn is_quiescent(&self) -> bool {
        self.stack.is_empty()
    }

    pub(crate) fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    pub(crate) fn data_readers(&self) -> &DataReaders {
        &self.data_readers
    }
}
