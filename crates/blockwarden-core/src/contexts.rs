//! Browsing-context enumeration and control.
//!
//! The enforcement side effect is "close every open context whose URL is
//! blocked and not exempt". The host environment supplies the real
//! implementation; `FakeContexts` scripts one for tests and `NoopContexts`
//! stands in where no host is attached (the bare daemon).

use std::collections::HashSet;
use std::sync::Mutex;

use thiserror::Error;

/// One open browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenContext {
    pub id: u64,
    pub url: String,
}

#[derive(Error, Debug)]
pub enum ContextError {
    /// The context disappeared before it could be closed.
    #[error("context {0} is gone")]
    Gone(u64),
    /// Host-side failure.
    #[error("{0}")]
    Host(String),
}

/// Host capability: enumerate and close open browsing contexts.
pub trait ContextHost: Send + Sync {
    fn enumerate(&self) -> Vec<OpenContext>;
    fn close(&self, id: u64) -> Result<(), ContextError>;
}

/// Host stub for embedders without a browsing surface.
pub struct NoopContexts;

impl ContextHost for NoopContexts {
    fn enumerate(&self) -> Vec<OpenContext> {
        Vec::new()
    }

    fn close(&self, _id: u64) -> Result<(), ContextError> {
        Ok(())
    }
}

/// Scriptable context host for tests: seed open contexts, observe closes,
/// and inject close failures per id.
#[derive(Default)]
pub struct FakeContexts {
    open: Mutex<Vec<OpenContext>>,
    closed: Mutex<Vec<u64>>,
    fail_once: Mutex<HashSet<u64>>,
    fail_always: Mutex<HashSet<u64>>,
    next_id: Mutex<u64>,
}

impl FakeContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a context on `url`, returning its id.
    pub fn add(&self, url: &str) -> u64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = *next;
        self.open.lock().unwrap().push(OpenContext {
            id,
            url: url.to_string(),
        });
        id
    }

    /// Ids closed so far, in order.
    pub fn closed(&self) -> Vec<u64> {
        self.closed.lock().unwrap().clone()
    }

    /// Make the first close attempt for `id` fail.
    pub fn fail_once(&self, id: u64) {
        self.fail_once.lock().unwrap().insert(id);
    }

    /// Make every close attempt for `id` fail.
    pub fn fail_always(&self, id: u64) {
        self.fail_always.lock().unwrap().insert(id);
    }

    /// Whether the context is still open.
    pub fn is_open(&self, id: u64) -> bool {
        self.open.lock().unwrap().iter().any(|c| c.id == id)
    }
}

impl ContextHost for FakeContexts {
    fn enumerate(&self) -> Vec<OpenContext> {
        self.open.lock().unwrap().clone()
    }

    fn close(&self, id: u64) -> Result<(), ContextError> {
        if self.fail_always.lock().unwrap().contains(&id) {
            return Err(ContextError::Host(format!("scripted failure for {id}")));
        }
        if self.fail_once.lock().unwrap().remove(&id) {
            return Err(ContextError::Host(format!("scripted failure for {id}")));
        }
        let mut open = self.open.lock().unwrap();
        let before = open.len();
        open.retain(|c| c.id != id);
        if open.len() == before {
            return Err(ContextError::Gone(id));
        }
        self.closed.lock().unwrap().push(id);
        Ok(())
    }
}
