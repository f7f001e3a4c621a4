//! Render generations per named target
//!
//! Every render of a target begins a new generation; the previous token for
//! that target stops being current at that instant. Counters only grow.

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderToken(u64);

impl RenderToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RenderGenerations {
    current: RefCell<HashMap<String, u64>>,
}

impl RenderGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede any in-flight render of `target` and return the new token
    pub fn begin_generation(&self, target: &str) -> RenderToken {
        let mut current = self.current.borrow_mut();
        let counter = current.entry(target.to_string()).or_insert(0);
        *counter += 1;
        RenderToken(*counter)
    }

    pub fn is_current(&self, target: &str, token: RenderToken) -> bool {
        self.current.borrow().get(target) == Some(&token.0)
    }

    /// Supersede the in-flight render of `target` without starting a new one
    pub fn cancel(&self, target: &str) {
        self.begin_generation(target);
    }

    pub fn current(&self, target: &str) -> Option<RenderToken> {
        self.current.borrow().get(target).copied().map(RenderToken)
    }
}
