use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{DriverError, Result};

/// Close state shared down an ownership chain (connection -> statement -> cursor).
///
/// A handle counts as closed once its own flag or any ancestor's flag is set,
/// so closing a connection closes everything created from it.
#[derive(Debug, Clone)]
pub struct CloseFlag {
    chain: Vec<Arc<AtomicBool>>,
}

impl CloseFlag {
    pub fn new() -> Self {
        Self {
            chain: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// A new flag that also observes every flag above `self`.
    pub fn child(&self) -> Self {
        let mut chain = self.chain.clone();
        chain.push(Arc::new(AtomicBool::new(false)));
        Self { chain }
    }

    pub fn close(&self) {
        if let Some(own) = self.chain.last() {
            own.store(true, Ordering::Release);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.chain.iter().any(|flag| flag.load(Ordering::Acquire))
    }

    pub fn ensure_open(&self, what: &str) -> Result<()> {
        if self.is_closed() {
            return Err(DriverError::closed(what));
        }
        Ok(())
    }
}

impl Default for CloseFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_close_reaches_children() {
        let conn = CloseFlag::new();
        let stmt = conn.child();
        let cursor = stmt.child();

        assert!(!cursor.is_closed());
        conn.close();
        assert!(stmt.is_closed());
        assert!(cursor.is_closed());
    }

    #[test]
    fn test_child_close_does_not_reach_parent() {
        let conn = CloseFlag::new();
        let stmt = conn.child();
        let sibling = conn.child();

        stmt.close();
        assert!(stmt.is_closed());
        assert!(!conn.is_closed());
        assert!(!sibling.is_closed());
        assert!(stmt.ensure_open("Statement").is_err());
        assert!(sibling.ensure_open("Statement").is_ok());
    }
}
