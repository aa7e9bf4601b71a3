//! Handle scopes: LIFO lifetime regions over the per-Env slot table.
//!
//! Opening a scope marks the current end of the slot list; closing it drops
//! every persistent handle recorded since (the "free" half of the
//! dup-on-create/free-on-close discipline), leaving enclosing scopes
//! untouched. An escapable scope may promote exactly one value into the
//! enclosing region before it closes.

use crate::abi::{AbiResult, EscapableHandleScope, HandleScope, Status, Value};

use super::env::{Env, ScopeRecord};

impl Env {
    /// Opens a handle scope. Every value-producing ABI call records its
    /// result in the innermost open scope.
    pub fn open_handle_scope(&self) -> HandleScope {
        HandleScope {
            depth: self.open_scope(false),
        }
    }

    /// Closes a handle scope, releasing engine ownership of every value
    /// recorded since it was opened. Scopes must close in LIFO order;
    /// closing anything but the innermost scope (or closing a scope of the
    /// wrong kind) fails with `HandleScopeMismatch`.
    pub fn close_handle_scope(&self, scope: HandleScope) -> AbiResult<()> {
        self.close_scope(scope.depth, false)
    }

    /// Opens an escapable handle scope.
    pub fn open_escapable_handle_scope(&self) -> EscapableHandleScope {
        EscapableHandleScope {
            depth: self.open_scope(true),
        }
    }

    pub fn close_escapable_handle_scope(&self, scope: EscapableHandleScope) -> AbiResult<()> {
        self.close_scope(scope.depth, true)
    }

    /// Promotes one value out of the innermost (escapable) scope into the
    /// immediately enclosing one, so it survives the scope's closure. The
    /// escapee is duplicated into a fresh slot placed just before the
    /// scope's start; the scope's own range shifts up by one to compensate.
    /// Allowed once per scope.
    pub fn escape_handle(
        &self,
        scope: &EscapableHandleScope,
        escapee: Value,
    ) -> AbiResult<Value> {
        self.check_thread();
        let start = {
            let inner = self.inner.borrow();
            if inner.scopes.len() != scope.depth {
                return Err(Status::HandleScopeMismatch);
            }
            let record = inner.scopes.last().ok_or(Status::HandleScopeMismatch)?;
            if !record.escapable {
                return Err(Status::HandleScopeMismatch);
            }
            if record.escaped {
                return Err(Status::EscapeCalledTwice);
            }
            record.start
        };

        let dup = self.dup_global(escapee)?;

        let mut inner = self.inner.borrow_mut();
        let id = inner.next_value_id;
        inner.next_value_id += 1;
        inner.slots.insert(id, dup);
        inner.entries.insert(start, id);

        let record = inner.scopes.last_mut().expect("scope checked above");
        record.start = start + 1;
        record.escaped = true;
        Ok(Value(id))
    }

    fn open_scope(&self, escapable: bool) -> usize {
        self.check_thread();
        let mut inner = self.inner.borrow_mut();
        let start = inner.entries.len();
        inner.scopes.push(ScopeRecord {
            start,
            escapable,
            escaped: false,
        });
        inner.scopes.len()
    }

    fn close_scope(&self, depth: usize, escapable: bool) -> AbiResult<()> {
        self.check_thread();
        let mut inner = self.inner.borrow_mut();
        if inner.scopes.len() != depth {
            return Err(Status::HandleScopeMismatch);
        }
        let record = inner.scopes.last().ok_or(Status::HandleScopeMismatch)?;
        if record.escapable != escapable {
            return Err(Status::HandleScopeMismatch);
        }
        let start = record.start;

        // Dropping the persistent handles releases engine ownership of
        // exactly this scope's range.
        let ids = inner.entries.split_off(start);
        for id in ids {
            inner.slots.remove(&id);
        }
        inner.scopes.pop();
        Ok(())
    }
}
