//! Forward pre-hooks
//!
//! A module owns a [`ForwardHooks`] table; [`Module::call`](super::Module::call)
//! runs every registered hook before `forward`. Registration hands back a
//! [`HookHandle`] that is the only way to remove the hook again.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Callback run immediately before a module's forward pass
pub trait ForwardPreHook {
    /// Invoked once per forward call, before any computation
    fn before_forward(&self);
}

#[derive(Default)]
struct HookTable {
    next_id: u64,
    hooks: Vec<(u64, Rc<dyn ForwardPreHook>)>,
}

/// Shared table of forward pre-hooks attached to one module
///
/// Clones refer to the same table.
#[derive(Clone, Default)]
pub struct ForwardHooks {
    table: Rc<RefCell<HookTable>>,
}

impl ForwardHooks {
    /// Create an empty hook table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, returning the handle that removes it
    pub fn register(&self, hook: Rc<dyn ForwardPreHook>) -> HookHandle {
        let mut table = self.table.borrow_mut();
        let id = table.next_id;
        table.next_id += 1;
        table.hooks.push((id, hook));
        HookHandle {
            id,
            table: Rc::downgrade(&self.table),
        }
    }

    /// Run every registered hook in registration order
    pub fn run(&self) {
        // Snapshot so a hook may touch the table without a borrow conflict
        let hooks: Vec<Rc<dyn ForwardPreHook>> =
            self.table.borrow().hooks.iter().map(|(_, h)| Rc::clone(h)).collect();
        for hook in hooks {
            hook.before_forward();
        }
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.table.borrow().hooks.len()
    }

    /// Whether no hook is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ForwardHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardHooks").field("len", &self.len()).finish()
    }
}

/// Registration token for one hook
///
/// Dropping the handle leaves the hook installed; call [`HookHandle::remove`].
#[derive(Debug)]
pub struct HookHandle {
    id: u64,
    table: Weak<RefCell<HookTable>>,
}

impl HookHandle {
    /// Unregister the hook
    ///
    /// Returns `false` if the hook was already gone or its module was dropped.
    pub fn remove(self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.borrow_mut();
        let before = table.hooks.len();
        table.hooks.retain(|(id, _)| *id != self.id);
        table.hooks.len() != before
    }
}
