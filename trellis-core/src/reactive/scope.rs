//! Ownership Scopes
//!
//! A scope collects the cleanup work of everything created while it is
//! current: effects register their cancellation, signals their cleanup, and
//! user code arbitrary callbacks through [`on_cleanup`]. Disposing a scope
//! runs all of it exactly once.
//!
//! Scopes nest. A child is owned by its parent and disposed with it; a
//! child disposed on its own detaches from the parent. Every effect run
//! gets a fresh child scope of the effect's owner, which is what makes
//! effects created inside another effect go away when the outer one
//! re-runs. The keyed list gives every item its own scope, so removing a
//! key tears down everything that item rendered.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

type Disposer = Box<dyn FnOnce()>;

/// Handle to a disposer registered on a scope, for
/// [`Scope::remove_disposer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisposerId(u64);

/// Unique identifier for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct ScopeInner {
    id: ScopeId,
    disposers: RefCell<SmallVec<[(DisposerId, Disposer); 2]>>,
    next_disposer: Cell<u64>,
    children: RefCell<IndexMap<ScopeId, Scope>>,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    disposed: Cell<bool>,
}

impl ScopeInner {
    /// Dispose children, then run disposers. Returns false if already disposed.
    fn teardown(&self) -> bool {
        if self.disposed.replace(true) {
            return false;
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for (_, child) in children {
            child.dispose();
        }

        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for (_, disposer) in disposers {
            disposer();
        }
        true
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A disposable ownership container.
///
/// Cloning a `Scope` produces another handle to the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

/// A non-owning handle to a scope.
#[derive(Clone)]
pub struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    /// Get a strong handle if the scope is still alive.
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(|inner| Scope { inner })
    }
}

impl Scope {
    /// Create a scope, optionally owned by `parent`.
    ///
    /// A scope created under an already disposed parent starts disposed.
    pub fn new(parent: Option<&Scope>) -> Self {
        let scope = Self {
            inner: Rc::new(ScopeInner {
                id: ScopeId::next(),
                disposers: RefCell::new(SmallVec::new()),
                next_disposer: Cell::new(0),
                children: RefCell::new(IndexMap::new()),
                parent: RefCell::new(None),
                disposed: Cell::new(false),
            }),
        };

        if let Some(parent) = parent {
            if parent.is_disposed() {
                scope.inner.disposed.set(true);
            } else {
                *scope.inner.parent.borrow_mut() = Some(Rc::downgrade(&parent.inner));
                parent
                    .inner
                    .children
                    .borrow_mut()
                    .insert(scope.id(), scope.clone());
            }
        }

        scope
    }

    /// Create a scope with no parent.
    pub fn root() -> Self {
        Self::new(None)
    }

    /// Create a child of this scope.
    pub fn child(&self) -> Self {
        Self::new(Some(self))
    }

    /// The scope currently collecting disposers, if any.
    pub fn current() -> Option<Scope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Get the scope's unique ID.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Get a non-owning handle.
    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.inner))
    }

    /// Run `f` with this scope as the current owner.
    ///
    /// The previous owner is restored when `f` returns or panics.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _restore = PopScope;
        f()
    }

    /// Register a callback to run when this scope is disposed.
    ///
    /// On an already disposed scope the callback runs immediately.
    pub fn on_dispose(&self, disposer: impl FnOnce() + 'static) -> DisposerId {
        let id = DisposerId(self.inner.next_disposer.get());
        self.inner.next_disposer.set(id.0 + 1);

        if self.is_disposed() {
            disposer();
        } else {
            self.inner.disposers.borrow_mut().push((id, Box::new(disposer)));
        }
        id
    }

    /// Drop a registered disposer without running it. Returns `false` if it
    /// already ran or was removed.
    pub fn remove_disposer(&self, id: DisposerId) -> bool {
        let removed = {
            let mut disposers = self.inner.disposers.borrow_mut();
            let index = disposers.iter().position(|(entry, _)| *entry == id);
            index.map(|index| disposers.remove(index))
        };
        removed.is_some()
    }

    /// Dispose the scope: children first, then every disposer exactly once,
    /// then detach from the parent. Disposing twice is a no-op.
    pub fn dispose(&self) {
        if !self.inner.teardown() {
            return;
        }

        let parent = self.inner.parent.borrow_mut().take();
        if let Some(parent) = parent.and_then(|weak| weak.upgrade()) {
            parent.children.borrow_mut().swap_remove(&self.id());
        }
    }

    /// Check if the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Number of registered disposers.
    pub fn disposer_count(&self) -> usize {
        self.inner.disposers.borrow().len()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("children", &self.child_count())
            .field("disposers", &self.disposer_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct PopScope;

impl Drop for PopScope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| stack.borrow_mut().pop());
    }
}

/// Register `f` on the current scope.
///
/// Returns `false` (and drops `f` without running it) when no scope is
/// current.
pub fn on_cleanup(f: impl FnOnce() + 'static) -> bool {
    match Scope::current() {
        Some(scope) => {
            scope.on_dispose(f);
            true
        }
        None => false,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
