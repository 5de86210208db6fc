//! Delegate cells: named entry points whose implementation can be bound
//! before or after an observer is attached.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};

/// Side-effecting callback run before the delegate on every invocation.
pub type Observer<A> = Arc<dyn Fn(&A) -> Result<()> + Send + Sync>;

type DelegateFn<A, R> = dyn Fn(A) -> R + Send + Sync;

// ---------------------------------------------------------------------------
// HookFn
// ---------------------------------------------------------------------------

/// An implementation that can be bound into a [`HookCell`].
///
/// Handles produced by [`HookCell::as_fn`] carry a wrapper marker naming the
/// cell they came from, so binding a cell's own handle back into it is
/// recognised instead of nesting.
pub struct HookFn<A, R> {
    f: Arc<DelegateFn<A, R>>,
    wrapper_of: Option<Weak<CellInner<A, R>>>,
}

impl<A, R> HookFn<A, R> {
    pub fn new(f: impl Fn(A) -> R + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f), wrapper_of: None }
    }

    pub fn call(&self, args: A) -> R {
        (self.f)(args)
    }

    /// `true` for handles produced by [`HookCell::as_fn`].
    pub fn is_wrapper(&self) -> bool {
        self.wrapper_of.is_some()
    }

    fn wraps(&self, inner: &Arc<CellInner<A, R>>) -> bool {
        self.wrapper_of
            .as_ref()
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(inner)))
    }
}

impl<A, R> Clone for HookFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
            wrapper_of: self.wrapper_of.clone(),
        }
    }
}

impl<A, R> std::fmt::Debug for HookFn<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookFn").field("is_wrapper", &self.is_wrapper()).finish()
    }
}

// ---------------------------------------------------------------------------
// HookCell
// ---------------------------------------------------------------------------

struct CellInner<A, R> {
    name: &'static str,
    delegate: RwLock<Option<HookFn<A, R>>>,
    observer: OnceCell<Observer<A>>,
    announced: AtomicBool,
    observer_failures: AtomicU64,
}

impl<A, R: Default> CellInner<A, R> {
    fn invoke(&self, args: A) -> R {
        if let Some(observer) = self.observer.get() {
            self.notify(observer, &args);
        }
        // Clone out of the lock so the delegate may rebind this hook.
        let current = self
            .delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match current {
            Some(delegate) => delegate.call(args),
            None => R::default(),
        }
    }

    fn notify(&self, observer: &Observer<A>, args: &A) {
        let outcome = catch_unwind(AssertUnwindSafe(|| observer(args)));
        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(payload) => BridgeError::Observer {
                hook: self.name.to_string(),
                detail: panic_detail(payload.as_ref()),
            },
        };
        self.observer_failures.fetch_add(1, Ordering::Relaxed);
        warn!(hook = self.name, error = %failure, "hook observer failed, delegate still runs");
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// A named entry point with a swappable implementation and at most one
/// observer.
///
/// Invoking the cell runs the observer (if any), then whatever delegate is
/// bound at call time, returning the delegate's result untouched. An unbound
/// cell behaves as a no-op returning `R::default()`. Clones share state.
pub struct HookCell<A, R> {
    inner: Arc<CellInner<A, R>>,
}

impl<A, R> Clone for HookCell<A, R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<A: 'static, R: Default + 'static> HookCell<A, R> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(CellInner {
                name,
                delegate: RwLock::new(None),
                observer: OnceCell::new(),
                announced: AtomicBool::new(false),
                observer_failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Run the observer, then the current delegate.
    pub fn invoke(&self, args: A) -> R {
        self.inner.invoke(args)
    }

    /// Bind (or replace) the implementation.
    ///
    /// Binding this cell's own [`as_fn`](Self::as_fn) handle is ignored so a
    /// cell never delegates to itself.
    pub fn bind(&self, f: HookFn<A, R>) {
        if f.wraps(&self.inner) {
            debug!(hook = self.inner.name, "ignoring rebind of hook to its own wrapper");
            return;
        }
        *self
            .inner
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(f);
        if self.is_intercepted() {
            self.announce_wrap();
        }
    }

    /// Clear the implementation. Returns whether one was bound.
    pub fn unbind(&self) -> bool {
        self.inner
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Attach the observer. Only the first call takes effect; later calls
    /// return `false` and leave the existing observer in place.
    pub fn intercept(&self, observer: Observer<A>) -> bool {
        if self.inner.observer.set(observer).is_err() {
            debug!(hook = self.inner.name, "hook already intercepted");
            return false;
        }
        if self.is_bound() {
            self.announce_wrap();
        }
        true
    }

    /// A bindable handle that invokes this cell.
    pub fn as_fn(&self) -> HookFn<A, R> {
        let weak = Arc::downgrade(&self.inner);
        let target = weak.clone();
        HookFn {
            f: Arc::new(move |args: A| match target.upgrade() {
                Some(inner) => inner.invoke(args),
                None => R::default(),
            }),
            wrapper_of: Some(weak),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inner
            .delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn is_intercepted(&self) -> bool {
        self.inner.observer.get().is_some()
    }

    /// Observer errors and panics caught so far.
    pub fn observer_failures(&self) -> u64 {
        self.inner.observer_failures.load(Ordering::Relaxed)
    }

    fn announce_wrap(&self) {
        if !self.inner.announced.swap(true, Ordering::Relaxed) {
            info!(hook = self.inner.name, "wrapped hook");
        }
    }
}

impl<A, R> std::fmt::Debug for HookCell<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookCell")
            .field("name", &self.inner.name)
            .field("intercepted", &self.inner.observer.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_observer(count: &Arc<AtomicUsize>) -> Observer<i64> {
        let count = Arc::clone(count);
        Arc::new(move |_: &i64| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_unbound_cell_returns_default() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        assert_eq!(cell.invoke(3), 0);
        assert!(!cell.is_bound());
    }

    #[test]
    fn test_bound_cell_delegates() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        cell.bind(HookFn::new(|x: i64| x * 2));
        assert_eq!(cell.invoke(21), 42);
    }

    #[test]
    fn test_wrap_existing_fires_observer_then_delegates() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        cell.bind(HookFn::new(|x: i64| x + 1));
        let count = Arc::new(AtomicUsize::new(0));
        assert!(cell.intercept(counting_observer(&count)));
        assert_eq!(cell.invoke(1), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_binding_is_observed() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        let count = Arc::new(AtomicUsize::new(0));
        cell.intercept(counting_observer(&count));
        cell.bind(HookFn::new(|x: i64| x));
        cell.invoke(1);
        cell.bind(HookFn::new(|x: i64| -x));
        assert_eq!(cell.invoke(5), -5);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_observer_fires_even_when_unbound() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        let count = Arc::new(AtomicUsize::new(0));
        cell.intercept(counting_observer(&count));
        cell.invoke(0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_intercept_rejected() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        assert!(cell.intercept(counting_observer(&first)));
        assert!(!cell.intercept(counting_observer(&second)));
        cell.invoke(0);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_binding_own_wrapper_does_not_nest() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        cell.bind(HookFn::new(|x: i64| x + 100));
        let count = Arc::new(AtomicUsize::new(0));
        cell.intercept(counting_observer(&count));

        let handle = cell.as_fn();
        assert!(handle.is_wrapper());
        cell.bind(handle.clone());
        cell.bind(handle);

        assert_eq!(cell.invoke(1), 101);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_binding_other_cells_wrapper_chains_once() {
        let outer: HookCell<i64, i64> = HookCell::new("outer");
        let inner: HookCell<i64, i64> = HookCell::new("inner");
        inner.bind(HookFn::new(|x: i64| x * 3));
        outer.bind(inner.as_fn());
        assert_eq!(outer.invoke(2), 6);
    }

    #[test]
    fn test_unbind_clears_delegate() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        cell.bind(HookFn::new(|x: i64| x));
        assert!(cell.unbind());
        assert!(!cell.unbind());
        assert_eq!(cell.invoke(9), 0);
    }

    #[test]
    fn test_observer_error_isolated() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        cell.bind(HookFn::new(|x: i64| x * 10));
        cell.intercept(Arc::new(|_: &i64| {
            Err(BridgeError::Observer { hook: "h".into(), detail: "boom".into() })
        }));
        assert_eq!(cell.invoke(4), 40);
        assert_eq!(cell.observer_failures(), 1);
    }

    #[test]
    fn test_observer_panic_isolated() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        cell.bind(HookFn::new(|x: i64| x - 1));
        cell.intercept(Arc::new(|_: &i64| -> Result<()> { panic!("observer exploded") }));
        assert_eq!(cell.invoke(10), 9);
        assert_eq!(cell.invoke(1), 0);
        assert_eq!(cell.observer_failures(), 2);
    }

    #[test]
    fn test_receiver_and_return_preserved() {
        struct Player {
            name: &'static str,
        }
        let cell: HookCell<(Arc<Player>, u32), String> = HookCell::new("h");
        cell.bind(HookFn::new(|(this, n): (Arc<Player>, u32)| format!("{}:{n}", this.name)));
        cell.intercept(Arc::new(|_: &(Arc<Player>, u32)| Ok(())));
        let me = Arc::new(Player { name: "ava" });
        assert_eq!(cell.invoke((Arc::clone(&me), 3)), "ava:3");
    }

    #[test]
    fn test_delegate_may_rebind_its_own_hook() {
        let cell: HookCell<i64, i64> = HookCell::new("h");
        let handle = cell.clone();
        cell.bind(HookFn::new(move |x: i64| {
            handle.bind(HookFn::new(|y: i64| y + 1000));
            x
        }));
        assert_eq!(cell.invoke(1), 1);
        assert_eq!(cell.invoke(1), 1001);
    }

    #[test]
    fn test_handle_to_dropped_cell_returns_default() {
        let handle = {
            let cell: HookCell<i64, i64> = HookCell::new("h");
            cell.bind(HookFn::new(|x: i64| x));
            cell.as_fn()
        };
        assert_eq!(handle.call(5), 0);
    }
}
