// src/store/mod.rs

//! The `Store`: a single mutable cell holding the immutable [`State`],
//! with change notification and plugin event dispatch.
//!
//! The store also carries the collaborator handles (snapshot backend, VCS
//! plumbing) so that every component receives its dependencies through one
//! explicitly constructed context instead of process-wide globals. Tests
//! substitute the collaborators with recording stubs.
//!
//! Everything here is single-threaded and synchronous: callbacks and plugin
//! handlers run on the calling thread, in registration order. A callback
//! that sets the state again triggers another round of callbacks
//! re-entrantly; guarding against infinite recursion is the caller's
//! responsibility.

pub mod event;
pub mod state;

pub use event::{Event, Plugin};
pub use state::State;

use crate::error::{Error, Result};
use crate::snapshots::{SnapperCli, SnapshotBackend};
use crate::vcs::{GitCli, Vcs};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Change-notification callback, invoked with `(old_state, new_state)`
pub type Callback = dyn Fn(&State, &State) -> Result<()>;

/// Token identifying a subscription, for [`Store::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(u64);

pub struct Store {
    state: RefCell<Rc<State>>,
    callbacks: RefCell<Vec<(CallbackId, Rc<Callback>)>>,
    plugins: RefCell<Vec<Rc<dyn Plugin>>>,
    next_callback: Cell<u64>,

    /// Snapshot backend (snapper in production)
    pub snapshots: Rc<dyn SnapshotBackend>,
    /// VCS plumbing (git in production)
    pub vcs: Rc<dyn Vcs>,
}

impl Store {
    /// Create a store wired to the production collaborators
    pub fn new(state: State) -> Self {
        Self::with_backends(state, Rc::new(SnapperCli::new()), Rc::new(GitCli::new()))
    }

    /// Create a store with explicit collaborators (the seam tests use)
    pub fn with_backends(
        state: State,
        snapshots: Rc<dyn SnapshotBackend>,
        vcs: Rc<dyn Vcs>,
    ) -> Self {
        Self {
            state: RefCell::new(Rc::new(state)),
            callbacks: RefCell::new(Vec::new()),
            plugins: RefCell::new(Vec::new()),
            next_callback: Cell::new(0),
            snapshots,
            vcs,
        }
    }

    /// The current state snapshot
    pub fn state(&self) -> Rc<State> {
        self.state.borrow().clone()
    }

    /// Replace the state and notify every subscriber with `(old, new)`.
    ///
    /// Callbacks run in subscription order; the first error aborts the
    /// remaining notifications and propagates.
    pub fn set_state(&self, state: State) -> Result<()> {
        let new = Rc::new(state);
        let old = self.state.replace(new.clone());
        // Snapshot the callback list so a callback may subscribe or set
        // state again without holding a borrow
        let callbacks: Vec<Rc<Callback>> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            (*callback)(&old, &new)?;
        }
        Ok(())
    }

    /// Subscribe a change callback; returns a token for `unsubscribe`
    pub fn subscribe<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&State, &State) -> Result<()> + 'static,
    {
        let id = CallbackId(self.next_callback.get());
        self.next_callback.set(id.0 + 1);
        self.callbacks.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Remove a subscription; fails with `NotSubscribed` for unknown tokens
    pub fn unsubscribe(&self, id: CallbackId) -> Result<()> {
        let mut callbacks = self.callbacks.borrow_mut();
        let position = callbacks
            .iter()
            .position(|(candidate, _)| *candidate == id)
            .ok_or(Error::NotSubscribed)?;
        callbacks.remove(position);
        Ok(())
    }

    /// Register a plugin. Plugins are only ever added, never removed.
    pub fn add_plugin(&self, plugin: Rc<dyn Plugin>) {
        self.plugins.borrow_mut().push(plugin);
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.borrow().len()
    }

    /// Dispatch an event to every registered plugin, in registration order.
    /// An error from one plugin aborts dispatch to the remaining plugins.
    pub fn dispatch(&self, event: Event) -> Result<()> {
        debug!(?event, "dispatching event");
        let plugins: Vec<Rc<dyn Plugin>> = self.plugins.borrow().iter().cloned().collect();
        for plugin in plugins {
            plugin.handle(self, &event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::package::PackageConfig;
    use std::path::PathBuf;

    fn state() -> State {
        let config = Config::from_toml(
            "package_dir = \"/path/to/package_dir\"\n[btrfs]\nsnapper_configs = [\"root\"]\n",
        )
        .unwrap();
        State::new(
            config,
            PathBuf::from("test"),
            PackageConfig::new("test", Some("my cool description")),
        )
    }

    struct NoopPlugin;

    impl Plugin for NoopPlugin {
        fn handle(&self, _store: &Store, _event: &Event) -> Result<()> {
            Ok(())
        }
    }

    struct RecordingPlugin {
        label: &'static str,
        seen: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl Plugin for RecordingPlugin {
        fn handle(&self, _store: &Store, _event: &Event) -> Result<()> {
            self.seen.borrow_mut().push(self.label);
            if self.fail {
                Err(Error::other("boom"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_state_setter_notifies_subscriber() {
        let store = Store::new(state());
        let seen: Rc<RefCell<Vec<(State, State)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |old, new| {
            sink.borrow_mut().push((old.clone(), new.clone()));
            Ok(())
        });

        let old = store.state();
        let new = old.with_package_dir(PathBuf::from("test2"));
        store.set_state(new.clone()).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, *old);
        assert_eq!(seen[0].1, new);
    }

    #[test]
    fn test_state_setter_no_callbacks() {
        let store = Store::new(state());
        let new = store.state().with_package_dir(PathBuf::from("test2"));
        store.set_state(new.clone()).unwrap();
        assert_eq!(*store.state(), new);
    }

    #[test]
    fn test_state_setter_multiple_callbacks_in_order() {
        let store = Store::new(state());
        let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        for label in [1, 2] {
            let sink = order.clone();
            store.subscribe(move |_, _| {
                sink.borrow_mut().push(label);
                Ok(())
            });
        }

        store
            .set_state(state().with_package_dir(PathBuf::from("test2")))
            .unwrap();
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let store = Store::new(state());
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        let id = store.subscribe(move |_, _| {
            sink.set(sink.get() + 1);
            Ok(())
        });

        store.unsubscribe(id).unwrap();
        store
            .set_state(state().with_package_dir(PathBuf::from("test2")))
            .unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_unsubscribe_not_subscribed() {
        let store = Store::new(state());
        let id = store.subscribe(|_, _| Ok(()));
        store.unsubscribe(id).unwrap();
        assert!(matches!(store.unsubscribe(id), Err(Error::NotSubscribed)));
    }

    #[test]
    fn test_add_plugin() {
        let store = Store::new(state());
        store.add_plugin(Rc::new(NoopPlugin));
        assert_eq!(store.plugin_count(), 1);
    }

    #[test]
    fn test_dispatch_order_and_error_propagation() {
        let store = Store::new(state());
        let seen = Rc::new(RefCell::new(Vec::new()));
        store.add_plugin(Rc::new(RecordingPlugin {
            label: "first",
            seen: seen.clone(),
            fail: false,
        }));
        store.add_plugin(Rc::new(RecordingPlugin {
            label: "second",
            seen: seen.clone(),
            fail: true,
        }));
        store.add_plugin(Rc::new(RecordingPlugin {
            label: "third",
            seen: seen.clone(),
            fail: false,
        }));

        let result = store.dispatch(Event::TargetBranchFinalized);
        assert!(result.is_err());
        // The failing plugin aborts dispatch to the plugins after it
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_reentrant_set_state_from_callback() {
        let store = Rc::new(Store::new(state()));
        let inner = store.clone();
        store.subscribe(move |_, new| {
            // Settle on "final" exactly once; the nested set_state re-runs
            // this callback, which then matches the first arm and stops.
            if new.package_dir == PathBuf::from("intermediate") {
                inner.set_state(new.with_package_dir(PathBuf::from("final")))?;
            }
            Ok(())
        });

        store
            .set_state(state().with_package_dir(PathBuf::from("intermediate")))
            .unwrap();
        assert_eq!(store.state().package_dir, PathBuf::from("final"));
    }
}
