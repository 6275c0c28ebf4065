//! # Host Signals
//!
//! Single-threaded publish/subscribe. [`Signal::subscribe`] returns a
//! [`Subscription`] guard; dropping the guard removes the handler, so a
//! subscriber can never be left registered after its owner is gone.

use crate::host::ObjectId;
use log::warn;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Slots<T: 'static> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

pub struct Signal<T: 'static> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, handler: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            let handler: Handler<T> = Rc::new(RefCell::new(handler));
            slots.handlers.push((id, handler));
            id
        };

        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().handlers.retain(|(h, _)| *h != id);
                }
            })),
        }
    }

    /// Call every current handler with `arg`.
    ///
    /// Handlers may subscribe or unsubscribe while being called; changes take
    /// effect from the next emit.
    pub fn emit(&self, arg: &T) {
        let handlers: Vec<Handler<T>> = self
            .slots
            .borrow()
            .handlers
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();

        for handler in handlers {
            match handler.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(arg),
                Err(_) => warn!("Skipping re-entrant signal handler"),
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.borrow().handlers.len()
    }
}

/// Keeps a handler registered for as long as it lives.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Host lifecycle notifications the stash listens to.
#[derive(Default)]
pub struct HostSignals {
    pub level_initialized: Signal<()>,
    /// Scene name.
    pub scene_loaded: Signal<String>,
    pub scene_unloaded: Signal<String>,
    /// The host's periodic "write your save data now" hook.
    pub collect_save_data: Signal<()>,
    pub quitting: Signal<()>,
    pub loot_started: Signal<ObjectId>,
    pub loot_stopped: Signal<ObjectId>,
    pub store_all_clicked: Signal<()>,
}
