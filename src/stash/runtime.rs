//! # Lifecycle Driver
//!
//! [`StashRuntime`] is what an embedding actually holds. It wires host
//! signals to the stash and is ticked once per frame through
//! [`StashRuntime::update`].
//!
//! | Host event | Reaction |
//! |------------|----------|
//! | level initialized | attach 100 ms later |
//! | base scene loaded | attach 100 ms later |
//! | base scene unloaded | save |
//! | collect save data | save |
//! | quitting | save |
//! | loot started on the stash | next frame: show and arm "store all" |
//! | loot stopped on the stash | disarm "store all" |
//! | store all clicked | sweep the player's inventory into the stash |
//!
//! Every handler logs and swallows its own failures; nothing here can take
//! the host down.

use crate::clock::Clock;
use crate::config::ModConfig;
use crate::context::StashContext;
use crate::events::{HostSignals, Subscription};
use crate::host::{Host, ObjectId};
use crate::persistence::SaveOutcome;
use crate::store::StorageBackend;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

pub const ATTACH_DELAY_MILLIS: i64 = 100;

/// True for the hub scene, the only one that hosts the stash.
pub fn is_base_scene(name: &str) -> bool {
    !name.is_empty() && (name.to_lowercase().contains("base") || name.contains("基地"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAllState {
    Idle,
    /// Loot view just opened on the stash; arm on the next frame, once the
    /// view has finished its own setup.
    PendingArm,
    Armed,
}

/// Subscriptions held while the stash is enabled. Dropping it unsubscribes
/// from every host signal.
pub struct ModHandle {
    subscriptions: Vec<Subscription>,
}

impl ModHandle {
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

pub struct StashRuntime<H: Host, B: StorageBackend> {
    host: H,
    stash: StashContext<B>,
    clock: Rc<dyn Clock>,
    config: ModConfig,
    base_path: PathBuf,
    pending_attach: Option<DateTime<Utc>>,
    store_all: StoreAllState,
}

impl<H: Host + 'static, B: StorageBackend + 'static> StashRuntime<H, B> {
    pub fn new(
        host: H,
        backend: B,
        clock: Rc<dyn Clock>,
        config: ModConfig,
        base_path: PathBuf,
    ) -> Self {
        Self {
            host,
            stash: StashContext::new(backend, Rc::clone(&clock)),
            clock,
            config,
            base_path,
            pending_attach: None,
            store_all: StoreAllState::Idle,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn stash(&self) -> &StashContext<B> {
        &self.stash
    }

    pub fn config(&self) -> &ModConfig {
        &self.config
    }

    pub fn store_all_state(&self) -> StoreAllState {
        self.store_all
    }

    pub fn pending_attach(&self) -> Option<DateTime<Utc>> {
        self.pending_attach
    }

    /// Initialize persistence and subscribe to every host signal.
    pub fn enable(this: &Rc<RefCell<Self>>, signals: &HostSignals) -> ModHandle {
        this.borrow_mut().initialize();

        let subscriptions = vec![
            signals
                .level_initialized
                .subscribe(forward(this, |rt, _: &()| rt.on_level_initialized())),
            signals
                .scene_loaded
                .subscribe(forward(this, |rt, name: &String| rt.on_scene_loaded(name))),
            signals
                .scene_unloaded
                .subscribe(forward(this, |rt, name: &String| rt.on_scene_unloaded(name))),
            signals
                .collect_save_data
                .subscribe(forward(this, |rt, _: &()| rt.on_collect_save_data())),
            signals
                .quitting
                .subscribe(forward(this, |rt, _: &()| rt.on_quit())),
            signals
                .loot_started
                .subscribe(forward(this, |rt, id: &ObjectId| rt.on_loot_started(*id))),
            signals
                .loot_stopped
                .subscribe(forward(this, |rt, id: &ObjectId| rt.on_loot_stopped(*id))),
            signals
                .store_all_clicked
                .subscribe(forward(this, |rt, _: &()| rt.on_store_all_clicked())),
        ];
        info!("Independent stash enabled");
        ModHandle { subscriptions }
    }

    /// Save, then release every subscription.
    pub fn disable(this: &Rc<RefCell<Self>>, handle: ModHandle) {
        this.borrow_mut().save_best_effort("disable");
        drop(handle);
        info!("Independent stash disabled");
    }

    /// Retries on every call until persistence is ready.
    pub fn initialize(&mut self) {
        if self.stash.is_initialized() {
            return;
        }
        if let Err(e) = self.stash.initialize(&self.base_path) {
            error!("Initialize failed: {}", e);
        }
    }

    pub fn on_level_initialized(&mut self) {
        self.schedule_attach();
    }

    pub fn on_scene_loaded(&mut self, name: &str) {
        debug!("Scene loaded: {}", name);
        if is_base_scene(name) {
            self.schedule_attach();
        }
    }

    pub fn on_scene_unloaded(&mut self, name: &str) {
        debug!("Scene unloaded: {}", name);
        if is_base_scene(name) {
            self.save_best_effort("scene unload");
        }
    }

    pub fn on_collect_save_data(&mut self) {
        self.save_best_effort("save hook");
    }

    pub fn on_quit(&mut self) {
        self.save_best_effort("quit");
    }

    pub fn on_loot_started(&mut self, id: ObjectId) {
        if self.stash.attachment().handle() == Some(id) {
            self.store_all = StoreAllState::PendingArm;
        }
    }

    pub fn on_loot_stopped(&mut self, id: ObjectId) {
        if self.stash.attachment().handle() == Some(id) {
            self.store_all = StoreAllState::Idle;
        }
    }

    pub fn on_store_all_clicked(&mut self) {
        if self.store_all != StoreAllState::Armed {
            return;
        }
        let handle = self.stash.attachment().handle();
        if handle.is_none() || self.host.target() != handle {
            return;
        }
        let report = self.stash.transfer_from_player(&mut self.host);
        debug!(
            "Store all moved {} items{}",
            report.moved,
            report
                .stalled_at
                .map(|slot| format!(", stash full at slot {}", slot))
                .unwrap_or_default()
        );
    }

    /// Per-frame tick: pending attach, restore progress, store-all arming
    /// and the toggle key.
    pub fn update(&mut self) {
        if let Some(deadline) = self.pending_attach {
            if self.clock.now() >= deadline {
                self.pending_attach = None;
                if self.host.is_base_level() {
                    let outcome = self.stash.ensure_attached(&mut self.host);
                    debug!("Attach: {:?}", outcome);
                }
            }
        }

        self.stash.poll_restore();

        if self.store_all == StoreAllState::PendingArm {
            self.host.set_store_all_visible(true);
            self.store_all = StoreAllState::Armed;
        }

        if self.host.key_down(self.config.open_stash_key) {
            let outcome = self.stash.toggle(&mut self.host);
            debug!("Toggle: {:?}", outcome);
        }
    }

    fn schedule_attach(&mut self) {
        self.pending_attach = Some(self.clock.now() + Duration::milliseconds(ATTACH_DELAY_MILLIS));
    }

    fn save_best_effort(&mut self, reason: &str) {
        self.initialize();
        match self.stash.save() {
            Ok(SaveOutcome::Written) => debug!("Saved on {}", reason),
            Ok(SaveOutcome::Debounced) => debug!("Save on {} debounced", reason),
            Err(e) => error!("Save on {} failed: {}", reason, e),
        }
    }
}

/// Adapt a runtime method into a signal handler that holds the runtime
/// weakly and skips the event if the runtime is gone or busy.
fn forward<H, B, T>(
    this: &Rc<RefCell<StashRuntime<H, B>>>,
    mut f: impl FnMut(&mut StashRuntime<H, B>, &T) + 'static,
) -> impl FnMut(&T) + 'static
where
    H: Host + 'static,
    B: StorageBackend + 'static,
    T: 'static,
{
    let weak: Weak<RefCell<StashRuntime<H, B>>> = Rc::downgrade(this);
    move |arg: &T| {
        let Some(cell) = weak.upgrade() else {
            return;
        };
        let borrowed = cell.try_borrow_mut();
        match borrowed {
            Ok(mut rt) => f(&mut *rt, arg),
            Err(_) => warn!("Stash busy; dropping re-entrant host event"),
        };
    }
}
