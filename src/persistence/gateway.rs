//! Persistence gateway
//!
//! Ties the local store, the remote mailbox and restore tokens together.
//! The local copy is authoritative and written synchronously; the remote
//! copy is best-effort. Errors are logged here and never reach gameplay.

use serde_json::Value;

use super::remote::{PendingWrite, RemoteStore, RemoteSync, remote_path};
use super::restore::{RestoreOutcome, RestoreTicket, RestoreTracker, pick_newest};
use super::snapshot::Snapshot;
use super::store::{Identity, LocalStore, storage_key};
use super::{Result, normalize};
use crate::settings::Settings;
use crate::sim::{GamePhase, SimEvent, World};
use crate::tuning::Tuning;

/// How soon a save must reach the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveUrgency {
    /// Debounced remote write
    Routine,
    /// Flush the remote write now (pause, game over, hide, unload)
    Critical,
}

/// Decides when the world is worth saving
#[derive(Debug, Clone, Copy)]
pub struct AutosavePolicy {
    /// Seconds of play between periodic saves
    pub interval: f32,
}

impl AutosavePolicy {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            interval: tuning.autosave_interval,
        }
    }

    /// Inspect the last step's events
    pub fn evaluate(&self, world: &World) -> Option<SaveUrgency> {
        let mut urgency = None;
        for event in &world.events {
            match event {
                SimEvent::Paused | SimEvent::GameOver { .. } => return Some(SaveUrgency::Critical),
                SimEvent::RunStarted
                | SimEvent::Resumed
                | SimEvent::TargetKilled { .. }
                | SimEvent::TargetSplit { .. }
                | SimEvent::PowerUpCollected { .. }
                | SimEvent::LevelUp { .. } => urgency = Some(SaveUrgency::Routine),
                _ => {}
            }
        }
        if urgency.is_none() && world.phase == GamePhase::Playing && world.since_save >= self.interval
        {
            urgency = Some(SaveUrgency::Routine);
        }
        urgency
    }
}

pub struct PersistenceGateway<L: LocalStore> {
    local: L,
    identity: Identity,
    remote: RemoteSync,
    restores: RestoreTracker,
    policy: AutosavePolicy,
}

impl<L: LocalStore> PersistenceGateway<L> {
    pub fn new(local: L, identity: Identity, tuning: &Tuning) -> Self {
        Self {
            local,
            identity,
            remote: RemoteSync::default(),
            restores: RestoreTracker::new(),
            policy: AutosavePolicy::new(tuning),
        }
    }

    /// Replace the remote mailbox (custom debounce)
    pub fn with_remote_sync(mut self, remote: RemoteSync) -> Self {
        self.remote = remote;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote_sync(&self) -> &RemoteSync {
        &self.remote
    }

    /// Sign-in/sign-out: pending restores and remote writes are dropped
    pub fn set_identity(&mut self, identity: Identity) {
        if identity == self.identity {
            return;
        }
        log::info!("Persistence identity changed to {:?}", identity.user_id());
        self.restores.invalidate();
        self.remote.clear();
        self.identity = identity;
    }

    /// Write the world locally and queue it for the remote store
    pub fn save(
        &mut self,
        world: &World,
        settings: Settings,
        tuning: &Tuning,
        now: f64,
        urgency: SaveUrgency,
    ) -> Result<Snapshot> {
        let snapshot = Snapshot::capture(world, settings, now, tuning);
        let key = storage_key(&self.identity);
        self.local.write(&key, &snapshot.to_json()?)?;

        if let Some(uid) = self.identity.user_id() {
            let write = PendingWrite {
                path: remote_path(uid),
                body: snapshot.to_value()?,
                saved_at: snapshot.saved_at,
            };
            self.remote
                .offer(write, now, urgency == SaveUrgency::Critical);
        }
        Ok(snapshot)
    }

    /// Save if the last step warrants it; returns the urgency used
    pub fn autosave(
        &mut self,
        world: &mut World,
        settings: Settings,
        tuning: &Tuning,
        now: f64,
    ) -> Option<SaveUrgency> {
        let urgency = self.policy.evaluate(world)?;
        match self.save(world, settings, tuning, now, urgency) {
            Ok(_) => world.since_save = 0.0,
            Err(e) => log::warn!("Local save failed: {}", e),
        }
        Some(urgency)
    }

    /// Critical save (tab hidden, unload)
    pub fn flush(&mut self, world: &mut World, settings: Settings, tuning: &Tuning, now: f64) {
        match self.save(world, settings, tuning, now, SaveUrgency::Critical) {
            Ok(_) => world.since_save = 0.0,
            Err(e) => log::warn!("Local save failed: {}", e),
        }
    }

    /// Next remote write to send, if due
    pub fn poll_remote(&mut self, now: f64) -> Option<PendingWrite> {
        self.remote.poll(now)
    }

    pub fn complete_remote(&mut self, result: Result<()>) {
        self.remote.complete(result);
    }

    /// Deliver a due remote write through a synchronous store
    pub fn pump_remote(&mut self, store: &mut dyn RemoteStore, now: f64) -> Option<bool> {
        self.remote.pump(store, now)
    }

    /// Start restoring for the current identity
    pub fn begin_restore(&mut self) -> RestoreTicket {
        self.restores.begin(&self.identity)
    }

    /// Finish a restore with whatever the remote read produced
    pub fn finish_restore(
        &mut self,
        ticket: &RestoreTicket,
        remote_doc: Option<Value>,
        world: &mut World,
        settings: &mut Settings,
        tuning: &Tuning,
    ) -> RestoreOutcome {
        if !self.restores.is_current(ticket) || ticket.identity() != &self.identity {
            log::warn!("Dropping stale restore (token {})", ticket.token());
            return RestoreOutcome::Stale;
        }

        let local = match self.local.read(&storage_key(&self.identity)) {
            Ok(Some(json)) => Snapshot::from_json_or_discard(&json, tuning),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Local read failed: {}", e);
                None
            }
        };
        let remote = remote_doc.and_then(|doc| match normalize::normalize_snapshot(&doc, tuning) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!("Discarding remote snapshot: {}", e);
                None
            }
        });

        let Some((snapshot, source)) = pick_newest(local, remote) else {
            log::info!("No saved run; starting fresh");
            return RestoreOutcome::Fresh;
        };

        let snapshot = snapshot.paused_for_restore();
        let saved_at = snapshot.saved_at;
        *settings = snapshot.settings;
        *world = snapshot.world;
        log::info!(
            "Restored {:?} snapshot (phase {:?}, score {})",
            source,
            world.phase,
            world.score
        );
        RestoreOutcome::Restored { source, saved_at }
    }

    /// Restore synchronously, reading the remote store for signed-in users
    pub fn restore(
        &mut self,
        remote: Option<&mut dyn RemoteStore>,
        world: &mut World,
        settings: &mut Settings,
        tuning: &Tuning,
    ) -> RestoreOutcome {
        let ticket = self.begin_restore();
        let doc = match (remote, self.identity.user_id()) {
            (Some(store), Some(uid)) => match store.read(&remote_path(uid)) {
                Ok(doc) => doc,
                Err(e) => {
                    log::warn!("Remote read failed: {}", e);
                    None
                }
            },
            _ => None,
        };
        self.finish_restore(&ticket, doc, world, settings, tuning)
    }
}
