//! Keyed storage of contextual instances with create-once semantics.
//!
//! The live map sits behind an `RwLock<Arc<_>>` so that [`ContextualStorage::destroy_all`]
//! can swap in an empty map and run destruction callbacks against the old one without
//! holding any lock. Creation locks the per-key placeholder, never the map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::contextual::{BeanKey, Contextual, CreationalContext, Instance};
use crate::error::ScopeError;

/// A created instance together with the state needed to destroy it.
pub struct InstanceRecord {
    contextual: Arc<dyn Contextual>,
    instance: Instance,
    creational: CreationalContext,
}

impl InstanceRecord {
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn creational_context(&self) -> &CreationalContext {
        &self.creational
    }

    pub fn contextual(&self) -> &Arc<dyn Contextual> {
        &self.contextual
    }

    fn destroy(&self) {
        self.contextual.destroy(self.instance.clone(), &self.creational);
        self.creational.release();
    }
}

impl fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("contextual", &self.contextual.id())
            .field("creational", &self.creational)
            .finish()
    }
}

/// Placeholder inserted before creation; filled exactly once.
///
/// `init` serializes creators for this key only; `record` is what readers see.
struct Slot {
    init: Mutex<()>,
    record: RwLock<SlotState>,
}

#[derive(Default)]
struct SlotState {
    record: Option<Arc<InstanceRecord>>,
    /// Set once the slot left the map; nothing may be published after that.
    retired: bool,
}

impl Slot {
    fn empty() -> Self {
        Self {
            init: Mutex::new(()),
            record: RwLock::new(SlotState::default()),
        }
    }

    fn filled(record: Arc<InstanceRecord>) -> Self {
        Self {
            init: Mutex::new(()),
            record: RwLock::new(SlotState {
                record: Some(record),
                retired: false,
            }),
        }
    }

    fn published(&self) -> Option<Arc<InstanceRecord>> {
        self.record.read().record.clone()
    }

    /// Publish `record` unless the slot was retired meanwhile; hands it back in that case.
    fn publish(&self, record: Arc<InstanceRecord>) -> Result<(), Arc<InstanceRecord>> {
        let mut state = self.record.write();
        if state.retired {
            return Err(record);
        }
        state.record = Some(record);
        Ok(())
    }

    fn is_retired(&self) -> bool {
        self.record.read().retired
    }

    fn retire(&self) -> Option<Arc<InstanceRecord>> {
        let mut state = self.record.write();
        state.retired = true;
        state.record.take()
    }
}

#[derive(Default)]
struct Shard {
    entries: Mutex<HashMap<BeanKey, Arc<Slot>>>,
    /// Set under the `entries` lock once `destroy_all` has drained this shard.
    retired: AtomicBool,
}

/// Storage backing one scope instance (one request, one session, the application).
pub struct ContextualStorage {
    current: RwLock<Arc<Shard>>,
    concurrent: bool,
    passivating: bool,
}

impl ContextualStorage {
    /// `concurrent` enables per-key placeholder locking for scopes reachable from several
    /// threads; `passivating` keys passivation-capable objects by their stable id.
    pub fn new(concurrent: bool, passivating: bool) -> Self {
        Self {
            current: RwLock::new(Arc::new(Shard::default())),
            concurrent,
            passivating,
        }
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn is_passivating(&self) -> bool {
        self.passivating
    }

    /// Key under which `contextual` is stored.
    pub fn bean_key(&self, contextual: &dyn Contextual) -> BeanKey {
        match contextual.passivation_id() {
            Some(id) if self.passivating => BeanKey::Passivation(Arc::from(id)),
            _ => BeanKey::Identity(contextual.id()),
        }
    }

    fn shard(&self) -> Arc<Shard> {
        self.current.read().clone()
    }

    fn slot(&self, key: &BeanKey) -> Option<Arc<Slot>> {
        self.shard().entries.lock().get(key).cloned()
    }

    /// Existing record for `contextual`, if any. Never creates.
    pub fn get(&self, contextual: &dyn Contextual) -> Option<Arc<InstanceRecord>> {
        self.get_by_key(&self.bean_key(contextual))
    }

    /// Existing record under `key`. A creation still in flight reads as absent.
    pub fn get_by_key(&self, key: &BeanKey) -> Option<Arc<InstanceRecord>> {
        self.slot(key)?.published()
    }

    /// Return the instance for `contextual`, creating it on first access.
    ///
    /// Concurrent callers racing on the same key observe a single `create` call and the
    /// same record. A failed creation leaves an empty placeholder for the next caller.
    pub fn get_or_create(&self, contextual: &Arc<dyn Contextual>) -> Result<Arc<InstanceRecord>, ScopeError> {
        let key = self.bean_key(contextual.as_ref());
        if self.concurrent {
            self.get_or_create_concurrent(key, contextual)
        } else {
            self.get_or_create_local(key, contextual)
        }
    }

    fn get_or_create_concurrent(
        &self,
        key: BeanKey,
        contextual: &Arc<dyn Contextual>,
    ) -> Result<Arc<InstanceRecord>, ScopeError> {
        loop {
            let shard = self.shard();
            let slot = {
                let mut entries = shard.entries.lock();
                if shard.retired.load(Ordering::Acquire) {
                    continue;
                }
                let slot = entries.entry(key.clone()).or_insert_with(|| Arc::new(Slot::empty())).clone();
                slot
            };

            if let Some(record) = slot.published() {
                return Ok(record);
            }
            let _init = slot.init.lock();
            if let Some(record) = slot.published() {
                return Ok(record);
            }
            if slot.is_retired() {
                continue;
            }
            let record = match create_record(contextual) {
                Ok(record) => Arc::new(record),
                Err(err) => {
                    self.discard_placeholder(&shard, &key, &slot);
                    return Err(err);
                }
            };
            match slot.publish(record.clone()) {
                Ok(()) => {
                    log::trace!("created contextual instance under {}", key);
                    return Ok(record);
                }
                Err(orphan) => {
                    // The storage was emptied while creating; retry against the fresh map.
                    log::debug!("storage cleared while creating {}, retrying", key);
                    orphan.destroy();
                }
            }
        }
    }

    fn get_or_create_local(
        &self,
        key: BeanKey,
        contextual: &Arc<dyn Contextual>,
    ) -> Result<Arc<InstanceRecord>, ScopeError> {
        if let Some(record) = self.get_by_key(&key) {
            return Ok(record);
        }
        // Created without holding the map so factories may resolve other instances.
        let record = Arc::new(create_record(contextual)?);
        log::trace!("created contextual instance under {}", key);
        self.shard()
            .entries
            .lock()
            .insert(key, Arc::new(Slot::filled(record.clone())));
        Ok(record)
    }

    /// Drop the empty placeholder left by a failed creation, unless it was already replaced.
    /// Callers still waiting on it see it retired and start over.
    fn discard_placeholder(&self, shard: &Shard, key: &BeanKey, slot: &Arc<Slot>) {
        let mut entries = shard.entries.lock();
        let ours = entries.get(key).is_some_and(|entry| Arc::ptr_eq(entry, slot));
        if ours && slot.published().is_none() {
            entries.remove(key);
            slot.retire();
        }
    }

    /// Destroy the instance stored for `contextual`. Returns whether one existed.
    pub fn destroy(&self, contextual: &dyn Contextual) -> bool {
        let key = self.bean_key(contextual);
        let slot = self.shard().entries.lock().remove(&key);
        let Some(slot) = slot else {
            return false;
        };
        let record = slot.retire();
        match record {
            Some(record) => {
                record.destroy();
                true
            }
            None => false,
        }
    }

    /// Swap in an empty map, then destroy every record of the old one outside any lock.
    ///
    /// Returns the number of instances destroyed.
    pub fn destroy_all(&self) -> usize {
        let old = std::mem::replace(&mut *self.current.write(), Arc::new(Shard::default()));
        let slots: Vec<Arc<Slot>> = {
            let mut entries = old.entries.lock();
            old.retired.store(true, Ordering::Release);
            entries.drain().map(|(_, slot)| slot).collect()
        };

        let mut destroyed = 0;
        for slot in slots {
            if let Some(record) = slot.retire() {
                record.destroy();
                destroyed += 1;
            }
        }
        log::debug!("destroyed {} contextual instances", destroyed);
        destroyed
    }

    pub fn keys(&self) -> Vec<BeanKey> {
        self.shard().entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shard().entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ContextualStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualStorage")
            .field("concurrent", &self.concurrent)
            .field("passivating", &self.passivating)
            .field("len", &self.len())
            .finish()
    }
}

fn create_record(contextual: &Arc<dyn Contextual>) -> Result<InstanceRecord, ScopeError> {
    let creational = CreationalContext::new(contextual.id());
    let instance = contextual.create(&creational)?;
    Ok(InstanceRecord {
        contextual: contextual.clone(),
        instance,
        creational,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contextual::Bean;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_bean(created: &Arc<AtomicUsize>, destroyed: &Arc<AtomicUsize>) -> Arc<dyn Contextual> {
        let created = created.clone();
        let destroyed = destroyed.clone();
        Bean::new(move |_| Ok(created.fetch_add(1, Ordering::SeqCst)))
            .on_destroy(move |_| {
                destroyed.fetch_add(1, Ordering::SeqCst);
            })
            .into_contextual()
    }

    #[test]
    fn get_never_creates() {
        let storage = ContextualStorage::new(true, false);
        let bean = Bean::new(|_| Ok(1u32)).into_contextual();
        assert!(storage.get(bean.as_ref()).is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn get_or_create_returns_same_record() {
        for concurrent in [true, false] {
            let created = Arc::new(AtomicUsize::new(0));
            let destroyed = Arc::new(AtomicUsize::new(0));
            let storage = ContextualStorage::new(concurrent, false);
            let bean = counting_bean(&created, &destroyed);

            let first = storage.get_or_create(&bean).unwrap();
            let second = storage.get_or_create(&bean).unwrap();
            assert!(Arc::ptr_eq(first.instance(), second.instance()));
            assert_eq!(created.load(Ordering::SeqCst), 1);
            assert!(storage.get(bean.as_ref()).is_some());
        }
    }

    #[test]
    fn failed_creation_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in = attempts.clone();
        let bean = Bean::new(move |_| {
            if attempts_in.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("not yet".to_string())
            } else {
                Ok("ready")
            }
        })
        .into_contextual();
        let storage = ContextualStorage::new(true, false);

        assert!(storage.get_or_create(&bean).is_err());
        assert!(storage.get(bean.as_ref()).is_none());
        assert!(storage.is_empty());
        assert!(storage.keys().is_empty());
        let record = storage.get_or_create(&bean).unwrap();
        assert_eq!(record.instance().downcast_ref::<&str>(), Some(&"ready"));
    }

    #[test]
    fn failing_factories_leave_no_placeholders() {
        let storage = ContextualStorage::new(true, false);
        for _ in 0..100 {
            let bean = Bean::<()>::new(|_| Err("down".to_string())).into_contextual();
            assert!(storage.get_or_create(&bean).is_err());
        }
        assert_eq!(storage.len(), 0);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn passivation_id_is_the_key_only_when_passivating() {
        let bean = Bean::new(|_| Ok(())).with_passivation_id("cart");
        let passivating = ContextualStorage::new(true, true);
        let plain = ContextualStorage::new(true, false);

        assert_eq!(passivating.bean_key(&bean), BeanKey::Passivation(Arc::from("cart")));
        assert_eq!(plain.bean_key(&bean), BeanKey::Identity(bean.id()));

        let anonymous = Bean::new(|_| Ok(()));
        assert_eq!(passivating.bean_key(&anonymous), BeanKey::Identity(anonymous.id()));
    }

    #[test]
    fn passivation_key_resolves_across_definitions() {
        let storage = ContextualStorage::new(true, true);
        let original = Bean::new(|_| Ok(7u8)).with_passivation_id("prefs").into_contextual();
        storage.get_or_create(&original).unwrap();

        // A second definition with the same stable id (e.g. after deserialization).
        let restored = Bean::new(|_| Ok(9u8)).with_passivation_id("prefs").into_contextual();
        let record = storage.get_or_create(&restored).unwrap();
        assert_eq!(record.instance().downcast_ref::<u8>(), Some(&7));
    }

    #[test]
    fn destroy_removes_single_record() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let storage = ContextualStorage::new(false, false);
        let a = counting_bean(&created, &destroyed);
        let b = counting_bean(&created, &destroyed);
        storage.get_or_create(&a).unwrap();
        storage.get_or_create(&b).unwrap();

        assert!(storage.destroy(a.as_ref()));
        assert!(!storage.destroy(a.as_ref()));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn destroy_all_empties_storage_and_runs_callbacks() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let storage = ContextualStorage::new(true, false);
        let beans: Vec<_> = (0..4).map(|_| counting_bean(&created, &destroyed)).collect();
        for bean in &beans {
            storage.get_or_create(bean).unwrap();
        }

        assert_eq!(storage.destroy_all(), 4);
        assert_eq!(destroyed.load(Ordering::SeqCst), 4);
        assert!(storage.is_empty());
        assert_eq!(storage.destroy_all(), 0);
    }

    #[test]
    fn destruction_callback_may_create_in_fresh_map() {
        let storage = Arc::new(ContextualStorage::new(true, false));
        let replacement = Bean::new(|_| Ok("replacement")).into_contextual();

        let storage_in = storage.clone();
        let replacement_in = replacement.clone();
        let bean = Bean::new(|_| Ok("original"))
            .on_destroy(move |_| {
                storage_in.get_or_create(&replacement_in).unwrap();
            })
            .into_contextual();
        storage.get_or_create(&bean).unwrap();

        assert_eq!(storage.destroy_all(), 1);
        assert!(storage.get(bean.as_ref()).is_none());
        assert!(storage.get(replacement.as_ref()).is_some());
    }

    #[test]
    fn destroy_releases_dependents() {
        let released = Arc::new(AtomicUsize::new(0));
        let released_in = released.clone();
        let bean = Bean::new(move |cc| {
            let released = released_in.clone();
            cc.push_dependent(move || {
                released.fetch_add(1, Ordering::SeqCst);
            });
            Ok(())
        })
        .into_contextual();
        let storage = ContextualStorage::new(false, false);
        storage.get_or_create(&bean).unwrap();

        storage.destroy_all();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
