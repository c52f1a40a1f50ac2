use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::desktop::{Automation, UiElement};

#[derive(Clone)]
struct KnownEntry {
    runtime_id: Option<String>,
    handle: UiElement,
}

/// Issues stable opaque references for backend element handles.
///
/// Used for both elements and windows. Lookups for the same accessible object
/// return the same reference until the object is evicted as unavailable.
pub struct KnownRegistry {
    kind: &'static str,
    entries: DashMap<String, KnownEntry>,
    insert_lock: Mutex<()>,
}

impl KnownRegistry {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
            insert_lock: Mutex::new(()),
        }
    }

    /// Reference for `handle`, minting a new one on first sight.
    pub async fn get_or_add(&self, automation: &dyn Automation, handle: UiElement) -> String {
        let _guard = self.insert_lock.lock().await;

        let runtime_id = handle.runtime_id().map(str::to_string);
        let candidates: Vec<(String, UiElement)> = self
            .entries
            .iter()
            .filter(|entry| entry.runtime_id == runtime_id)
            .map(|entry| (entry.key().clone(), entry.handle.clone()))
            .collect();

        for (reference, known) in candidates {
            match automation.is_same(&handle, &known).await {
                Ok(true) => return reference,
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(
                        "Identity check against known {} {} failed, treating as different: {:#}",
                        self.kind,
                        reference,
                        e
                    );
                }
            }
        }

        loop {
            let reference = Uuid::new_v4().to_string();
            if let Entry::Vacant(vacant) = self.entries.entry(reference.clone()) {
                vacant.insert(KnownEntry {
                    runtime_id: runtime_id.clone(),
                    handle: handle.clone(),
                });
                tracing::debug!("Registered known {} {}", self.kind, reference);
                return reference;
            }
        }
    }

    pub fn find(&self, reference: &str) -> Option<UiElement> {
        self.entries
            .get(reference)
            .map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose handle the backend reports as gone. Entries whose
    /// availability cannot be determined are kept.
    pub async fn evict_unavailable(&self, automation: &dyn Automation) -> usize {
        let snapshot: Vec<(String, UiElement)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.handle.clone()))
            .collect();

        let checks = join_all(
            snapshot
                .iter()
                .map(|(_, handle)| automation.is_available(handle)),
        )
        .await;

        let mut evicted = 0;
        for ((reference, _), available) in snapshot.iter().zip(checks) {
            if let Ok(false) = available {
                if self.entries.remove(reference).is_some() {
                    evicted += 1;
                }
            }
        }
        if evicted > 0 {
            tracing::debug!("Evicted {} unavailable known {}(s)", evicted, self.kind);
        }
        evicted
    }
}
