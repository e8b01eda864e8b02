use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::Result;
use crate::model::CollectionConfig;
use crate::store::UserStore;

/// Process-wide map of active users, keyed by chat/session id.
///
/// Populated on first start contact and never evicted; an idle session keeps
/// its entry for the life of the process (known resource-growth concern).
/// Each store sits behind its own mutex so at most one workflow mutates a
/// user's collection at a time, which keeps point ids unique and gapless.
pub struct Sessions {
    users_root: PathBuf,
    collection: CollectionConfig,
    users: HashMap<String, Arc<Mutex<UserStore>>>,
}

impl Sessions {
    pub fn new(users_root: PathBuf, collection: CollectionConfig) -> Self {
        Self {
            users_root,
            collection,
            users: HashMap::new(),
        }
    }

    /// Provision (or reset) the user's store and register the session.
    /// Recreates the collection: prior points are dropped.
    pub async fn start(&mut self, user_id: &str) -> Result<Arc<Mutex<UserStore>>> {
        let store =
            UserStore::provision_with(&self.users_root, user_id, self.collection.clone()).await?;
        let handle = Arc::new(Mutex::new(store));
        self.users.insert(user_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Look up a live session, falling back to reopening a store provisioned
    /// by an earlier process. Returns `None` for users that never started.
    pub async fn resume(&mut self, user_id: &str) -> Option<Arc<Mutex<UserStore>>> {
        if let Some(handle) = self.users.get(user_id) {
            return Some(Arc::clone(handle));
        }
        match UserStore::open(&self.users_root, user_id).await {
            Ok(store) => {
                let handle = Arc::new(Mutex::new(store));
                self.users.insert(user_id.to_string(), Arc::clone(&handle));
                Some(handle)
            }
            Err(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
