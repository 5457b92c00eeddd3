//! Identity resolver — user id to display profile, cached and coalesced.
//!
//! DESIGN
//! ======
//! The resolver is an explicit service object handed to its consumers, not
//! ambient global state. Found profiles are cached for the life of the
//! resolver and never invalidated. Concurrent lookups for the same id share
//! one in-flight request through a `Shared` future; the first caller to
//! finish moves the result into the cache and retires the in-flight entry,
//! unless a newer lookup for the same id has taken its place.
//!
//! Misses and lookup failures are not cached, so a profile created after the
//! first lookup still resolves later.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SyncError;
use crate::note::UserId;

/// Display profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Presence color (hex).
    pub color: String,
}

/// Where profiles come from (the account collaborator).
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, SyncError>;
}

/// Fixed directory of profiles, for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    profiles: HashMap<UserId, Profile>,
}

impl StaticProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.id.clone(), profile);
        self
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, SyncError> {
        Ok(self.profiles.get(user_id).cloned())
    }
}

type Lookup = Shared<BoxFuture<'static, Option<Profile>>>;

#[derive(Default)]
struct ResolverInner {
    cache: HashMap<UserId, Profile>,
    in_flight: HashMap<UserId, Lookup>,
}

/// Cached, de-duplicating `user id -> profile` lookups. Cheap to clone.
#[derive(Clone)]
pub struct IdentityResolver {
    source: Arc<dyn ProfileSource>,
    inner: Arc<Mutex<ResolverInner>>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        Self { source, inner: Arc::new(Mutex::new(ResolverInner::default())) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResolverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve one user. `None` when the user is unknown or the lookup failed.
    pub async fn get_user_by_id(&self, user_id: &str) -> Option<Profile> {
        let lookup = {
            let mut inner = self.lock();
            if let Some(profile) = inner.cache.get(user_id) {
                return Some(profile.clone());
            }
            if let Some(pending) = inner.in_flight.get(user_id) {
                pending.clone()
            } else {
                let lookup = self.start_lookup(user_id);
                inner.in_flight.insert(user_id.to_owned(), lookup.clone());
                lookup
            }
        };

        let profile = lookup.clone().await;

        let mut inner = self.lock();
        // A newer lookup may already have replaced ours; leave that one alone.
        if inner.in_flight.get(user_id).is_some_and(|current| current.ptr_eq(&lookup)) {
            inner.in_flight.remove(user_id);
        }
        if let Some(found) = &profile {
            inner.cache.insert(user_id.to_owned(), found.clone());
        }
        profile
    }

    /// Resolve several users concurrently, preserving input order.
    pub async fn resolve_many(&self, user_ids: &[UserId]) -> Vec<Option<Profile>> {
        join_all(user_ids.iter().map(|id| self.get_user_by_id(id))).await
    }

    /// Cached profile without triggering a lookup.
    #[must_use]
    pub fn cached(&self, user_id: &str) -> Option<Profile> {
        self.lock().cache.get(user_id).cloned()
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.lock().cache.len()
    }

    fn start_lookup(&self, user_id: &str) -> Lookup {
        let source = Arc::clone(&self.source);
        let user_id = user_id.to_owned();
        async move {
            match source.fetch_profile(&user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(error = %e, %user_id, "profile lookup failed");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
