//! Resolution of which organizations a credential may read, backed by a
//! bounded cache so the document repository is not hit on every query.

use moka::sync::Cache;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::KgError;
use crate::store::traits::{Credential, DocumentRepository};

/// Shared, concurrency-safe authorization component. The cache is keyed by
/// the credential value and bounded; lookups for different credentials do
/// not serialize each other.
pub struct AuthorizationContext {
    repository: Arc<dyn DocumentRepository>,
    cache: Cache<Credential, Arc<BTreeSet<String>>>,
}

impl AuthorizationContext {
    pub fn new(repository: Arc<dyn DocumentRepository>, cache_capacity: u64) -> Self {
        Self {
            repository,
            cache: Cache::new(cache_capacity),
        }
    }

    /// Organizations the credential can read, optionally intersected with a
    /// caller-supplied whitelist. The repository only reports visibility, so
    /// every visible organization is assumed READ-accessible.
    pub async fn readable_organizations(
        &self,
        credential: &Credential,
        whitelist: Option<&[String]>,
    ) -> Result<BTreeSet<String>, KgError> {
        let organizations = match self.cache.get(credential) {
            Some(cached) => cached,
            None => {
                let fetched = Arc::new(self.repository.list_organizations(credential).await?);
                self.cache.insert(credential.clone(), fetched.clone());
                fetched
            }
        };

        let mut readable: BTreeSet<String> = organizations.as_ref().clone();
        if let Some(whitelist) = whitelist {
            readable.retain(|org| whitelist.iter().any(|allowed| allowed == org));
        }
        Ok(readable)
    }

    /// Drop every cached entry. Must be called whenever organization
    /// visibility may have changed out of band.
    pub fn flush(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::Value;
    use crate::model::{InstanceReference, SchemaReference};

    /// Repository double counting how often organizations are listed.
    struct CountingRepository {
        calls: Mutex<usize>,
        organizations: BTreeSet<String>,
    }

    impl CountingRepository {
        fn new(organizations: &[&str]) -> Self {
            Self {
                calls: Mutex::new(0),
                organizations: organizations.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl DocumentRepository for CountingRepository {
        async fn fetch(
            &self,
            _reference: &InstanceReference,
            _credential: &Credential,
        ) -> Result<Option<Value>, KgError> {
            Ok(None)
        }

        async fn create(
            &self,
            reference: &InstanceReference,
            _payload: &Value,
            _credential: &Credential,
        ) -> Result<InstanceReference, KgError> {
            Ok(reference.clone())
        }

        async fn update(
            &self,
            reference: &InstanceReference,
            _payload: &Value,
            _credential: &Credential,
        ) -> Result<InstanceReference, KgError> {
            Ok(reference.clone())
        }

        async fn delete(
            &self,
            _reference: &InstanceReference,
            _credential: &Credential,
        ) -> Result<(), KgError> {
            Ok(())
        }

        async fn list_instances(
            &self,
            _schema: &SchemaReference,
            _from: usize,
            _size: usize,
            _credential: &Credential,
        ) -> Result<Vec<Value>, KgError> {
            Ok(Vec::new())
        }

        async fn list_organizations(
            &self,
            _credential: &Credential,
        ) -> Result<BTreeSet<String>, KgError> {
            *self.calls.lock() += 1;
            Ok(self.organizations.clone())
        }
    }

    #[tokio::test]
    async fn caches_lookups_per_credential() {
        let repository = Arc::new(CountingRepository::new(&["minds", "licenses"]));
        let context = AuthorizationContext::new(repository.clone(), 100);
        let credential = Credential::Token("abc".to_string());

        let first = context
            .readable_organizations(&credential, None)
            .await
            .unwrap();
        let second = context
            .readable_organizations(&credential, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(*repository.calls.lock(), 1);
    }

    #[tokio::test]
    async fn whitelist_intersects_the_readable_set() {
        let repository = Arc::new(CountingRepository::new(&["minds", "licenses"]));
        let context = AuthorizationContext::new(repository, 100);
        let credential = Credential::InternalMaster;

        let restricted = context
            .readable_organizations(&credential, Some(&["licenses".to_string(), "other".to_string()]))
            .await
            .unwrap();
        assert_eq!(restricted, ["licenses".to_string()].into());
    }

    #[tokio::test]
    async fn flush_forces_a_fresh_lookup() {
        let repository = Arc::new(CountingRepository::new(&["minds"]));
        let context = AuthorizationContext::new(repository.clone(), 100);
        let credential = Credential::Token("abc".to_string());

        context
            .readable_organizations(&credential, None)
            .await
            .unwrap();
        context.flush();
        context
            .readable_organizations(&credential, None)
            .await
            .unwrap();

        assert_eq!(*repository.calls.lock(), 2);
    }
}
