//! Immutable, index-addressed view of the object store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Fragment, ObjectKey};

/// An upstream service as known by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceObject {
    pub namespace: String,
    pub name: String,

    #[serde(default)]
    pub ports: Vec<u16>,
}

/// A TLS secret: PEM certificate chain plus PEM private key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretObject {
    pub namespace: String,
    pub name: String,

    #[serde(default)]
    pub cert_pem: String,

    #[serde(default)]
    pub key_pem: String,
}

/// Serialized form of a snapshot, as read from disk or received from the store.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotDocument {
    pub fragments: Vec<Fragment>,
    pub services: Vec<ServiceObject>,
    pub secrets: Vec<SecretObject>,
}

/// Consistent, read-only snapshot keyed by (namespace, name).
///
/// `BTreeMap` keeps every iteration in a stable order, which the resolver
/// relies on for deterministic output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    fragments: BTreeMap<ObjectKey, Fragment>,
    services: BTreeMap<ObjectKey, ServiceObject>,
    secrets: BTreeMap<ObjectKey, SecretObject>,
}

impl StoreSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document. On duplicate keys the first object wins.
    pub fn from_document(doc: SnapshotDocument) -> Self {
        let mut snapshot = Self::new();
        for fragment in doc.fragments {
            let key = fragment.key();
            if snapshot.fragments.contains_key(&key) {
                tracing::warn!(fragment = %key, "Duplicate fragment in snapshot, keeping first");
                continue;
            }
            snapshot.fragments.insert(key, fragment);
        }
        for service in doc.services {
            let key = ObjectKey::new(&service.namespace, &service.name);
            snapshot.services.entry(key).or_insert(service);
        }
        for secret in doc.secrets {
            let key = ObjectKey::new(&secret.namespace, &secret.name);
            snapshot.secrets.entry(key).or_insert(secret);
        }
        snapshot
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.insert_fragment(fragment);
        self
    }

    pub fn with_service(mut self, namespace: &str, name: &str, ports: &[u16]) -> Self {
        self.services.insert(
            ObjectKey::new(namespace, name),
            ServiceObject {
                namespace: namespace.to_string(),
                name: name.to_string(),
                ports: ports.to_vec(),
            },
        );
        self
    }

    pub fn with_secret(mut self, secret: SecretObject) -> Self {
        self.secrets
            .insert(ObjectKey::new(&secret.namespace, &secret.name), secret);
        self
    }

    /// Insert or replace a fragment.
    pub fn insert_fragment(&mut self, fragment: Fragment) {
        self.fragments.insert(fragment.key(), fragment);
    }

    pub fn remove_fragment(&mut self, key: &ObjectKey) -> Option<Fragment> {
        self.fragments.remove(key)
    }

    pub fn fragment(&self, key: &ObjectKey) -> Option<&Fragment> {
        self.fragments.get(key)
    }

    pub fn fragments(&self) -> impl Iterator<Item = (&ObjectKey, &Fragment)> {
        self.fragments.iter()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn service(&self, key: &ObjectKey) -> Option<&ServiceObject> {
        self.services.get(key)
    }

    pub fn secret(&self, key: &ObjectKey) -> Option<&SecretObject> {
        self.secrets.get(key)
    }
}
