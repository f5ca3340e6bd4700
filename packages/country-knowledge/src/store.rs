//! In-memory knowledge store.
//!
//! One map from canonical key to either an entity or an alias. Records are
//! built completely before insertion and stored behind `Arc`, so a reader
//! sees either the old record or the new one, never a partial write.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::error::{LookupError, LookupResult};
use crate::normalize::normalize_key;
use crate::types::record::{AliasRecord, EntityRecord, Resolution};

/// A stored value.
#[derive(Debug)]
enum StoredRecord {
    Entity(Arc<EntityRecord>),
    Alias(Arc<AliasRecord>),
}

/// What [`KnowledgeStore::put_alias`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasOutcome {
    Inserted,

    /// Inserted, but the target is not (yet) in the store
    Dangling,

    /// Alias key equals its target's key; the entity answers directly
    SameAsTarget,

    /// Key already names a different entity; alias rejected
    Collision { existing: String },

    /// Alias normalized to an empty key; nothing stored
    EmptyKey,
}

/// Concurrency-safe knowledge cache.
///
/// Useful as a soft cache: data is rebuilt from sources on restart.
#[derive(Default)]
pub struct KnowledgeStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl KnowledgeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look a key up, following at most one alias.
    pub fn get(&self, key: &str) -> LookupResult<Resolution> {
        let key = normalize_key(key);
        let records = self.read();

        match records.get(&key) {
            Some(StoredRecord::Entity(entity)) => Ok(Resolution::Entity(Arc::clone(entity))),
            Some(StoredRecord::Alias(alias)) => match records.get(&alias.target_name) {
                Some(StoredRecord::Entity(entity)) => Ok(Resolution::Alias {
                    alias: Arc::clone(alias),
                    entity: Arc::clone(entity),
                }),
                _ => Err(LookupError::BrokenAlias {
                    alias: alias.alias.clone(),
                    target: alias.target_name.clone(),
                }),
            },
            None => Err(LookupError::NotFound { key }),
        }
    }

    /// Insert or replace an entity. Returns `false` for an empty name.
    pub fn put_entity(&self, mut record: EntityRecord) -> bool {
        let key = normalize_key(&record.name);
        if key.is_empty() {
            warn!(display_name = %record.display_name, "Refusing entity with empty key");
            return false;
        }
        record.name = key.clone();
        self.write().insert(key, StoredRecord::Entity(Arc::new(record)));
        true
    }

    /// Insert or replace an alias.
    ///
    /// Never overwrites an entity: an alias colliding with a different
    /// entity is rejected, one equal to its own target is skipped.
    pub fn put_alias(&self, mut alias: AliasRecord) -> AliasOutcome {
        alias.alias = normalize_key(&alias.alias);
        alias.target_name = normalize_key(&alias.target_name);

        if alias.alias.is_empty() {
            return AliasOutcome::EmptyKey;
        }
        if alias.alias == alias.target_name {
            return AliasOutcome::SameAsTarget;
        }

        let mut records = self.write();
        if let Some(StoredRecord::Entity(existing)) = records.get(&alias.alias) {
            let existing = existing.name.clone();
            drop(records);
            warn!(
                alias = %alias.alias,
                target = %alias.target_name,
                existing = %existing,
                "Alias collides with an entity, skipping"
            );
            return AliasOutcome::Collision { existing };
        }

        let dangling = !matches!(
            records.get(&alias.target_name),
            Some(StoredRecord::Entity(_))
        );
        let key = alias.alias.clone();
        let target = alias.target_name.clone();
        records.insert(key.clone(), StoredRecord::Alias(Arc::new(alias)));
        drop(records);

        if dangling {
            warn!(alias = %key, target = %target, "Alias target is not in the store");
            AliasOutcome::Dangling
        } else {
            AliasOutcome::Inserted
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(&normalize_key(key))
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of keys (entities and aliases).
    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn entity_count(&self) -> usize {
        self.read()
            .values()
            .filter(|r| matches!(r, StoredRecord::Entity(_)))
            .count()
    }

    pub fn alias_count(&self) -> usize {
        self.read()
            .values()
            .filter(|r| matches!(r, StoredRecord::Alias(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::{Field, FieldValue, FieldValues};
    use proptest::prelude::*;

    fn italy() -> EntityRecord {
        EntityRecord::new("Италия", "Рим")
            .with_fields(FieldValues::unknown().with(Field::Currency, FieldValue::from_text("Евро")))
    }

    #[test]
    fn test_entity_round_trip() {
        let store = KnowledgeStore::new();
        assert!(store.is_empty());
        assert!(store.put_entity(italy()));

        let found = store.get("  ИТАЛИЯ ").unwrap();
        assert!(!found.is_alias());
        assert_eq!(found.entity(), &italy());
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_alias_resolves_one_hop() {
        let store = KnowledgeStore::new();
        store.put_entity(italy());
        assert_eq!(store.put_alias(AliasRecord::new("Рим", "Италия")), AliasOutcome::Inserted);

        let found = store.get("рим").unwrap();
        assert!(found.is_alias());
        assert_eq!(found.entity().display_name, "Италия");
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.alias_count(), 1);
    }

    #[test]
    fn test_broken_alias_is_distinct_from_not_found() {
        let store = KnowledgeStore::new();
        assert_eq!(
            store.put_alias(AliasRecord::new("Рим", "Италия")),
            AliasOutcome::Dangling
        );

        assert!(matches!(
            store.get("Рим"),
            Err(LookupError::BrokenAlias { ref alias, ref target }) if alias == "рим" && target == "италия"
        ));
        assert!(matches!(store.get("Атлантида"), Err(LookupError::NotFound { .. })));
    }

    #[test]
    fn test_alias_never_overwrites_entity() {
        let store = KnowledgeStore::new();
        store.put_entity(EntityRecord::new("Люксембург", "Люксембург"));
        store.put_entity(EntityRecord::new("Джибути", "Джибути"));

        assert_eq!(
            store.put_alias(AliasRecord::new("Люксембург", "Люксембург")),
            AliasOutcome::SameAsTarget
        );
        assert_eq!(
            store.put_alias(AliasRecord::new("Джибути", "Люксембург")),
            AliasOutcome::Collision {
                existing: "джибути".to_string()
            }
        );
        assert!(!store.get("джибути").unwrap().is_alias());
    }

    #[test]
    fn test_entity_overwrites_and_last_write_wins() {
        let store = KnowledgeStore::new();
        store.put_entity(EntityRecord::new("Италия", "Рим"));
        store.put_entity(italy());

        assert_eq!(store.get("италия").unwrap().entity(), &italy());
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_empty_keys_are_rejected() {
        let store = KnowledgeStore::new();
        assert!(!store.put_entity(EntityRecord::new("   ", "Нигде")));
        assert_eq!(
            store.put_alias(AliasRecord::new(" ", "Италия")),
            AliasOutcome::EmptyKey
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_is_idempotent() {
        let store = KnowledgeStore::new();
        store.put_entity(italy());
        store.put_alias(AliasRecord::new("Рим", "Италия"));

        assert_eq!(store.get("рим").unwrap(), store.get("рим").unwrap());
    }

    #[test]
    fn test_concurrent_writers_keep_records_isolated() {
        let store = Arc::new(KnowledgeStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let name = format!("страна {} {}", t, i);
                        store.put_entity(EntityRecord::new(&name, format!("столица {} {}", t, i)));
                        store.put_alias(AliasRecord::new(format!("столица {} {}", t, i), &name));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.entity_count(), 800);
        assert_eq!(store.alias_count(), 800);
        for t in 0..8 {
            for i in 0..100 {
                let found = store.get(&format!("столица {} {}", t, i)).unwrap();
                assert_eq!(found.entity().name, format!("страна {} {}", t, i));
                assert_eq!(found.entity().capital, format!("столица {} {}", t, i));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_entity_round_trip(name in "[А-Яа-яЁё]{1,12}( [А-Яа-яЁё]{1,12}){0,2}") {
            let store = KnowledgeStore::new();
            let record = EntityRecord::new(&name, "Столица");
            prop_assert!(store.put_entity(record.clone()));
            let found = store.get(&normalize_key(&name)).unwrap();
            prop_assert_eq!(found.entity(), &record);
        }

        #[test]
        fn prop_alias_resolves_to_target(
            country in "[А-Я][а-я]{2,10}",
            capital in "[А-Я][а-я]{2,10}",
        ) {
            prop_assume!(normalize_key(&country) != normalize_key(&capital));
            let store = KnowledgeStore::new();
            let record = EntityRecord::new(&country, &capital);
            store.put_entity(record.clone());
            store.put_alias(AliasRecord::new(&capital, &country));

            let found = store.get(&capital).unwrap();
            prop_assert_eq!(found.entity(), &record);
        }
    }
}
