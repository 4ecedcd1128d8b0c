use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use futures::future::{self, BoxFuture, FutureExt};
use uuid::Uuid;

use crate::errors::MeetlyError;
use crate::store::{self, Collection, Document, DocumentStore, FieldOp, Predicate, StoredDocument};

/// A `DocumentStore` held entirely in memory. Used by the tests and for
/// running without a database.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<Collection, BTreeMap<String, Document>>) -> T) -> T {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<Collection, BTreeMap<String, Document>>) -> T) -> T {
        let mut guard = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        f(&mut guard)
    }
}

impl DocumentStore for MemoryStore {
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> BoxFuture<Result<Option<StoredDocument>, MeetlyError>> {
        let result = self.read(|collections| {
            collections
                .get(&collection)
                .and_then(|documents| documents.get(id))
                .map(|fields| StoredDocument {
                    id: id.to_owned(),
                    fields: fields.clone(),
                })
        });

        future::ready(Ok(result)).boxed()
    }

    fn query(
        &self,
        collection: Collection,
        predicates: Vec<Predicate>,
    ) -> BoxFuture<Result<Vec<StoredDocument>, MeetlyError>> {
        let results = self.read(|collections| {
            collections
                .get(&collection)
                .into_iter()
                .flat_map(|documents| documents.iter())
                .filter(|(_, fields)| predicates.iter().all(|p| p.matches(fields)))
                .map(|(id, fields)| StoredDocument {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect::<Vec<_>>()
        });

        future::ready(Ok(results)).boxed()
    }

    fn set(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> BoxFuture<Result<(), MeetlyError>> {
        self.write(|collections| {
            collections
                .entry(collection)
                .or_default()
                .insert(id.to_owned(), fields);
        });

        future::ready(Ok(())).boxed()
    }

    fn add(&self, collection: Collection, fields: Document) -> BoxFuture<Result<String, MeetlyError>> {
        let id = Uuid::new_v4().to_string();

        self.write(|collections| {
            collections
                .entry(collection)
                .or_default()
                .insert(id.clone(), fields);
        });

        future::ready(Ok(id)).boxed()
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        ops: Vec<FieldOp>,
    ) -> BoxFuture<Result<(), MeetlyError>> {
        let result = self.write(|collections| -> Result<(), MeetlyError> {
            let fields = collections
                .get_mut(&collection)
                .and_then(|documents| documents.get_mut(id))
                .ok_or_else(|| MeetlyError::not_found(collection, id))?;

            // apply to a copy so that a failing op leaves the document as it was
            let mut updated = fields.clone();
            store::apply(&mut updated, &ops)?;
            *fields = updated;

            Ok(())
        });

        future::ready(result).boxed()
    }

    fn delete(&self, collection: Collection, id: &str) -> BoxFuture<Result<(), MeetlyError>> {
        let result = self.write(|collections| {
            collections
                .get_mut(&collection)
                .and_then(|documents| documents.remove(id))
                .map(|_| ())
                .ok_or_else(|| MeetlyError::not_found(collection, id))
        });

        future::ready(result).boxed()
    }
}
