use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use bson::{Bson, Document};

use super::{
    filter::{lookup, sort_order},
    Filter, Id, Query, Record, SortKey, Store, StoreError, WriteBatch, WriteOp,
};
use crate::models::location::GeoPoint;

type Collection = BTreeMap<Id, Document>;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<&'static str, Collection>,
    counters: HashMap<String, Id>,
}

/// Process-local store used for development and tests. Documents are kept in
/// their BSON form so that filters behave as they do against MongoDB.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

fn poisoned() -> StoreError {
    StoreError::Database("memory store lock poisoned".to_string())
}

fn id_of(document: &Document) -> Option<Id> {
    match document.get("id") {
        Some(Bson::Int64(id)) => Some(*id),
        Some(Bson::Int32(id)) => Some(i64::from(*id)),
        _ => None,
    }
}

fn apply(collection: &mut Collection, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Insert {
            collection: name,
            document,
        } => {
            let id = id_of(&document).ok_or(StoreError::MissingId(name))?;
            if collection.contains_key(&id) {
                return Err(StoreError::Database(format!(
                    "duplicate id {} in {}",
                    id, name
                )));
            }
            collection.insert(id, document);
        }
        WriteOp::Replace { id, document, .. } => {
            if let Some(existing) = collection.get_mut(&id) {
                *existing = document;
            }
        }
        WriteOp::Update { filter, set, .. } => {
            for document in collection.values_mut().filter(|doc| filter.matches(doc)) {
                for (key, value) in set.iter() {
                    document.insert(key.clone(), value.clone());
                }
            }
        }
        WriteOp::Delete { filter, .. } => {
            collection.retain(|_, document| !filter.matches(document));
        }
    }
    Ok(())
}

fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    documents.sort_by(|left, right| {
        keys.iter()
            .map(|key| {
                let ordering = sort_order(lookup(left, &key.field), lookup(right, &key.field));
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| id_of(left).cmp(&id_of(right)))
    });
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Store for MemoryStore {
    async fn next_id(&self, collection: &str) -> Result<Id, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let counter = state.counters.entry(collection.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn find_by_id<T: Record>(&self, id: Id) -> Result<Option<T>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        match state
            .collections
            .get(T::COLLECTION)
            .and_then(|documents| documents.get(&id))
        {
            Some(document) => Ok(Some(bson::from_document(document.clone())?)),
            None => Ok(None),
        }
    }

    async fn find<T: Record>(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let mut documents = self.matching(T::COLLECTION, &query.filter)?;
        sort_documents(&mut documents, &query.sort);

        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        documents
            .into_iter()
            .skip(query.skip as usize)
            .take(limit)
            .map(|document| Ok(bson::from_document(document)?))
            .collect()
    }

    async fn count<T: Record>(&self, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.matching(T::COLLECTION, filter)?.len() as u64)
    }

    async fn near<T: Record>(
        &self,
        center: &GeoPoint,
        radius_km: f64,
        filter: &Filter,
    ) -> Result<Vec<(T, f64)>, StoreError> {
        let mut hits = Vec::new();
        for document in self.matching(T::COLLECTION, filter)? {
            let location = match document.get("location") {
                Some(location @ Bson::Document(_)) => {
                    bson::from_bson::<GeoPoint>(location.clone())?
                }
                _ => continue,
            };
            let distance = center.distance_km(&location);
            if distance <= radius_km {
                hits.push((document, distance));
            }
        }
        hits.sort_by(|(_, left), (_, right)| left.total_cmp(right));

        hits.into_iter()
            .map(|(document, distance)| Ok((bson::from_document(document)?, distance)))
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        // Apply to copies of the touched collections; swap them in only if every op succeeds.
        let mut scratch: HashMap<&'static str, Collection> = HashMap::new();
        for op in batch.into_ops() {
            let name = op.collection();
            let collection = scratch.entry(name).or_insert_with(|| {
                state.collections.get(name).cloned().unwrap_or_default()
            });
            apply(collection, op)?;
        }

        state.collections.extend(scratch);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.state.read().map_err(|_| poisoned())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Spot {
        #[serde(default)]
        id: Option<Id>,
        name: String,
        rank: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<GeoPoint>,
    }

    impl Record for Spot {
        const COLLECTION: &'static str = "Spots";

        fn id(&self) -> Option<Id> {
            self.id
        }

        fn set_id(&mut self, id: Id) {
            self.id = Some(id);
        }
    }

    fn spot(name: &str, rank: i64, location: Option<GeoPoint>) -> Spot {
        Spot {
            id: None,
            name: name.to_string(),
            rank,
            location,
        }
    }

    #[actix_rt::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let first = store.insert(spot("a", 1, None)).await.unwrap();
        let second = store.insert(spot("b", 2, None)).await.unwrap();
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));

        let found: Option<Spot> = store.find_by_id(2).await.unwrap();
        assert_eq!(found.unwrap().name, "b");
    }

    #[actix_rt::test]
    async fn test_find_sorts_skips_and_limits() {
        let store = MemoryStore::new();
        for (name, rank) in [("a", 3), ("b", 1), ("c", 2), ("d", 1)] {
            store.insert(spot(name, rank, None)).await.unwrap();
        }

        let query = Query::new(Filter::All)
            .sort(SortKey::desc("rank"))
            .skip(1)
            .limit(2);
        let names: Vec<String> = store
            .find::<Spot>(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["c", "b"]);

        // Ties fall back to id order.
        let ranked = store
            .find::<Spot>(&Query::new(Filter::eq("rank", 1_i64)).sort(SortKey::asc("rank")))
            .await
            .unwrap();
        assert_eq!(ranked[0].name, "b");
        assert_eq!(ranked[1].name, "d");
        assert_eq!(store.count::<Spot>(&Filter::eq("rank", 1_i64)).await.unwrap(), 2);
    }

    #[actix_rt::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let store = MemoryStore::new();
        let existing = store.insert(spot("a", 1, None)).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.update::<Spot>(Filter::by_id(1), doc! { "rank": 10_i64 });
        // Duplicate id: the whole batch must be rejected.
        batch.insert(&existing).unwrap();
        assert!(store.commit(batch).await.is_err());

        let reloaded: Spot = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(reloaded.rank, 1);
    }

    #[actix_rt::test]
    async fn test_update_and_delete_many() {
        let store = MemoryStore::new();
        for rank in [1, 1, 2] {
            store.insert(spot("x", rank, None)).await.unwrap();
        }

        let mut batch = WriteBatch::new();
        batch.update::<Spot>(Filter::eq("rank", 1_i64), doc! { "name": "renamed" });
        batch.delete::<Spot>(Filter::eq("rank", 2_i64));
        store.commit(batch).await.unwrap();

        let all: Vec<Spot> = store.find_all(Filter::All).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s.name == "renamed"));
    }

    #[actix_rt::test]
    async fn test_near_filters_by_radius_and_sorts_by_distance() {
        let store = MemoryStore::new();
        let center = GeoPoint::new(28.68, -17.76);
        store
            .insert(spot("far", 1, Some(GeoPoint::new(28.75, -17.88))))
            .await
            .unwrap();
        store
            .insert(spot("close", 1, Some(GeoPoint::new(28.681, -17.761))))
            .await
            .unwrap();
        store
            .insert(spot("other island", 1, Some(GeoPoint::new(28.12, -15.43))))
            .await
            .unwrap();
        store.insert(spot("nowhere", 1, None)).await.unwrap();

        let hits: Vec<(Spot, f64)> = store.near(&center, 20.0, &Filter::All).await.unwrap();
        let names: Vec<&str> = hits.iter().map(|(s, _)| s.name.as_str()).collect();
        assert_eq!(names, vec!["close", "far"]);
        assert!(hits[0].1 < hits[1].1);
        assert!(hits.iter().all(|(_, d)| *d <= 20.0));
    }
}
