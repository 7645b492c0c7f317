//! Persistence layer.
//!
//! Handlers and services talk to a [`Store`], which is implemented by
//! [`mongo::MongoStore`] in production and [`memory::MemoryStore`] for local
//! development and tests. Records are plain serde types that serialize to BSON
//! documents, so both backends share one representation.

use bson::Document;
use serde::{de::DeserializeOwned, Serialize};

use crate::models::location::GeoPoint;

pub mod filter;
pub mod memory;
pub mod mongo;

pub use filter::Filter;

pub type Id = i64;

#[derive(Debug)]
pub enum StoreError {
    Serialization(String),
    Database(String),
    MissingId(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Serialization(err) => write!(f, "Serialization error: {}", err),
            StoreError::Database(err) => write!(f, "Database error: {}", err),
            StoreError::MissingId(collection) => {
                write!(f, "Record in {} has no id assigned", collection)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// A persisted entity. Ids are allocated by the store, never by clients.
pub trait Record: Serialize + DeserializeOwned + Clone + Unpin + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Option<Id>;
    fn set_id(&mut self, id: Id);

    fn to_document(&self) -> Result<Document, StoreError> {
        Ok(bson::to_document(self)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert {
        collection: &'static str,
        document: Document,
    },
    Replace {
        collection: &'static str,
        id: Id,
        document: Document,
    },
    /// `$set` the given fields on every matching document.
    Update {
        collection: &'static str,
        filter: Filter,
        set: Document,
    },
    Delete {
        collection: &'static str,
        filter: Filter,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &'static str {
        match self {
            WriteOp::Insert { collection, .. }
            | WriteOp::Replace { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }
}

/// Ordered writes that a store applies all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Record>(&mut self, record: &T) -> Result<&mut Self, StoreError> {
        if record.id().is_none() {
            return Err(StoreError::MissingId(T::COLLECTION));
        }
        self.ops.push(WriteOp::Insert {
            collection: T::COLLECTION,
            document: record.to_document()?,
        });
        Ok(self)
    }

    pub fn replace<T: Record>(&mut self, record: &T) -> Result<&mut Self, StoreError> {
        let id = record.id().ok_or(StoreError::MissingId(T::COLLECTION))?;
        self.ops.push(WriteOp::Replace {
            collection: T::COLLECTION,
            id,
            document: record.to_document()?,
        });
        Ok(self)
    }

    pub fn update<T: Record>(&mut self, filter: Filter, set: Document) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: T::COLLECTION,
            filter,
            set,
        });
        self
    }

    pub fn delete<T: Record>(&mut self, filter: Filter) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: T::COLLECTION,
            filter,
        });
        self
    }

    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[allow(async_fn_in_trait)]
pub trait Store: Clone + Send + Sync + 'static {
    /// Allocates the next id of a collection's sequence.
    async fn next_id(&self, collection: &str) -> Result<Id, StoreError>;

    async fn find_by_id<T: Record>(&self, id: Id) -> Result<Option<T>, StoreError>;

    async fn find<T: Record>(&self, query: &Query) -> Result<Vec<T>, StoreError>;

    async fn count<T: Record>(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Records whose `location` lies within `radius_km` of `center`, closest
    /// first, paired with their distance in kilometres.
    async fn near<T: Record>(
        &self,
        center: &GeoPoint,
        radius_km: f64,
        filter: &Filter,
    ) -> Result<Vec<(T, f64)>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert<T: Record>(&self, mut record: T) -> Result<T, StoreError> {
        record.set_id(self.next_id(T::COLLECTION).await?);
        let mut batch = WriteBatch::new();
        batch.insert(&record)?;
        self.commit(batch).await?;
        Ok(record)
    }

    async fn replace<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.replace(record)?;
        self.commit(batch).await
    }

    async fn find_all<T: Record>(&self, filter: Filter) -> Result<Vec<T>, StoreError> {
        self.find(&Query::new(filter)).await
    }
}
