use bson::{doc, Document};
use futures::TryStreamExt;
use log::{info, warn};
use mongodb::{
    options::{ClientOptions, IndexOptions, ReturnDocument, ServerApi, ServerApiVersion},
    Client, ClientSession, Collection, Database, IndexModel,
};
use std::sync::Arc;
use std::time::Duration;

use super::{Filter, Id, Query, Record, SortKey, Store, StoreError, WriteBatch, WriteOp};
use crate::models::{
    event::Event,
    itinerary::{Itinerary, ItineraryPoint},
    location::GeoPoint,
    point_of_interest::PointOfInterest,
    restaurant::Restaurant,
    review::{ItineraryReview, ReviewPhoto, ReviewPhotoData},
};

const COUNTERS: &str = "Counters";
const DISTANCE_FIELD: &str = "_distance_m";

pub async fn create_mongo_client(uri: &str) -> Result<Arc<Client>, StoreError> {
    info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    let client = Client::with_options(client_options)?;

    // A failed ping is not fatal: the pool reconnects once the server is reachable.
    match client.database("admin").run_command(doc! {"ping": 1}).await {
        Ok(_) => info!("Successfully connected to MongoDB and verified with ping command"),
        Err(e) => warn!("Connected to MongoDB but ping test failed: {}", e),
    }

    Ok(Arc::new(client))
}

#[derive(Clone)]
pub struct MongoStore {
    client: Arc<Client>,
    db: Database,
}

fn sort_document(keys: &[SortKey]) -> Document {
    let mut sort = Document::new();
    for key in keys {
        sort.insert(key.field.clone(), if key.descending { -1 } else { 1 });
    }
    if !sort.contains_key("id") {
        sort.insert("id", 1);
    }
    sort
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = create_mongo_client(uri).await?;
        let store = Self {
            db: client.database(database),
            client,
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    fn documents(&self, collection: &str) -> Collection<Document> {
        self.db.collection::<Document>(collection)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: Option<IndexOptions>,
    ) -> Result<(), StoreError> {
        let model = match options {
            Some(options) => IndexModel::builder().keys(keys).options(options).build(),
            None => IndexModel::builder().keys(keys).build(),
        };
        self.documents(collection).create_index(model).await?;
        Ok(())
    }

    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || Some(IndexOptions::builder().unique(true).build());

        for collection in [
            PointOfInterest::COLLECTION,
            Restaurant::COLLECTION,
            Event::COLLECTION,
            Itinerary::COLLECTION,
            ItineraryPoint::COLLECTION,
            ItineraryReview::COLLECTION,
            ReviewPhoto::COLLECTION,
            ReviewPhotoData::COLLECTION,
        ] {
            self.create_index(collection, doc! { "id": 1 }, unique()).await?;
        }

        for collection in [
            PointOfInterest::COLLECTION,
            Restaurant::COLLECTION,
            Event::COLLECTION,
        ] {
            self.create_index(collection, doc! { "location": "2dsphere" }, None)
                .await?;
        }

        self.create_index(
            ItineraryPoint::COLLECTION,
            doc! { "itinerary": 1, "day": 1, "order": 1 },
            None,
        )
        .await?;

        // One review per (itinerary, user); anonymous reviews are exempt.
        self.create_index(
            ItineraryReview::COLLECTION,
            doc! { "itinerary": 1, "user": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "user": { "$type": "number" } })
                    .build(),
            ),
        )
        .await?;

        info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn apply(&self, op: WriteOp, session: &mut ClientSession) -> Result<(), StoreError> {
        match op {
            WriteOp::Insert {
                collection,
                document,
            } => {
                self.documents(collection)
                    .insert_one(document)
                    .session(&mut *session)
                    .await?;
            }
            WriteOp::Replace {
                collection,
                id,
                document,
            } => {
                self.documents(collection)
                    .replace_one(doc! { "id": id }, document)
                    .session(&mut *session)
                    .await?;
            }
            WriteOp::Update {
                collection,
                filter,
                set,
            } => {
                self.documents(collection)
                    .update_many(filter.to_document(), doc! { "$set": set })
                    .session(&mut *session)
                    .await?;
            }
            WriteOp::Delete { collection, filter } => {
                self.documents(collection)
                    .delete_many(filter.to_document())
                    .session(&mut *session)
                    .await?;
            }
        }
        Ok(())
    }
}

impl Store for MongoStore {
    async fn next_id(&self, collection: &str) -> Result<Id, StoreError> {
        let counter = self
            .documents(COUNTERS)
            .find_one_and_update(doc! { "_id": collection }, doc! { "$inc": { "seq": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| {
                StoreError::Database(format!("counter for {} was not created", collection))
            })?;

        counter
            .get_i64("seq")
            .map_err(|e| StoreError::Database(format!("invalid counter for {}: {}", collection, e)))
    }

    async fn find_by_id<T: Record>(&self, id: Id) -> Result<Option<T>, StoreError> {
        let collection: Collection<T> = self.db.collection(T::COLLECTION);
        Ok(collection.find_one(doc! { "id": id }).await?)
    }

    async fn find<T: Record>(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let collection: Collection<T> = self.db.collection(T::COLLECTION);
        let mut action = collection
            .find(query.filter.to_document())
            .sort(sort_document(&query.sort))
            .skip(query.skip);
        if let Some(limit) = query.limit {
            action = action.limit(limit as i64);
        }

        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count<T: Record>(&self, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self
            .documents(T::COLLECTION)
            .count_documents(filter.to_document())
            .await?)
    }

    async fn near<T: Record>(
        &self,
        center: &GeoPoint,
        radius_km: f64,
        filter: &Filter,
    ) -> Result<Vec<(T, f64)>, StoreError> {
        let mut geo_near = doc! {
            "near": {
                "type": "Point",
                "coordinates": [center.longitude(), center.latitude()],
            },
            "distanceField": DISTANCE_FIELD,
            "maxDistance": radius_km * 1000.0,
            "spherical": true,
        };
        let query = filter.to_document();
        if !query.is_empty() {
            geo_near.insert("query", query);
        }

        let mut cursor = self
            .documents(T::COLLECTION)
            .aggregate(vec![doc! { "$geoNear": geo_near }])
            .await?;

        let mut results = Vec::new();
        while let Some(mut document) = cursor.try_next().await? {
            let meters = document
                .remove(DISTANCE_FIELD)
                .and_then(|distance| distance.as_f64())
                .unwrap_or_default();
            results.push((bson::from_document::<T>(document)?, meters / 1000.0));
        }
        Ok(results)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut session = self.client.start_session().await?;
        let transactional = batch.len() > 1;
        if transactional {
            session.start_transaction().await?;
        }

        for op in batch.into_ops() {
            if let Err(err) = self.apply(op, &mut session).await {
                if transactional {
                    if let Err(abort_err) = session.abort_transaction().await {
                        warn!("Failed to abort transaction: {}", abort_err);
                    }
                }
                return Err(err);
            }
        }

        if transactional {
            session.commit_transaction().await?;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! {"ping": 1}).await?;
        Ok(())
    }
}
