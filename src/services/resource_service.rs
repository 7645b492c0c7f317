//! Generic list/retrieve/create/update/delete over any [`Resource`].

use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::db::{Filter, Id, Query, Record, SortKey, Store, WriteBatch};
use crate::error::ApiError;
use crate::models::page::Page;

/// A record type exposed through the REST façade.
#[allow(async_fn_in_trait)]
pub trait Resource: Record {
    /// Singular, capitalised, used in error messages.
    const NAME: &'static str;
    const SEARCH_FIELDS: &'static [&'static str];
    const ORDERING_FIELDS: &'static [&'static str];
    const DEFAULT_ORDERING: &'static [&'static str];

    /// Query-string filters accepted by the list endpoint.
    type Filters: DeserializeOwned + 'static;
    type View: Serialize;

    fn filter(filters: &Self::Filters) -> Result<Filter, ApiError>;

    /// Assigns server-managed fields before a write. `existing` is the stored
    /// version on update and `None` on create.
    fn prepare(&mut self, existing: Option<&Self>);

    async fn validate<S: Store>(&self, store: &S) -> Result<(), ApiError>;

    async fn present<S: Store>(store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError>;

    /// Writes that must accompany the deletion of record `id`.
    fn cascade(_id: Id) -> WriteBatch {
        WriteBatch::new()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub page_size: u64,
    pub max_page_size: u64,
}

/// Parses `ordering=name,-created_at`. Terms outside `allowed` are dropped; if
/// none remain the default ordering applies.
pub fn parse_ordering(raw: Option<&str>, allowed: &[&str], default: &[&str]) -> Vec<SortKey> {
    let requested: Vec<SortKey> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter_map(|term| {
            let (field, descending) = match term.strip_prefix('-') {
                Some(field) => (field, true),
                None => (term, false),
            };
            allowed.contains(&field).then(|| SortKey {
                field: field.to_string(),
                descending,
            })
        })
        .collect();

    if !requested.is_empty() {
        return requested;
    }
    parse_ordering_terms(default)
}

fn parse_ordering_terms(terms: &[&str]) -> Vec<SortKey> {
    terms
        .iter()
        .map(|term| match term.strip_prefix('-') {
            Some(field) => SortKey::desc(field),
            None => SortKey::asc(term),
        })
        .collect()
}

fn page_url(base: &Url, page: u64) -> String {
    let pairs: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);
    if !pairs.is_empty() || page > 1 {
        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        if page > 1 {
            query.append_pair("page", &page.to_string());
        }
    }
    url.to_string()
}

pub async fn list<S: Store, T: Resource>(
    store: &S,
    limits: PageLimits,
    params: &ListParams,
    filters: &T::Filters,
    request_url: &Url,
) -> Result<Page<T::View>, ApiError> {
    let mut filter = T::filter(filters)?;
    if let Some(search) = params.search.as_deref().map(str::trim) {
        if !search.is_empty() && !T::SEARCH_FIELDS.is_empty() {
            filter = filter.and(Filter::search(T::SEARCH_FIELDS, search));
        }
    }

    let page_size = params
        .page_size
        .as_deref()
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(limits.page_size)
        .min(limits.max_page_size);

    let page = match params.page.as_deref() {
        None => 1,
        Some("last") => 0,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|page| *page > 0)
            .ok_or_else(|| ApiError::not_found("Invalid page."))?,
    };

    let count = store.count::<T>(&filter).await?;
    let pages = count.div_ceil(page_size).max(1);
    let page = if page == 0 { pages } else { page };
    if page > pages {
        return Err(ApiError::not_found("Invalid page."));
    }

    let mut query = Query::new(filter)
        .skip((page - 1) * page_size)
        .limit(page_size);
    for key in parse_ordering(params.ordering.as_deref(), T::ORDERING_FIELDS, T::DEFAULT_ORDERING) {
        query = query.sort(key);
    }

    let records = store.find::<T>(&query).await?;
    let results = T::present(store, records).await?;

    Ok(Page {
        count,
        next: (page < pages).then(|| page_url(request_url, page + 1)),
        previous: (page > 1).then(|| page_url(request_url, page - 1)),
        results,
    })
}

pub async fn fetch<S: Store, T: Resource>(store: &S, id: Id) -> Result<T, ApiError> {
    store
        .find_by_id::<T>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} {} not found", T::NAME, id)))
}

pub async fn present_one<S: Store, T: Resource>(store: &S, record: T) -> Result<T::View, ApiError> {
    T::present(store, vec![record])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal(format!("{} could not be presented", T::NAME)))
}

pub async fn retrieve<S: Store, T: Resource>(store: &S, id: Id) -> Result<T::View, ApiError> {
    let record = fetch::<S, T>(store, id).await?;
    present_one(store, record).await
}

pub async fn create<S: Store, T: Resource>(store: &S, mut record: T) -> Result<T::View, ApiError> {
    record.prepare(None);
    record.validate(store).await?;
    let record = store.insert(record).await?;
    info!("Created {} {:?}", T::NAME, record.id());
    present_one(store, record).await
}

pub async fn replace<S: Store, T: Resource>(
    store: &S,
    id: Id,
    mut record: T,
) -> Result<T::View, ApiError> {
    let existing = fetch::<S, T>(store, id).await?;
    record.prepare(Some(&existing));
    record.validate(store).await?;
    store.replace(&record).await?;
    present_one(store, record).await
}

/// Applies the top-level fields of `changes` over the stored record.
pub async fn patch<S: Store, T: Resource>(
    store: &S,
    id: Id,
    changes: Value,
) -> Result<T::View, ApiError> {
    let Value::Object(changes) = changes else {
        return Err(ApiError::bad_request("Expected a JSON object"));
    };

    let existing = fetch::<S, T>(store, id).await?;
    let mut merged = serde_json::to_value(&existing)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize {}: {}", T::NAME, e)))?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(changes);
    }

    let record: T = serde_json::from_value(merged).map_err(|e| ApiError::bad_request(e.to_string()))?;
    replace(store, id, record).await
}

pub async fn delete<S: Store, T: Resource>(store: &S, id: Id) -> Result<(), ApiError> {
    fetch::<S, T>(store, id).await?;

    let mut batch = T::cascade(id);
    batch.delete::<T>(Filter::by_id(id));
    store.commit(batch).await?;
    info!("Deleted {} {}", T::NAME, id);
    Ok(())
}
