//! Turns a free-text travel request into a stored itinerary by way of a
//! [`TextGenerator`].
//!
//! The pipeline is linear: validate the request, build the prompt, call the
//! generator under a deadline, decode its reply strictly, check the plan
//! against the candidate points and write the itinerary and its points in one
//! batch. Any failure leaves the store untouched.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, error, info};
use regex::Regex;

use crate::db::{Filter, Id, Record, Store, StoreError, WriteBatch};
use crate::error::ApiError;
use crate::models::{
    generation::{CandidatePoi, GeneratedItinerary, GenerationOutcome, GenerationReply, GenerationRequest},
    itinerary::{Itinerary, ItineraryDetail, ItineraryPoint, MAX_POSITION},
    place::PlaceRef,
    point_of_interest::PointOfInterest,
    time,
};
use crate::services::{
    itinerary_service::{resolve_places, to_geojson},
    llm_service::{LlmError, Prompt, TextGenerator},
};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n?(.*?)\s*```$").expect("valid regex"));

const SYSTEM_PROMPT: &str = "You are an assistant that designs tourist itineraries for La Palma. \
Reply ONLY with a valid JSON object and no additional text.";

#[derive(Debug)]
pub enum GenerationError {
    InvalidRequest(String),
    Llm(LlmError),
    Timeout(Duration),
    MalformedReply(String),
    InvalidPlan(String),
    Store(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::InvalidRequest(msg) => write!(f, "{}", msg),
            GenerationError::Llm(err) => write!(f, "Text generation failed: {}", err),
            GenerationError::Timeout(limit) => {
                write!(f, "Text generation did not answer within {:?}", limit)
            }
            GenerationError::MalformedReply(msg) => write!(f, "Malformed generator reply: {}", msg),
            GenerationError::InvalidPlan(msg) => write!(f, "Generated itinerary is invalid: {}", msg),
            GenerationError::Store(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        GenerationError::Llm(err)
    }
}

impl From<StoreError> for GenerationError {
    fn from(err: StoreError) -> Self {
        GenerationError::Store(err.to_string())
    }
}

impl From<ApiError> for GenerationError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => {
                GenerationError::InvalidRequest(msg)
            }
            ApiError::Internal(msg) => GenerationError::Store(msg),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => {
                error!("Itinerary generation failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

pub fn validate_request(request: &GenerationRequest) -> Result<(), GenerationError> {
    if request.query.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("The 'query' field is required".to_string()));
    }
    if request.available_pois.is_empty() {
        return Err(GenerationError::InvalidRequest(
            "The 'available_pois' field is required".to_string(),
        ));
    }
    Ok(())
}

/// Candidate ids that are not stored points of interest.
async fn unknown_candidates<S: Store>(
    store: &S,
    candidates: &[CandidatePoi],
) -> Result<Vec<Id>, GenerationError> {
    let ids: BTreeSet<Id> = candidates.iter().map(|poi| poi.id).collect();
    let found: HashSet<Id> = store
        .find_all::<PointOfInterest>(Filter::is_in("id", ids.iter().copied()))
        .await?
        .into_iter()
        .filter_map(|poi| poi.id)
        .collect();
    Ok(ids.into_iter().filter(|id| !found.contains(id)).collect())
}

pub fn compose_context(candidates: &[CandidatePoi]) -> String {
    candidates
        .iter()
        .map(|poi| {
            format!(
                "- {} (ID: {}): {} - Type: {}, Difficulty: {}",
                poi.name, poi.id, poi.description, poi.category, poi.difficulty
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compose_prompt(query: &str, context: &str) -> Prompt {
    let user = format!(
        r#"As an expert on tourism in La Palma, build an itinerary for this request: {query}

Use ONLY the following points of interest, referenced by their ID:
{context}

IMPORTANT: answer ONLY with a JSON object of exactly this shape:
{{
  "display": "Text shown to the traveller: an engaging title, a short introduction, one section per day with the visits, recommended times and practical tips, and a closing recommendation.",
  "data": {{
    "title": "Itinerary title",
    "description": "Overall description",
    "start_date": "YYYY-MM-DD",
    "end_date": "YYYY-MM-DD",
    "days": [
      {{
        "day": 1,
        "points": [
          {{ "point_of_interest": <ID from the list>, "order": 1, "notes": "Notes for this stop" }}
        ]
      }}
    ]
  }}
}}
Days and orders start at 1 and orders are unique within a day."#
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Decodes the generator's reply, tolerating one surrounding code fence.
pub fn extract_reply(raw: &str) -> Result<GenerationReply, GenerationError> {
    let trimmed = raw.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map_or(trimmed, |inner| inner.as_str());

    serde_json::from_str(body).map_err(|e| GenerationError::MalformedReply(e.to_string()))
}

pub fn validate_plan(plan: &GeneratedItinerary, candidates: &HashSet<Id>) -> Result<(), GenerationError> {
    let invalid = |msg: String| Err(GenerationError::InvalidPlan(msg));

    if plan.title.trim().is_empty() {
        return invalid("title is empty".to_string());
    }
    if plan.start_date > plan.end_date {
        return invalid(format!(
            "start_date {} is after end_date {}",
            plan.start_date, plan.end_date
        ));
    }

    let mut seen_days = HashSet::new();
    for day in &plan.days {
        if day.day < 1 {
            return invalid("day numbers start at 1".to_string());
        }
        if day.day > MAX_POSITION {
            return invalid(format!("day {} is out of range", day.day));
        }
        if !seen_days.insert(day.day) {
            return invalid(format!("day {} appears more than once", day.day));
        }
        let mut seen_orders = HashSet::new();
        for stop in &day.points {
            if stop.order < 1 {
                return invalid(format!("day {} has an order below 1", day.day));
            }
            if stop.order > MAX_POSITION {
                return invalid(format!("day {} has an order out of range", day.day));
            }
            if !seen_orders.insert(stop.order) {
                return invalid(format!("day {} repeats order {}", day.day, stop.order));
            }
            if !candidates.contains(&stop.point_of_interest) {
                return invalid(format!(
                    "point of interest {} was not among the candidates",
                    stop.point_of_interest
                ));
            }
        }
    }
    Ok(())
}

/// Writes the itinerary and all of its points as one batch.
pub async fn materialize<S: Store>(
    store: &S,
    plan: &GeneratedItinerary,
) -> Result<(Itinerary, Vec<ItineraryPoint>), GenerationError> {
    let now = time::now();
    let mut itinerary = Itinerary {
        id: None,
        title: plan.title.trim().to_string(),
        description: plan.description.clone(),
        user: None,
        start_date: plan.start_date,
        end_date: plan.end_date,
        is_completed: false,
        created_at: Some(now),
        updated_at: Some(now),
    };
    let itinerary_id = store.next_id(Itinerary::COLLECTION).await?;
    itinerary.set_id(itinerary_id);

    let mut batch = WriteBatch::new();
    batch.insert(&itinerary)?;

    let mut points = Vec::new();
    for day in &plan.days {
        let mut stops: Vec<_> = day.points.iter().collect();
        stops.sort_by_key(|stop| stop.order);
        for stop in stops {
            let mut point = ItineraryPoint::new(
                itinerary_id,
                PlaceRef::Poi(stop.point_of_interest),
                day.day,
                stop.order,
                stop.notes.clone(),
            );
            point.set_id(store.next_id(ItineraryPoint::COLLECTION).await?);
            batch.insert(&point)?;
            points.push(point);
        }
    }

    store.commit(batch).await?;
    Ok((itinerary, points))
}

pub async fn generate<S: Store, G: TextGenerator>(
    store: &S,
    generator: &G,
    deadline: Duration,
    request: GenerationRequest,
) -> Result<GenerationOutcome, GenerationError> {
    validate_request(&request)?;

    let unknown = unknown_candidates(store, &request.available_pois).await?;
    if !unknown.is_empty() {
        let ids: Vec<String> = unknown.iter().map(Id::to_string).collect();
        return Err(GenerationError::InvalidRequest(format!(
            "Unknown points of interest: {}",
            ids.join(", ")
        )));
    }

    let context = compose_context(&request.available_pois);
    let prompt = compose_prompt(&request.query, &context);

    info!(
        "Generating itinerary from {} candidate points",
        request.available_pois.len()
    );
    let raw = tokio::time::timeout(deadline, generator.complete(&prompt))
        .await
        .map_err(|_| GenerationError::Timeout(deadline))??;
    debug!("Raw generator reply: {}", raw);

    let reply = extract_reply(&raw)?;
    let candidates: HashSet<Id> = request.available_pois.iter().map(|poi| poi.id).collect();
    validate_plan(&reply.data, &candidates)?;

    let (itinerary, points) = materialize(store, &reply.data).await?;
    let itinerary_id = itinerary.id.unwrap_or_default();
    info!(
        "Stored generated itinerary {} with {} points",
        itinerary_id,
        points.len()
    );

    let details = resolve_places(store, points).await?;
    let geojson = to_geojson(&details);
    Ok(GenerationOutcome {
        display: reply.display,
        itinerary_id,
        itinerary: ItineraryDetail {
            itinerary,
            points: details,
        },
        geojson,
    })
}
