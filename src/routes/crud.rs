//! Handlers shared by every REST resource.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::Value;

use crate::config::AppConfig;
use crate::db::{Id, Store};
use crate::error::ApiError;
use crate::services::resource_service::{self, ListParams, PageLimits, Resource};

/// Registers list/create on `""` and retrieve/replace/patch/delete on `/{id}`.
/// Call after any fixed sub-paths so they are matched first.
pub fn routes<S: Store, T: Resource>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list::<S, T>))
            .route(web::post().to(create::<S, T>)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(retrieve::<S, T>))
            .route(web::put().to(replace::<S, T>))
            .route(web::patch().to(patch::<S, T>))
            .route(web::delete().to(delete::<S, T>)),
    );
}

pub async fn list<S: Store, T: Resource>(
    store: web::Data<S>,
    config: web::Data<AppConfig>,
    params: web::Query<ListParams>,
    filters: web::Query<T::Filters>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let limits = PageLimits {
        page_size: config.page_size,
        max_page_size: config.max_page_size,
    };
    let page =
        resource_service::list::<S, T>(&store, limits, &params, &filters, &req.full_url()).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn retrieve<S: Store, T: Resource>(
    store: web::Data<S>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let view = resource_service::retrieve::<S, T>(&store, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn create<S: Store, T: Resource>(
    store: web::Data<S>,
    input: web::Json<T>,
) -> Result<HttpResponse, ApiError> {
    let view = resource_service::create::<S, T>(&store, input.into_inner()).await?;
    Ok(HttpResponse::Created().json(view))
}

pub async fn replace<S: Store, T: Resource>(
    store: web::Data<S>,
    path: web::Path<Id>,
    input: web::Json<T>,
) -> Result<HttpResponse, ApiError> {
    let view = resource_service::replace::<S, T>(&store, path.into_inner(), input.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn patch<S: Store, T: Resource>(
    store: web::Data<S>,
    path: web::Path<Id>,
    changes: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let view = resource_service::patch::<S, T>(&store, path.into_inner(), changes.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn delete<S: Store, T: Resource>(
    store: web::Data<S>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    resource_service::delete::<S, T>(&store, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
