use crate::repository_from_request;
use crate::state::AppState;
use axum::routing::{get, post};
use movies_dal::movie::MovieRepository;

/// Path under which movie resource is served
pub const RESOURCE_PATH: &str = "filme";

repository_from_request!(MovieRepository);

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;

    #[derive(utoipa::OpenApi)]
    #[openapi(paths(
        crud_api::create,
        crud_api::list,
        crud_api::get,
        crud_api::update,
        crud_api::patch,
        crud_api::delete
    ))]
    struct ApiDocs;

    ApiDocs::openapi()
}

pub mod crud_api {
    use axum::{
        extract::{rejection::QueryRejection, Path, Query, State},
        response::IntoResponse,
        Json,
    };
    use http::{header, StatusCode};
    use movies_dal::movie::{CreateMovie, Movie, MovieRepository, ReadMovie, UpdateMovie};
    use serde_json::Value;
    use tracing::debug;

    use super::RESOURCE_PATH;
    use crate::{
        error::{ApiError, ApiResult},
        rest_api::{
            patch::{parse_document, patched_update},
            Paging,
        },
        state::AppState,
        validate::{validate, JsonBody, ValidJson},
    };

    #[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Movie", operation_id = "createMovie",
        request_body = CreateMovie,
        responses((status = StatusCode::CREATED, description = "Created Movie", body = ReadMovie),
            (status = StatusCode::BAD_REQUEST, description = "Invalid Movie", body = crate::validate::ValidationProblem))))]
    pub async fn create(
        State(state): State<AppState>,
        repository: MovieRepository,
        ValidJson(payload): ValidJson<CreateMovie>,
    ) -> ApiResult<impl IntoResponse> {
        let mut movie = Movie::from(payload);
        movie.id = repository.insert(&movie).await?;
        debug!("Created movie {}", movie.id);

        let location = state.build_url(&format!("{RESOURCE_PATH}/{}", movie.id))?;
        Ok((
            StatusCode::CREATED,
            [(header::LOCATION, location.to_string())],
            Json(ReadMovie::from(movie)),
        ))
    }

    #[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Movie", operation_id = "listMovie",
        params(Paging), responses((status = StatusCode::OK, description = "List of Movies in insertion order", body = Vec<ReadMovie>))))]
    pub async fn list(
        State(state): State<AppState>,
        repository: MovieRepository,
        paging: Result<Query<Paging>, QueryRejection>,
    ) -> ApiResult<impl IntoResponse> {
        let Query(paging) = paging.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
        let listing_params = paging.into_listing_params(state.config().default_page_size);
        let movies = repository.find_page(listing_params).await?;
        let rows = movies.into_iter().map(ReadMovie::from).collect::<Vec<_>>();
        Ok((StatusCode::OK, Json(rows)))
    }

    #[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{id}", tag = "Movie", operation_id = "getMovie",
        params(("id" = i64, Path, description = "Movie id")),
        responses((status = StatusCode::OK, description = "Get one", body = ReadMovie),
            (status = StatusCode::NOT_FOUND, description = "Movie does not exist"))))]
    pub async fn get(
        Path(id): Path<i64>,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        let movie = repository.find_by_id(id).await?.ok_or(ApiError::NotFound)?;

        Ok((StatusCode::OK, Json(ReadMovie::from(movie))))
    }

    #[cfg_attr(feature = "openapi",  utoipa::path(put, path = "/{id}", tag = "Movie", operation_id = "updateMovie",
        params(("id" = i64, Path, description = "Movie id")),
        request_body = UpdateMovie,
        responses((status = StatusCode::NO_CONTENT, description = "Updated all fields of Movie"),
            (status = StatusCode::BAD_REQUEST, description = "Invalid Movie", body = crate::validate::ValidationProblem),
            (status = StatusCode::NOT_FOUND, description = "Movie does not exist"))))]
    pub async fn update(
        Path(id): Path<i64>,
        repository: MovieRepository,
        JsonBody(payload): JsonBody<UpdateMovie>,
    ) -> ApiResult<impl IntoResponse> {
        let mut movie = repository.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
        validate(&payload).map_err(ApiError::InvalidRequest)?;

        // all fields are replaced, record deleted meanwhile is reported as not found
        movie.merge(payload);
        repository.update(&movie).await?;
        debug!("Updated movie {id}");

        Ok(StatusCode::NO_CONTENT)
    }

    #[cfg_attr(feature = "openapi",  utoipa::path(patch, path = "/{id}", tag = "Movie", operation_id = "patchMovie",
        params(("id" = i64, Path, description = "Movie id")),
        request_body = Vec<crate::rest_api::patch::PatchOperation>,
        responses((status = StatusCode::NO_CONTENT, description = "Patched Movie"),
            (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Patch cannot be applied or result is invalid", body = crate::validate::ValidationProblem),
            (status = StatusCode::NOT_FOUND, description = "Movie does not exist"))))]
    pub async fn patch(
        Path(id): Path<i64>,
        repository: MovieRepository,
        JsonBody(body): JsonBody<Value>,
    ) -> ApiResult<impl IntoResponse> {
        let mut transaction = repository.begin_write().await?;
        let mut movie = transaction.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
        let changes = parse_document(body)
            .and_then(|document| patched_update(&movie, &document))
            .map_err(|problem| {
                debug!("Patch of movie {id} rejected: {problem}");
                ApiError::UnprocessableRequest(problem)
            })?;

        movie.merge(changes);
        transaction.update(&movie).await?;
        transaction.commit().await?;
        debug!("Patched movie {id}");

        Ok(StatusCode::NO_CONTENT)
    }

    #[cfg_attr(feature = "openapi",  utoipa::path(delete, path = "/{id}", tag = "Movie", operation_id = "deleteMovie",
        params(("id" = i64, Path, description = "Movie id")),
        responses((status = StatusCode::NO_CONTENT, description = "Deleted Movie"),
            (status = StatusCode::NOT_FOUND, description = "Movie does not exist"))))]
    pub async fn delete(
        Path(id): Path<i64>,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        repository.delete(id).await?;

        Ok(StatusCode::NO_CONTENT)
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(crud_api::create).get(crud_api::list))
        .route(
            "/{id}",
            get(crud_api::get)
                .put(crud_api::update)
                .patch(crud_api::patch)
                .delete(crud_api::delete),
        )
}
