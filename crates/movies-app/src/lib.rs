pub mod error;
pub mod rest_api;
pub mod state;
pub mod validate;

/// Repository extractor, repository shares the connection pool from state
#[macro_export]
macro_rules! repository_from_request {
    ($repo:ty) => {
        impl axum::extract::FromRequestParts<$crate::state::AppState> for $repo {
            type Rejection = std::convert::Infallible;

            async fn from_request_parts(
                _parts: &mut http::request::Parts,
                state: &$crate::state::AppState,
            ) -> std::result::Result<Self, Self::Rejection> {
                Ok(<$repo>::new(state.pool().clone()))
            }
        }
    };
}
