mod docs;
mod index;
pub mod v1;

use aide::axum::ApiRouter;
use axum::routing::get;

/// Creates the router with all handler routes
pub fn handler(show_api_docs: bool) -> ApiRouter {
    let router = ApiRouter::new()
        .route("/", get(index::handler))
        .nest("/api/v1", v1::handler());

    if show_api_docs {
        router.merge(docs::handler())
    } else {
        router
    }
}
