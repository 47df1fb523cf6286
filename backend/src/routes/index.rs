use axum::response::Html;

const INDEX_PAGE: &str = include_str!("../../templates/index.html");

/// Serves the upload form and gallery viewer
#[allow(clippy::unused_async)]
pub async fn handler() -> Html<&'static str> {
    Html(INDEX_PAGE)
}
