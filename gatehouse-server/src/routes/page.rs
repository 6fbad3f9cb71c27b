//! The static verification page.

use axum::response::Html;

/// The page served at `/` and at the OAuth2 callback.
///
/// Its script posts the `code` query parameter to `/verify/process`.
pub const INDEX: &str = include_str!("../../public/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX)
}
