/// API routes and handlers
pub mod auth;
pub mod clients;
pub mod export;
pub mod health;
pub mod invoices;
pub mod profile;
pub mod templates;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// Binary PDF attachment response
pub(crate) fn pdf_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}
