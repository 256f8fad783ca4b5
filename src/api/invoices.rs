/// Invoice endpoints: creation plus ownership-checked PDF retrieval
use crate::{
    api::{pdf_response, profile::load_profile},
    auth::CurrentUser,
    context::AppContext,
    db::models::{ClientRecord, Invoice},
    error::{ApiError, ApiResult, ValidationError},
    render::{
        compute_totals, context::build_context, context::ClientInfo, document_number,
        render_document, DocumentKind, DocumentPayload, LineItem, MAX_LINE_ITEMS,
    },
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route("/api/invoices/:id/pdf", get(invoice_pdf))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CreateInvoiceRequest {
    client_id: Option<i64>,
    #[serde(alias = "line_items", alias = "lineItems")]
    items: Vec<LineItem>,
    tax_rate: f64,
    currency: String,
    discount: f64,
    notes: Option<String>,
}

async fn list_invoices(
    State(ctx): State<AppContext>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let rows = sqlx::query_as::<_, Invoice>(
        "SELECT id, user_id, client_id, number, payload, total, currency, created_at
         FROM invoices WHERE user_id = ?1 ORDER BY created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(&ctx.db)
    .await?;

    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|inv| {
            json!({
                "id": inv.id,
                "number": inv.number,
                "total": inv.total,
                "currency": inv.currency,
                "created_at": inv.created_at,
            })
        })
        .collect();

    Ok(Json(json!({ "ok": true, "items": items })))
}

async fn create_invoice(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(client_id) = req.client_id else {
        return Err(ValidationError::MissingFields.into());
    };
    if req.items.is_empty() {
        return Err(ValidationError::MissingFields.into());
    }
    if req.items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::TooManyItems.into());
    }

    // The client must exist and belong to the caller
    fetch_client(&ctx, client_id, user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let currency = if req.currency.trim().is_empty() {
        "EUR".to_string()
    } else {
        req.currency.clone()
    };

    let payload = DocumentPayload {
        line_items: req.items,
        tax_rate: req.tax_rate,
        currency: currency.clone(),
        discount: req.discount,
        notes: req.notes,
        ..DocumentPayload::default()
    };

    let totals = compute_totals(&payload.line_items, payload.discount, payload.tax_rate);
    let number = document_number();
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| ApiError::Internal(format!("payload serialization failed: {}", e)))?;

    let result = sqlx::query(
        "INSERT INTO invoices (user_id, client_id, number, payload, total, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(user.user_id)
    .bind(client_id)
    .bind(&number)
    .bind(&payload_json)
    .bind(totals.total)
    .bind(&currency)
    .bind(Utc::now())
    .execute(&ctx.db)
    .await?;

    Ok(Json(json!({
        "ok": true,
        "id": result.last_insert_rowid(),
        "number": number,
        "total": totals.total,
    })))
}

async fn invoice_pdf(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let invoice = sqlx::query_as::<_, Invoice>(
        "SELECT id, user_id, client_id, number, payload, total, currency, created_at
         FROM invoices WHERE id = ?1 AND user_id = ?2",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&ctx.db)
    .await?
    .ok_or(ApiError::NotFound)?;

    let payload: DocumentPayload = serde_json::from_str(&invoice.payload)
        .map_err(|e| ApiError::Internal(format!("stored payload unreadable: {}", e)))?;

    let profile = load_profile(&ctx.db, user.user_id).await?;
    let client = fetch_client(&ctx, invoice.client_id, user.user_id)
        .await?
        .map(|c| ClientInfo {
            name: c.name,
            address: c.address.unwrap_or_default(),
        });

    let template_ctx = build_context(profile.as_ref(), client);
    let bytes = render_document(DocumentKind::Invoice, &payload, &template_ctx, &invoice.number)?;

    Ok(pdf_response(
        &format!("fattura-{}.pdf", invoice.number),
        bytes,
    ))
}

async fn fetch_client(
    ctx: &AppContext,
    client_id: i64,
    user_id: i64,
) -> ApiResult<Option<ClientRecord>> {
    let client = sqlx::query_as::<_, ClientRecord>(
        "SELECT id, user_id, name, vat_number, address, notes, created_at
         FROM clients WHERE id = ?1 AND user_id = ?2",
    )
    .bind(client_id)
    .bind(user_id)
    .fetch_optional(&ctx.db)
    .await?;
    Ok(client)
}
