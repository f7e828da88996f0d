//! Admin page handlers: load the session, run the operation, render or redirect.

use super::{load_session, respond};
use crate::error::AppError;
use crate::extractors::SessionCookie;
use crate::service::FormFields;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};

pub async fn view_all(State(state): State<AppState>, cookie: SessionCookie) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.view_all(&session).await?))
}

pub async fn view_collection(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.view_collection(&session, &coll).await?))
}

pub async fn edit_fields_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.edit_fields_form(&session, &coll, &id).await?))
}

pub async fn edit_fields(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.edit_fields(&session, &coll, &id, form).await?))
}

pub async fn edit_schema_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.edit_schema_form(&session, &coll, &id).await?))
}

pub async fn edit_schema(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.edit_schema(&session, &coll, &id, form).await?))
}

pub async fn edit_raw_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.edit_raw_form(&session, &coll, &id).await?))
}

pub async fn edit_raw(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.edit_raw(&session, &coll, &id, form).await?))
}

pub async fn add_item_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.add_item_form(&session, &coll).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.add_item(&session, &coll, form).await?))
}

pub async fn add_collection_form(State(state): State<AppState>, cookie: SessionCookie) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.collection_form(&session, None).await?))
}

pub async fn modify_collection_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.collection_form(&session, Some(&coll)).await?))
}

/// Shared by `/add` and `/modify/:coll`; the form's `name` decides the target.
pub async fn save_collection(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.save_collection(&session, form).await?))
}

pub async fn delete_item_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.delete_item_form(&session, &coll, &id).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path((coll, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.delete_item(&session, &coll, &id).await?))
}

pub async fn delete_collection_form(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.delete_collection_form(&session, &coll).await?))
}

pub async fn delete_collection(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
    Form(form): Form<FormFields>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.delete_collection(&session, &coll, form).await?))
}

pub async fn drop_collection(
    State(state): State<AppState>,
    cookie: SessionCookie,
    Path(coll): Path<String>,
) -> Result<Response, AppError> {
    let session = load_session(&state, &cookie).await?;
    Ok(respond(&state, state.admin.drop_collection(&session, &coll).await?))
}
