//! AI HTTP handlers. Every route requires an authenticated user.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use cats_core::Fault;
use cats_core::error::INTERNAL_ERROR_MESSAGE;
use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};
use tracing::{error, instrument};

use super::{AiService, ChatDto, CodeExplainDto, StreamQuery, SummarizeDto, TranslateDto};
use crate::validation::{ValidJson, ValidQuery};

/// Routes under `/ai`.
pub fn router() -> Router<AiService> {
    Router::new()
        .route("/ai/chat", post(chat))
        .route("/ai/chat/template", post(chat_with_template))
        .route("/ai/chat/stream", get(chat_stream))
        .route("/ai/summarize", post(summarize))
        .route("/ai/translate", post(translate))
        .route("/ai/explain-code", post(explain_code))
}

#[instrument(skip_all)]
async fn chat(
    State(service): State<AiService>,
    ValidJson(dto): ValidJson<ChatDto>,
) -> Result<Json<Value>, Fault> {
    let response = service.chat(&dto.message).await?;
    Ok(Json(json!({ "response": response })))
}

#[instrument(skip_all)]
async fn chat_with_template(
    State(service): State<AiService>,
    ValidJson(dto): ValidJson<ChatDto>,
) -> Result<Json<Value>, Fault> {
    let response = service
        .chat_with_template(&dto.message, dto.context.as_deref())
        .await?;
    Ok(Json(json!({ "response": response })))
}

#[instrument(skip_all)]
async fn summarize(
    State(service): State<AiService>,
    ValidJson(dto): ValidJson<SummarizeDto>,
) -> Result<Json<Value>, Fault> {
    let summary = service.summarize(&dto.text).await?;
    Ok(Json(json!({ "summary": summary })))
}

#[instrument(skip_all, fields(target_language = %dto.target_language))]
async fn translate(
    State(service): State<AiService>,
    ValidJson(dto): ValidJson<TranslateDto>,
) -> Result<Json<Value>, Fault> {
    let translation = service.translate(&dto.text, &dto.target_language).await?;
    Ok(Json(json!({ "translation": translation })))
}

#[instrument(skip_all, fields(language = %dto.language))]
async fn explain_code(
    State(service): State<AiService>,
    ValidJson(dto): ValidJson<CodeExplainDto>,
) -> Result<Json<Value>, Fault> {
    let explanation = service.explain_code(&dto.code, &dto.language).await?;
    Ok(Json(json!({ "explanation": explanation })))
}

/// Server-sent events carrying `{"content": ...}` deltas. A provider failure
/// ends the stream with one `error` event.
async fn chat_stream(
    State(service): State<AiService>,
    ValidQuery(query): ValidQuery<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Fault> {
    let events = service.stream(&query.message)?.map(|item| {
        Ok(match item {
            Ok(content) => Event::default().data(json!({ "content": content }).to_string()),
            Err(e) => {
                error!(error = %e, "Chat stream failed");
                Event::default()
                    .event("error")
                    .data(json!({ "message": INTERNAL_ERROR_MESSAGE }).to_string())
            }
        })
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
