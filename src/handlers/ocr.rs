//! `POST /api/ocr`: document images, read by OCR and explained by the model.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::api;
use crate::config::MAX_UPLOAD_BYTES;
use crate::error::{AppError, AppResult};
use crate::handlers::chat_flow::{
    ask_model, open_chat, parse_chat_id, record_ai_turn, record_user_turn, resolve_language,
};
use crate::handlers::session::CurrentUser;
use crate::language::DEFAULT_LANGUAGE;
use crate::models::OcrResponse;
use crate::state::SharedState;

struct DocumentUpload {
    bytes: Vec<u8>,
    mime: String,
    file_name: String,
}

struct OcrForm {
    file: Option<DocumentUpload>,
    language: Option<String>,
    chat_id: Option<String>,
    question: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> AppResult<OcrForm> {
    let mut form = OcrForm { file: None, language: None, chat_id: None, question: None };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(AppError::Validation(e.body_text())),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let mime = field
                    .content_type()
                    .map(|ct| ct.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let file_name = field.file_name().unwrap_or("document").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                form.file = Some(DocumentUpload { bytes: bytes.to_vec(), mime, file_name });
            }
            "language" => {
                form.language = Some(field.text().await.map_err(|e| AppError::Validation(e.body_text()))?);
            }
            "chat_id" => {
                form.chat_id = Some(field.text().await.map_err(|e| AppError::Validation(e.body_text()))?);
            }
            "question" => {
                form.question = Some(field.text().await.map_err(|e| AppError::Validation(e.body_text()))?);
            }
            other => log::debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    Ok(form)
}

fn check_upload(upload: &DocumentUpload) -> AppResult<()> {
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if !upload.mime.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "Only image files are supported, got '{}'",
            upload.mime
        )));
    }
    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation("File size must be 10MB or less".to_string()));
    }
    Ok(())
}

pub async fn ocr_handler(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<OcrResponse>> {
    let form = read_form(multipart).await?;
    let upload = form
        .file
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    check_upload(&upload)?;
    let language = resolve_language(form.language.as_deref().unwrap_or(DEFAULT_LANGUAGE))?;
    let chat_id = parse_chat_id(form.chat_id.as_deref())?;

    let question = form
        .question
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    // Nothing is stored until the image has yielded text.
    let extracted_text = state
        .ocr_provider
        .extract_text(&upload.bytes, &upload.mime, language)
        .await
        .map_err(AppError::Upstream)?;
    if extracted_text.trim().is_empty() {
        return Err(AppError::Validation(
            "No readable text was found in the image. Please upload a clearer photo.".to_string(),
        ));
    }

    let user_turn = match question {
        Some(q) => q.to_string(),
        None => format!("Uploaded document: {}", upload.file_name),
    };
    let chat = open_chat(&state, &user, chat_id, &user_turn).await?;
    log::info!(
        "OCR upload '{}' ({} bytes) from user {} in chat {}",
        upload.file_name,
        upload.bytes.len(),
        user.id,
        chat.id
    );
    let history = record_user_turn(&state, &chat, &user_turn).await?;

    let turns = api::explain_document(&history, &extracted_text, question, language);
    let ai_explanation = ask_model(&state, &turns).await?;
    record_ai_turn(&state, &chat, &ai_explanation).await?;

    Ok(Json(OcrResponse {
        ai_explanation,
        chat_id: chat.id,
        extracted_text,
    }))
}
