//! Task attachment endpoints
//!
//! Mounted under `/api/v1/projects/{project_id}/tasks/{task_id}/files` with
//! the upload body limit and the `files` rate-limit bucket.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::TaskPath;
use super::types::TaskFileDto;
use crate::api::auth::{ProjectRead, ProjectWrite};
use crate::api::routes::ApiState;
use crate::api::types::{ApiError, ListResponse};
use crate::core::constants::{FILE_NAME_MAX_LEN, FILE_UPLOAD_FIELD};
use crate::data::files::Upload;
use crate::data::types::NewActivity;
use crate::domain::activity::Action;

#[derive(Deserialize)]
pub struct FilePath {
    pub task_id: String,
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Serve with `Content-Disposition: inline` instead of `attachment`
    #[serde(default)]
    pub inline: bool,
}

pub fn routes(state: ApiState) -> Router<()> {
    Router::new()
        .route("/", get(list_files).post(upload_file))
        .route("/{file_id}", get(download_file).delete(delete_file))
        .with_state(state)
}

/// Keep a client-supplied name usable as a plain file name
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(FILE_NAME_MAX_LEN)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `Content-Disposition` value; non-ASCII names fall back to a bare disposition
fn content_disposition(disposition: &str, file_name: &str) -> HeaderValue {
    let ascii: String = file_name
        .chars()
        .filter(|c| c.is_ascii() && *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("{disposition}; filename=\"{ascii}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/files",
    tag = "files",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses((status = 200, description = "Attachments of the task"))
)]
pub async fn list_files(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<TaskPath>,
) -> Result<Json<ListResponse<TaskFileDto>>, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    let rows = state
        .database
        .repository()
        .list_files(&task.id)
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(ListResponse {
        data: rows.into_iter().map(TaskFileDto::from).collect(),
    }))
}

/// Upload an attachment as multipart field `file`
///
/// Allowed types are images, PDF, plain text, CSV, Office documents and ZIP,
/// up to 5 MB.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/files",
    tag = "files",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 201, description = "Attachment stored", body = TaskFileDto),
        (status = 400, description = "Malformed multipart body"),
        (status = 422, description = "Missing, empty, too large or unsupported file")
    )
)]
pub async fn upload_file(
    State(state): State<ApiState>,
    access: ProjectWrite,
    Path(path): Path<TaskPath>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TaskFileDto>), ApiError> {
    let project = state.load_project(&access.project_id).await?;
    let task = state.load_task(&access.project_id, &path.task_id).await?;

    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::field("FILE_TOO_LARGE", FILE_UPLOAD_FIELD, "File exceeds the upload limit")
        } else {
            ApiError::bad_request("MULTIPART_ERROR", e.body_text())
        }
    };

    let mut received = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_UPLOAD_FIELD) {
            continue;
        }
        let file_name = sanitize_file_name(field.file_name().unwrap_or("upload"));
        let declared_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        received = Some((file_name, declared_type, data));
        break;
    }

    let (file_name, declared_type, data) = received.ok_or_else(|| {
        ApiError::field(
            "FILE_REQUIRED",
            FILE_UPLOAD_FIELD,
            "Multipart field 'file' is required",
        )
    })?;

    let file = state
        .files
        .upload(
            &project.id,
            &task.id,
            &access.user_id,
            Upload {
                file_name: &file_name,
                declared_type: declared_type.as_deref(),
                data: &data,
            },
        )
        .await
        .map_err(ApiError::from_file)?;

    let actor = state.load_user(&access.user_id).await?;
    state
        .notifier
        .file_uploaded(&project, &task, &file, &actor)
        .await;
    state
        .record(
            NewActivity::new(Action::FileUploaded, &access.user_id)
                .project(&project.id)
                .task(&task.id)
                .metadata(json!({
                    "file_id": file.id,
                    "name": file.original_name,
                    "size_bytes": file.size_bytes,
                })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(TaskFileDto::from(file))))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/files/{file_id}",
    tag = "files",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID"),
        ("file_id" = String, Path, description = "File ID"),
        ("inline" = Option<bool>, Query, description = "Display in browser instead of download")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<FilePath>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    let (file, data) = state
        .files
        .download(&task.id, &path.file_id)
        .await
        .map_err(ApiError::from_file)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len()));
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", file.content_hash)) {
        headers.insert(header::ETAG, etag);
    }
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let disposition = if query.inline { "inline" } else { "attachment" };
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(disposition, &file.original_name),
    );

    Ok((headers, Body::from(data)).into_response())
}

/// Delete an attachment (uploader, or manager and above)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/tasks/{task_id}/files/{file_id}",
    tag = "files",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("task_id" = String, Path, description = "Task ID"),
        ("file_id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 403, description = "Not the uploader or a manager"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    State(state): State<ApiState>,
    access: ProjectRead,
    Path(path): Path<FilePath>,
) -> Result<StatusCode, ApiError> {
    let task = state.load_task(&access.project_id, &path.task_id).await?;
    let file = state
        .database
        .repository()
        .get_file(&task.id, &path.file_id)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| ApiError::not_found("FILE_NOT_FOUND", "File not found"))?;

    let is_uploader = file.uploader_id.as_deref() == Some(access.user_id.as_str());
    if !is_uploader && !access.is_manager() {
        return Err(ApiError::forbidden(
            "NOT_UPLOADER",
            "Only the uploader or a project manager can delete a file",
        ));
    }

    let file = state
        .files
        .delete(&task.id, &file.id)
        .await
        .map_err(ApiError::from_file)?;

    state
        .record(
            NewActivity::new(Action::FileDeleted, &access.user_id)
                .project(&access.project_id)
                .task(&task.id)
                .metadata(json!({ "file_id": file.id, "name": file.original_name })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};

    use crate::api::routes::test_support::TestApp;
    use crate::core::constants::FILE_MAX_SIZE_BYTES;
    use crate::data::types::TeamRole;

    const BOUNDARY: &str = "projecthub-test-boundary";
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn multipart_body(field: &str, name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(
        app: &TestApp,
        uri: &str,
        token: &str,
        body: Vec<u8>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        app.send_request(request).await
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\plan.pdf"), "plan.pdf");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(&"a".repeat(300)).len(), FILE_NAME_MAX_LEN);
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (member, member_token) = app.user("member@example.com").await;
        let project_id = app.project(&owner, 0).await;
        app.join(&project_id, &member.id, TeamRole::Member).await;
        let task_id = app.task(&owner, &project_id, "Assets").await;
        let base = format!("/api/v1/projects/{project_id}/tasks/{task_id}/files");

        let (status, body) = upload(
            &app,
            &base,
            &member_token,
            multipart_body("file", "logo.png", "application/octet-stream", PNG),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["mime_type"], "image/png");
        assert_eq!(body["size_bytes"], PNG.len());
        let file_id = body["id"].as_str().unwrap().to_string();

        // Owner hears about the upload
        let (_, body) = app.get("/api/v1/notifications", &owner).await;
        assert_eq!(body["data"][0]["kind"], "file_uploaded");

        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("{base}/{file_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {owner}"))
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app.router.clone(), request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"logo.png\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], PNG);

        let (_, body) = app.get(&base, &owner).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = app.delete(&format!("{base}/{file_id}"), &member_token).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get(&format!("{base}/{file_id}"), &owner).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let project_id = app.project(&owner, 0).await;
        let task_id = app.task(&owner, &project_id, "Assets").await;
        let base = format!("/api/v1/projects/{project_id}/tasks/{task_id}/files");

        let (status, body) = upload(
            &app,
            &base,
            &owner,
            multipart_body("file", "tool.exe", "application/x-msdownload", b"MZ\x90\x00"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "UNSUPPORTED_FILE_TYPE");
        assert!(body["fields"]["file"].is_array());

        let big = vec![b'a'; FILE_MAX_SIZE_BYTES + 1];
        let (status, body) =
            upload(&app, &base, &owner, multipart_body("file", "big.txt", "text/plain", &big)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "FILE_TOO_LARGE");

        let (status, body) = upload(
            &app,
            &base,
            &owner,
            multipart_body("attachment", "notes.txt", "text/plain", b"hello"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "FILE_REQUIRED");
    }

    #[tokio::test]
    async fn test_delete_requires_uploader_or_manager() {
        let app = TestApp::new().await;
        let (_, owner) = app.user("owner@example.com").await;
        let (other, other_token) = app.user("other@example.com").await;
        let project_id = app.project(&owner, 0).await;
        app.join(&project_id, &other.id, TeamRole::Member).await;
        let task_id = app.task(&owner, &project_id, "Assets").await;
        let base = format!("/api/v1/projects/{project_id}/tasks/{task_id}/files");

        let (_, body) = upload(
            &app,
            &base,
            &owner,
            multipart_body("file", "notes.txt", "text/plain", b"minutes"),
        )
        .await;
        let file_id = body["id"].as_str().unwrap();

        let (status, body) = app.delete(&format!("{base}/{file_id}"), &other_token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_UPLOADER");
    }
}
