use crate::{
    media::MediaStore,
    server::{Result, ServerError, ServerRouter},
};
use axum::{Router, extract::State};
use axum_extra::{
    TypedHeader,
    routing::{RouterExt, TypedPath},
};
use guildboard_common::model::post::{ATTACHMENT_DIR, Attachment};
use headers::ContentType;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(get_attachment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/media/posts/{file}", rejection(ServerError))]
struct AttachmentPath {
    file: String,
}

async fn get_attachment(
    AttachmentPath { file }: AttachmentPath,
    State(media): State<Arc<MediaStore>>,
) -> Result<(TypedHeader<ContentType>, Vec<u8>)> {
    let path = format!("{ATTACHMENT_DIR}/{file}");
    let attachment = Attachment::new(path).map_err(|_| ServerError::MediaNotFound(file.clone()))?;
    let bytes = media
        .read(&attachment)
        .await?
        .ok_or(ServerError::MediaNotFound(file))?;

    Ok((TypedHeader(ContentType::octet_stream()), bytes))
}
