use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use guildboard_common::model::post::Post;
use guildboard_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(get_index)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct IndexPage {
    pub title: String,
    pub posts: Vec<Post>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

async fn get_index(
    IndexPath(): IndexPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<IndexPage>> {
    let posts = store.fetch_posts().await?;

    Ok(Json(IndexPage {
        title: "Главная страница".to_owned(),
        posts,
    }))
}
