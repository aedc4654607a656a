use crate::server::ServerRouter;
use axum::Router;

mod comments;
mod index;
mod media;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(index::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(users::routes())
        .merge(media::routes())
}
