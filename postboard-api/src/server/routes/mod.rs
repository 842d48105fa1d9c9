use crate::server::ServerRouter;

mod follows;
mod posts;
mod profiles;
mod sessions;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(profiles::routes())
        .merge(follows::routes())
        .merge(users::routes())
        .merge(sessions::routes())
}
