use rocket::Route;

pub mod auth;
mod audit;
mod backups;
mod common;
mod events;
mod posts;
mod results;
mod system;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(votes::routes());
    routes.extend(results::routes());
    routes.extend(posts::routes());
    routes.extend(events::routes());
    routes.extend(backups::routes());
    routes.extend(audit::routes());
    routes.extend(system::routes());
    routes
}
