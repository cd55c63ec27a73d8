//! App Router

use salvo::Router;

use crate::{admin, instances, sessions};

/// Instance-scoped and administrative routes. Operational routes and the
/// shared hoops are attached by the caller.
pub(crate) fn app_router() -> Router {
    Router::new().push(session_router()).push(admin_router())
}

fn session_router() -> Router {
    Router::with_path("session")
        .hoop(instances::middleware::resolve)
        .push(Router::with_path("ping").get(sessions::ping::handler))
        .push(Router::with_path("login").post(sessions::login::handler))
        .push(Router::with_path("logout").delete(sessions::logout::handler))
        .push(Router::with_path("connect").post(sessions::connect::handler))
        .push(Router::with_path("disconnect").delete(sessions::disconnect::handler))
        .push(Router::with_path("qr").get(sessions::qr::handler))
        .push(
            Router::with_path("status")
                .hoop(instances::middleware::require_connection)
                .get(sessions::status::handler),
        )
}

fn admin_router() -> Router {
    Router::with_path("admin/instances")
        .hoop(admin::middleware::handler)
        .post(admin::create::handler)
        .push(
            Router::with_path("{instance}")
                .patch(admin::rename::handler)
                .delete(admin::delete::handler)
                .push(Router::with_path("token").post(admin::renew_token::handler))
                .push(Router::with_path("ban").delete(admin::unban::handler)),
        )
}
