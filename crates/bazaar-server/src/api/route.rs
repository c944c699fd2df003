use actix_web::web;

use super::{dashboard, health, message, notification, payment, project, subscription};

/// Register every REST resource under the current scope
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(crate::auth::route::routes())
        .service(project::routes())
        .service(message::routes())
        .service(notification::routes())
        .service(subscription::routes())
        .service(payment::routes())
        .service(health::routes())
        .configure(dashboard::config);
}
