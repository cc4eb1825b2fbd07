use actix_web::web;

use crate::connection::{observer_ws, student_ws};

mod status;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/student/{session_id}").route(web::get().to(student_ws)));
    cfg.service(web::resource("/ws/observer/{session_id}").route(web::get().to(observer_ws)));

    status::configure_status_handlers(cfg);
}
