use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

pub async fn ready() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub async fn live() -> HttpResponse {
    HttpResponse::Ok().finish()
}
