use actix_web::{web, App, HttpServer};
use messaging_service::{
    config, db, error, logging,
    notify::{NotificationPublisher, RedisPublisher},
    redis_client::RedisClient,
    routes,
    services::ChatService,
    state::AppState,
    store::PostgresStore,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    // Initialize DB pool and apply schema
    let pool = db::init_pool(&cfg.database_url, cfg.db_pool_size)?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| error::AppError::Config(format!("migrations: {e}")))?;

    let redis = RedisClient::connect(&cfg.redis_url)
        .await
        .map_err(|e| error::AppError::Config(format!("redis: {e}")))?;
    let publisher: Arc<dyn NotificationPublisher> = Arc::new(RedisPublisher::new(redis));

    let store = Arc::new(PostgresStore::new(pool));
    let chat = Arc::new(ChatService::new(
        store.clone(),
        store.clone(),
        store,
        publisher,
    ));

    let state = AppState {
        chat,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting messaging-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(messaging_service::middleware::RequestId::new())
            .app_data(web::Data::new(state.clone()))
            .service(routes::users::list_users)
            .service(routes::conversations::get_conversations)
            .service(routes::conversations::get_conversation)
            .service(routes::conversations::create_conversation)
            .service(routes::messages::get_messages)
            .service(routes::messages::send_message)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::Config(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::Config(format!("server: {e}")))
}
