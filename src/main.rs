use actix_web::{
    middleware::{Compress, Logger},
    web::Data,
    App, HttpServer,
};
use birthdays::calendar::Calendar;
use birthdays::oauth::OAuthClient;
use birthdays::session::SessionStore;
use birthdays::{web, AppConfig};

#[actix_web::main]
async fn main() -> birthdays::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().inspect_err(|err| log::error!("{err}"))?;
    let server = config.server.clone();

    if server.template_autoreload {
        log::info!("template auto-reloading is enabled");
    } else {
        log::info!(
            "template auto-reloading is disabled; run with SERVER__TEMPLATE_AUTORELOAD=true to enable"
        );
    }

    let tmpl_reloader = Data::new(web::template_reloader(
        server.template_dir.clone(),
        server.template_autoreload,
    ));
    let oauth = Data::new(OAuthClient::new(&config.oauth, server.redirect_uri())?);
    let calendar = Data::new(Calendar::from_config(&config.calendar)?);
    let sessions = Data::new(SessionStore::new());
    let server_config = Data::new(server.clone());

    log::info!(
        "reading {:?} calendar events in time zone {}",
        config.calendar.event_source,
        config.calendar.time_zone
    );
    log::info!("starting HTTP server at {}", server.listen_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(sessions.clone())
            .app_data(oauth.clone())
            .app_data(calendar.clone())
            .app_data(server_config.clone())
            .app_data(tmpl_reloader.clone())
            .configure(web::configure)
            .wrap(web::error_handlers())
            .wrap(Compress::default())
            // Don't log things that could identify the user, e.g. omit client IP, referrer and
            // user agent.
            .wrap(Logger::new(r#""%r" %s %b %T"#))
    })
    .workers(server.workers)
    .bind(server.listen_addr)?
    .run()
    .await?;

    Ok(())
}
