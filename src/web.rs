//! HTTP surface: sign-in flow, session cookie and the occasions page.

use crate::calendar::Calendar;
use crate::oauth::OAuthClient;
use crate::session::{AccessToken, SessionId, SessionStore};
use crate::{Error, ServerConfig};
use actix_files::NamedFile;
use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    dev::{self, ServiceResponse},
    error, get,
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    route,
    web::{Data, Html, Query, ServiceConfig},
    Either, FromRequest, HttpRequest, HttpResponse, Responder, ResponseError, Result,
};
use chrono::Datelike;
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use std::future::{ready, Ready};
use std::path::PathBuf;

/// Name of the cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "accessToken";

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Creates the template environment, optionally reloading templates when they change on disk.
pub fn template_reloader(template_dir: PathBuf, autoreload: bool) -> AutoReloader {
    // The closure is invoked every time the environment is outdated to recreate it.
    AutoReloader::new(move |notifier| {
        let mut env: minijinja::Environment<'static> = minijinja::Environment::new();

        // if watch_path is never called, no fs watcher is created
        if autoreload {
            notifier.watch_path(&template_dir, true);
        }

        env.set_loader(minijinja::path_loader(&template_dir));

        Ok(env)
    })
}

pub struct MiniJinjaRenderer {
    tmpl_env: Data<AutoReloader>,
}

impl MiniJinjaRenderer {
    pub fn render(&self, tmpl: &str, ctx: impl Into<minijinja::value::Value>) -> Result<Html> {
        self.tmpl_env
            .acquire_env()
            .map_err(|_| error::ErrorInternalServerError("could not acquire template env"))?
            .get_template(tmpl)
            .map_err(|_| error::ErrorInternalServerError("could not find template"))?
            .render(ctx.into())
            .map(Html::new)
            .map_err(|err| {
                log::error!("{err}");
                error::ErrorInternalServerError("template error")
            })
    }
}

impl FromRequest for MiniJinjaRenderer {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut dev::Payload) -> Self::Future {
        let tmpl_env = <Data<AutoReloader>>::extract(req).into_inner();

        ready(tmpl_env.map(|tmpl_env| Self { tmpl_env }))
    }
}

/// The visitor's session as identified by the session cookie.
pub struct Session {
    id: Option<SessionId>,
    store: Data<SessionStore>,
}

impl Session {
    /// The access token bound to this session, `None` if the visitor is not signed in.
    pub async fn access_token(&self) -> Option<AccessToken> {
        match &self.id {
            Some(id) => self.store.get(id).await,
            None => None,
        }
    }

    /// Replaces this session by a fresh one holding `token`.
    pub async fn renew(&self, token: AccessToken) -> SessionId {
        self.clear().await;

        let id = SessionId::generate();
        self.store.set(id.clone(), token).await;
        id
    }

    /// Forgets the token bound to this session.
    pub async fn clear(&self) {
        if let Some(id) = &self.id {
            self.store.clear(id).await;
        }
    }
}

impl FromRequest for Session {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut dev::Payload) -> Self::Future {
        let id = req
            .cookie(SESSION_COOKIE)
            .map(|cookie| SessionId::from(cookie.value()));
        let store = <Data<SessionStore>>::extract(req).into_inner();

        ready(store.map(|store| Self { id, store }))
    }
}

fn session_cookie(id: &SessionId) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.as_str().to_owned())
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .finish()
}

fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .finish()
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn signed_out() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(expired_session_cookie())
        .finish()
}

#[route("/", method = "GET", method = "HEAD")]
async fn index(tmpl_env: MiniJinjaRenderer, session: Session) -> Result<impl Responder> {
    let authenticated = session.access_token().await.is_some();
    tmpl_env.render("index.html", minijinja::context! { authenticated })
}

#[get("/login")]
async fn login(oauth: Data<OAuthClient>) -> HttpResponse {
    redirect(oauth.build_authorization_url().as_str())
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

#[get("/auth/google/callback")]
async fn auth_callback(
    query: Query<CallbackQuery>,
    session: Session,
    oauth: Data<OAuthClient>,
) -> Result<HttpResponse> {
    let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
        if let Some(err) = &query.error {
            log::warn!("authorization was not granted: {err}");
            return Ok(redirect("/"));
        }

        return Err(error::ErrorBadRequest("missing authorization code"));
    };

    let grant = oauth.exchange_code_for_token(code).await.map_err(|err| {
        log::error!("{err}");
        err
    })?;

    let session_id = session.renew(grant.access_token).await;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(session_cookie(&session_id))
        .finish())
}

#[route("/birthdays", method = "GET", method = "HEAD")]
async fn birthdays(
    tmpl_env: MiniJinjaRenderer,
    session: Session,
    calendar: Data<Calendar>,
) -> Result<Either<Html, HttpResponse>> {
    let Some(token) = session.access_token().await else {
        return Ok(Either::Right(redirect("/")));
    };

    let today = calendar.today();

    let occasions = match calendar.occasions_on(&token, today).await {
        Ok(occasions) => occasions,
        Err(Error::TokenRejected) => {
            log::info!("access token is no longer valid, ending session");
            session.clear().await;
            return Ok(Either::Right(signed_out()));
        }
        Err(err) => {
            log::error!("{err}");
            return Err(err.into());
        }
    };

    let ctx = minijinja::context! {
        occasions => occasions.to_template_values(),
        year => today.year(),
    };

    tmpl_env.render("birthdays.html", ctx).map(Either::Left)
}

#[get("/logout")]
async fn logout(session: Session) -> HttpResponse {
    session.clear().await;
    signed_out()
}

#[get("/style.css")]
async fn stylesheet(server: Data<ServerConfig>) -> Result<NamedFile> {
    Ok(NamedFile::open_async(server.static_dir.join("style.css")).await?)
}

/// Registers all routes.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(index)
        .service(login)
        .service(auth_callback)
        .service(birthdays)
        .service(logout)
        .service(stylesheet);
}

/// Renders 404 and 500 responses through the error templates.
pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::NOT_FOUND, not_found)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, internal_server_error)
}

/// Error handler for a 404 Page not found error.
fn not_found<B>(svc_res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_handler(svc_res, "not_found.html")
}

/// Error handler for a 500 Internal server error.
fn internal_server_error<B>(svc_res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_handler(svc_res, "error.html")
}

/// Generic error handler.
fn error_handler<B>(svc_res: ServiceResponse<B>, tmpl: &str) -> Result<ErrorHandlerResponse<B>> {
    let req = svc_res.request();

    let reason = svc_res
        .status()
        .canonical_reason()
        .unwrap_or("Unknown error");

    // Provide a fallback to a simple plain text response in case an error occurs during the
    // rendering of the error page.
    let fallback = |err: &str| {
        HttpResponse::build(svc_res.status())
            .content_type(ContentType::plaintext())
            .body(err.to_string())
    };

    let ctx = minijinja::context! {
        status_code => svc_res.status().as_str(),
        reason => reason,
    };

    let rendered = MiniJinjaRenderer::extract(req)
        .into_inner()
        .and_then(|tmpl_env| tmpl_env.render(tmpl, ctx));

    let res = match rendered {
        Ok(body) => body
            .customize()
            .with_status(svc_res.status())
            .respond_to(req)
            .map_into_boxed_body(),
        Err(_) => fallback(reason),
    };

    Ok(ErrorHandlerResponse::Response(ServiceResponse::new(
        svc_res.into_parts().0,
        res.map_into_right_body(),
    )))
}
