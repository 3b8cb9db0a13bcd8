use actix_multipart::Multipart;
use actix_web::{
    error::UrlencodedError,
    guard::{self, GuardContext},
    http::header,
    web, HttpRequest, HttpResponse,
};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::{
    errors::LimitsError,
    simulation::{Field, LimitsForm},
    AppState,
};

/// Upper bound on a single multipart field value.
const MAX_FIELD_BYTES: usize = 1024;

/// `PATCH /limits` with an `application/x-www-form-urlencoded` body.
pub async fn update_limits(
    form: web::Form<LimitsForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, LimitsError> {
    apply_form(form.into_inner(), &state)
}

/// `PATCH /limits` with a `multipart/form-data` body (e.g. `curl -F`).
/// Unknown parts are skipped; for a repeated key the first value is used.
pub async fn update_limits_multipart(
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, LimitsError> {
    let mut form = LimitsForm::default();

    while let Some(item) = payload.next().await {
        let mut part = item.map_err(|e| LimitsError::invalid_form(e.to_string()))?;
        let field = part.name().and_then(Field::from_name);

        let mut raw = Vec::new();
        while let Some(chunk) = part.next().await {
            let chunk = chunk.map_err(|e| LimitsError::invalid_form(e.to_string()))?;
            let Some(field) = field else {
                continue;
            };
            if raw.len() + chunk.len() > MAX_FIELD_BYTES {
                return Err(LimitsError::invalid_form(format!(
                    "{} exceeds {} bytes",
                    field, MAX_FIELD_BYTES
                )));
            }
            raw.extend_from_slice(&chunk);
        }

        let Some(field) = field else {
            continue;
        };
        let raw = String::from_utf8(raw)
            .map_err(|e| LimitsError::malformed(field, String::from_utf8_lossy(e.as_bytes())))?;
        form.set_if_absent(field, raw);
    }

    apply_form(form, &state)
}

/// Validates every present field, then applies them in one write. Nothing is
/// written if any field is rejected.
fn apply_form(form: LimitsForm, state: &AppState) -> Result<HttpResponse, LimitsError> {
    let delta = form.into_delta()?;

    if delta.is_empty() {
        debug!("limits update without fields, nothing to apply");
        return Ok(HttpResponse::Ok().json(state.store.snapshot()));
    }

    let applied = state.store.apply(&delta);
    info!(
        "limits updated: max_duration={} error_rate={} request_rate={}",
        applied.max_duration, applied.error_rate, applied.request_rate
    );

    Ok(HttpResponse::Ok().json(applied))
}

/// `GET /limits`: current parameters.
pub async fn get_limits(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.snapshot())
}

/// Routes body decoding failures through [`LimitsError`] so they are logged
/// and shaped like every other rejection.
pub fn form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(form_error)
}

fn form_error(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    LimitsError::invalid_form(err.to_string()).into()
}

fn is_multipart(ctx: &GuardContext<'_>) -> bool {
    ctx.head()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/limits")
            .app_data(form_config())
            .route(
                web::patch()
                    .guard(guard::fn_guard(is_multipart))
                    .to(update_limits_multipart),
            )
            .route(web::patch().to(update_limits))
            .route(web::get().to(get_limits)),
    );
}
