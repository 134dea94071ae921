//! Web front end: one form page plus a JSON prediction endpoint.
//!
//! The pipeline is loaded once before the router is built and shared
//! read-only between requests.

mod page;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::StrokeError;
use crate::pipeline::{Prediction, StrokePipeline};
use crate::records::PatientRecord;

pub use page::{render, Outcome};

pub type SharedPipeline = Arc<StrokePipeline>;

pub fn router(pipeline: SharedPipeline) -> Router {
    Router::new()
        .route("/", get(form_page).post(submit_form))
        .route("/predict", post(predict_json))
        .route("/health", get(health))
        .with_state(pipeline)
}

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    #[serde(default)]
    pub sample: bool,
}

/// GET / - empty form, or the sample patient with `?sample=true`
async fn form_page(Query(query): Query<FormQuery>) -> Html<String> {
    let record = if query.sample {
        PatientRecord::sample()
    } else {
        PatientRecord::default()
    };
    Html(render(&record, None))
}

/// POST / - form submission. Fields are parsed one by one so that a bad
/// value re-renders the form with everything else the user entered.
async fn submit_form(
    State(pipeline): State<SharedPipeline>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let fields = match form {
        Ok(Form(fields)) => fields,
        Err(rejection) => {
            warn!("rejected form submission: {}", rejection.body_text());
            let outcome = Outcome::Error(rejection.body_text());
            return (
                rejection.status(),
                Html(render(&PatientRecord::default(), Some(&outcome))),
            )
                .into_response();
        }
    };

    let mut record = PatientRecord::default();
    if let Err(e) = record.update_from_fields(&fields) {
        warn!("invalid form submission: {}", e);
        let outcome = Outcome::Error(e.to_string());
        return (status_for(&e), Html(render(&record, Some(&outcome)))).into_response();
    }

    let (status, outcome) = match pipeline.predict_record(&record) {
        Ok(prediction) => {
            info!(
                "prediction: stroke={} probability={:.4}",
                prediction.is_stroke, prediction.probability
            );
            (StatusCode::OK, Outcome::Prediction(prediction))
        }
        Err(e) => (status_for(&e), Outcome::Error(e.to_string())),
    };
    (status, Html(render(&record, Some(&outcome)))).into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<StrokeError> for ApiError {
    fn from(e: StrokeError) -> Self {
        ApiError {
            status: status_for(&e),
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn status_for(e: &StrokeError) -> StatusCode {
    match e {
        StrokeError::InvalidInput(_) | StrokeError::UnknownCategory { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /predict - JSON patient in, JSON prediction out
async fn predict_json(
    State(pipeline): State<SharedPipeline>,
    payload: Result<Json<PatientRecord>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(record) = payload?;
    let prediction = pipeline.predict_record(&record)?;
    Ok(Json(prediction))
}

async fn health() -> &'static str {
    "ok"
}
