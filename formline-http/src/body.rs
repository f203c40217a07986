//! Request body extraction for the save and test actions.

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use formline_common::Submission;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Text(String),
    Number(i64),
}

#[derive(Debug, Default, Deserialize)]
struct RawFields {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    credential: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<PortValue>,
}

impl RawFields {
    fn into_submission(self) -> Submission {
        let port = match self.port {
            Some(PortValue::Text(text)) => text,
            Some(PortValue::Number(number)) => number.to_string(),
            None => String::new(),
        };

        Submission::new(
            self.email.unwrap_or_default(),
            self.credential.unwrap_or_default(),
            self.host.unwrap_or_default(),
            port,
        )
    }
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            let mime = value.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/json")
                || mime.to_ascii_lowercase().ends_with("+json")
        })
}

/// The four settings fields from a urlencoded or JSON body.
///
/// Never rejects: a body that cannot be read or parsed yields a submission
/// with every field empty, which validation then reports as missing.
#[derive(Debug)]
pub struct SubmittedFields(pub Submission);

impl<S> FromRequest<S> for SubmittedFields
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let fields = if is_json(&request) {
            Json::<RawFields>::from_request(request, state)
                .await
                .map(|Json(fields)| fields)
                .map_err(|rejection| rejection.body_text())
        } else {
            Form::<RawFields>::from_request(request, state)
                .await
                .map(|Form(fields)| fields)
                .map_err(|rejection| rejection.body_text())
        };

        let fields = fields.unwrap_or_else(|reason| {
            tracing::debug!(%reason, "Unreadable request body, treating it as empty");
            RawFields::default()
        });

        Ok(Self(fields.into_submission()))
    }
}
