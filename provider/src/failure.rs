use kernel::ProviderError;
use reqwest::Response;
use serde::Deserialize;
use serde_json::Value;

/// Union of the error bodies sent by the auth and storage services.
#[derive(Deserialize, Default)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
    code: Option<Value>,
    #[serde(rename = "statusCode")]
    status_code: Option<Value>,
}

/// Turns a non success response into a [`ProviderError`], keeping the
/// service's message verbatim.
pub(crate) async fn from_response(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    decode(status, &text)
}

pub(crate) fn transport(e: &reqwest::Error) -> ProviderError {
    tracing::debug!("transport failure: {e}");
    ProviderError::new(e.to_string())
}

pub(crate) fn decode(status: u16, text: &str) -> ProviderError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();

    let message = body
        .msg
        .or(body.message)
        .or(body.error_description)
        .or_else(|| body.error.clone())
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_owned()))
        .unwrap_or_else(|| format!("request failed with status {status}"));

    let code = body
        .error_code
        .or_else(|| body.code.as_ref().and_then(|c| c.as_str().map(str::to_owned)))
        .or(body.error);

    // storage reports its own status inside the body, as a string
    let status = body
        .status_code
        .as_ref()
        .and_then(|s| match s {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            _ => None,
        })
        .unwrap_or(status);

    let mut error = ProviderError::new(message).with_status(status);
    if let Some(code) = code {
        error = error.with_code(code);
    }
    error
}
