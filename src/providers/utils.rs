use anyhow::{Result, anyhow};
use reqwest::Response;
use serde_json::Value;
use url::Url;

/// Joins `path` onto a base URL that ends in `/`.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| anyhow!("Invalid endpoint {}{}: {}", base, path, e))
}

/// Turns non-2xx statuses and `{"error": ...}` bodies into errors, otherwise returns the JSON body.
pub async fn check_response(response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("API request failed: Status {}, Body: {}", status, error_text));
    }

    let response_json: Value = response.json().await?;
    if let Some(error) = response_json.get("error") {
        return Err(anyhow!("API returned error: {}", error));
    }

    Ok(response_json)
}

/// Rough whitespace token count used for the console usage line.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
