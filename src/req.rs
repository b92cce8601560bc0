//! Thin HTTP helpers over the injected `reqwest::Client`.

use serde::de;

use crate::{api::Problem, error::Result};

pub(crate) type ReqResult<T> = std::result::Result<T, Problem>;

pub(crate) async fn req_get(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    log::trace!("GET {url}");
    Ok(client.get(url).send().await?)
}

pub(crate) async fn req_head(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    log::trace!("HEAD {url}");
    Ok(client.head(url).send().await?)
}

pub(crate) async fn req_post(
    client: &reqwest::Client,
    url: &str,
    body: String,
) -> Result<reqwest::Response> {
    log::trace!("POST {url}");
    Ok(client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/jose+json")
        .body(body)
        .send()
        .await?)
}

/// Passes 2xx responses through; turns anything else into a [`Problem`].
pub(crate) async fn req_handle_error(res: reqwest::Response) -> ReqResult<reqwest::Response> {
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status();

    let is_problem_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/problem+json"));

    let problem = if is_problem_json {
        // if we were sent a problem+json, deserialize it
        let body = req_safe_read_body(res).await;
        serde_json::from_str(&body).unwrap_or_else(|err| Problem {
            _type: "problemJsonFail".to_owned(),
            detail: Some(format!(
                "Failed to deserialize application/problem+json ({err}) body: {body}"
            )),
            ..Problem::default()
        })
    } else {
        // some other problem
        let body = req_safe_read_body(res).await;
        Problem {
            _type: "httpReqError".to_owned(),
            status: Some(status.as_u16()),
            detail: Some(format!("{status} body: {body}")),
            ..Problem::default()
        }
    };

    Err(problem)
}

pub(crate) fn req_expect_header(res: &reqwest::Response, name: &str) -> Option<String> {
    res.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_owned())
}

pub(crate) async fn req_safe_read_body(res: reqwest::Response) -> String {
    // some CAs close the TLS session abruptly even though the full body was
    // received; treat a read error after that point as an empty remainder.
    res.text().await.unwrap_or_default()
}

pub(crate) async fn read_json<T: de::DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let res_body = req_safe_read_body(res).await;
    log::debug!("{res_body}");
    Ok(serde_json::from_str(&res_body)?)
}
