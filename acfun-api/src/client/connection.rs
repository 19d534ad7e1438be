//! HTTP plumbing shared by every AcFun endpoint.

use std::time::Duration;

use log::trace;
use reqwest::header::{COOKIE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use livewatch_protocol::{ApiError, Cookie, Session};

/// Browser user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Origin of the live web site.
pub const LIVE_ORIGIN: &str = "https://live.acfun.cn";

/// Referer of the live web site.
pub const LIVE_REFERER: &str = "https://live.acfun.cn/";

/// Base of the kuaishouzt live API.
pub const KUAISHOU_API_BASE: &str = "https://api.kuaishouzt.com/rest/zt/live/web";

/// Name of the service token query parameter.
pub const SERVICE_TOKEN_KEY: &str = "acfun.midground.api_st";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total timeout for one request.
    pub request_timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Page size used when fetching the full live list.
    pub live_list_count: u32,
    /// Interval between audience polls of an open subscription.
    pub watching_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            live_list_count: 1_000_000,
            watching_poll_interval: Duration::from_secs(20),
        }
    }
}

/// Thin wrapper around a `reqwest::Client` configured for the AcFun web API.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct AcfunClient {
    pub(crate) http: Client,
    pub(crate) config: ClientConfig,
}

impl AcfunClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { http, config })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the URL of an authenticated kuaishouzt endpoint.
    pub(crate) fn kuaishou_url(&self, path: &str, session: &Session) -> String {
        format!(
            "{}/{}?subBiz=mainApp&kpn=ACFUN_APP&kpf=PC_WEB&userId={}&did={}&{}={}",
            KUAISHOU_API_BASE,
            path,
            session.user_id,
            session.device_id,
            SERVICE_TOKEN_KEY,
            session.service_token,
        )
    }

    /// POST a form to an authenticated endpoint and return the body text.
    ///
    /// Any non-200 status is reported as a transport failure.
    pub(crate) async fn post_form(
        &self,
        path: &str,
        session: &Session,
        form: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let url = self.kuaishou_url(path, session);
        trace!("POST {}/{}", KUAISHOU_API_BASE, path);

        let resp = self
            .http
            .post(&url)
            .header(ORIGIN, LIVE_ORIGIN)
            .header(REFERER, LIVE_REFERER)
            .header(COOKIE, session.cookie_header())
            .form(form)
            .send()
            .await
            .map_err(transport)?;

        check_status(resp.status(), path)?;
        resp.text().await.map_err(transport)
    }
}

/// Map a reqwest failure to a transport error.
pub(crate) fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

pub(crate) fn check_status(status: StatusCode, what: &str) -> Result<(), ApiError> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(ApiError::Transport(format!(
            "{} returned HTTP {}",
            what,
            status.as_u16()
        )))
    }
}

/// Collect the cookies set by a response, replacing same-named entries.
pub(crate) fn merge_cookies(jar: &mut Vec<Cookie>, resp: &reqwest::Response) {
    for c in resp.cookies() {
        let cookie = Cookie::new(c.name(), c.value());
        if let Some(existing) = jar.iter_mut().find(|e| e.name == cookie.name) {
            *existing = cookie;
        } else {
            jar.push(cookie);
        }
    }
}

pub(crate) fn cookie_header(jar: &[Cookie]) -> String {
    jar.iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Generic `{"result": n, "error_msg": ".."}` envelope used by most endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultEnvelope {
    pub result: i64,
    #[serde(default, alias = "error_msg")]
    pub message: Option<String>,
}

/// Require `result == expected` in a JSON body.
pub(crate) fn expect_result(body: &str, expected: i64) -> Result<(), ApiError> {
    let envelope: ResultEnvelope = serde_json::from_str(body)?;
    if envelope.result == expected {
        Ok(())
    } else {
        Err(ApiError::Rejected {
            code: envelope.result,
            message: envelope.message.unwrap_or_else(|| body.to_string()),
        })
    }
}
