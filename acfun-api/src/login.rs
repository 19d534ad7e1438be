//! Account login and service token acquisition.
//!
//! The flow mirrors what the live web site does:
//!
//! 1. GET the live home page to receive the `_did` device cookie
//! 2. POST the sign-in form, collecting the auth cookies
//! 3. POST the token request for `acfun.midground.api`
//!
//! The resulting [`Session`] is built once and shared read-only afterwards.

use log::{debug, info};
use reqwest::header::COOKIE;
use serde::Deserialize;

use livewatch_protocol::{ApiError, Cookie, Session};

use crate::client::connection::{
    check_status, cookie_header, merge_cookies, transport, AcfunClient, LIVE_REFERER,
};

const SIGNIN_URL: &str = "https://id.app.acfun.cn/rest/web/login/signin";
const TOKEN_URL: &str = "https://id.app.acfun.cn/rest/web/token/get";
const TOKEN_SID: &str = "acfun.midground.api";
const DEVICE_COOKIE: &str = "_did";

#[derive(Debug, Deserialize)]
struct SigninResponse {
    result: i64,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    result: i64,
    #[serde(default, rename = "userId")]
    user_id: i64,
    #[serde(default, rename = "acfun.midground.api_st")]
    service_token: String,
    #[serde(default)]
    ssecurity: String,
    #[serde(default)]
    error_msg: Option<String>,
}

impl AcfunClient {
    /// Log in with account and password and build the shared session.
    pub async fn login(&self, account: &str, password: &str) -> Result<Session, ApiError> {
        let mut jar: Vec<Cookie> = Vec::new();

        // Device id
        let resp = self.http.get(LIVE_REFERER).send().await.map_err(transport)?;
        check_status(resp.status(), "live home page")?;
        merge_cookies(&mut jar, &resp);
        let device_id = jar
            .iter()
            .find(|c| c.name == DEVICE_COOKIE)
            .map(|c| c.value.clone())
            .ok_or_else(|| ApiError::Protocol("missing _did cookie".to_string()))?;
        debug!("Obtained device id {}", device_id);

        // Sign in
        let resp = self
            .http
            .post(SIGNIN_URL)
            .header(COOKIE, cookie_header(&jar))
            .form(&[
                ("username", account),
                ("password", password),
                ("key", ""),
                ("captcha", ""),
            ])
            .send()
            .await
            .map_err(transport)?;
        check_status(resp.status(), "sign-in")?;
        merge_cookies(&mut jar, &resp);
        parse_signin(&resp.text().await.map_err(transport)?)?;

        // Service token
        let resp = self
            .http
            .post(TOKEN_URL)
            .header(COOKIE, cookie_header(&jar))
            .form(&[("sid", TOKEN_SID)])
            .send()
            .await
            .map_err(transport)?;
        check_status(resp.status(), "token request")?;
        merge_cookies(&mut jar, &resp);
        let session = parse_token(&resp.text().await.map_err(transport)?, device_id, jar)?;

        info!("Logged in as user {}", session.user_id);
        Ok(session)
    }
}

fn parse_signin(body: &str) -> Result<(), ApiError> {
    let resp: SigninResponse = serde_json::from_str(body)?;
    if resp.result != 0 {
        return Err(ApiError::Rejected {
            code: resp.result,
            message: resp.error_msg.unwrap_or_else(|| "sign-in failed".to_string()),
        });
    }
    Ok(())
}

fn parse_token(body: &str, device_id: String, cookies: Vec<Cookie>) -> Result<Session, ApiError> {
    let resp: TokenResponse = serde_json::from_str(body)?;
    if resp.result != 0 {
        return Err(ApiError::Rejected {
            code: resp.result,
            message: resp.error_msg.unwrap_or_else(|| "token request failed".to_string()),
        });
    }
    if resp.service_token.is_empty() || resp.user_id == 0 {
        return Err(ApiError::Protocol(
            "token response without user id or service token".to_string(),
        ));
    }

    Ok(Session {
        device_id,
        user_id: resp.user_id,
        service_token: resp.service_token,
        security_key: resp.ssecurity,
        cookies,
    })
}
