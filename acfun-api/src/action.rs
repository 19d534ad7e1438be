//! Audience actions: like, comment and gift.
//!
//! Each sender issues exactly one request and never retries; a non-200
//! status or a non-success `result` is reported as an error.

use async_trait::async_trait;
use log::{debug, info};

use livewatch_protocol::{ActionClient, ApiError, Session};

use crate::client::connection::{expect_result, AcfunClient, ResultEnvelope};

const LIKE_PATH: &str = "audience/action/like";
const COMMENT_PATH: &str = "audience/action/comment";
const GIFT_PATH: &str = "gift/send";

/// Gift id of the plain banana.
pub const BANANA_GIFT_ID: u32 = 1;

/// Build the default combo key (`1_1_<unix millis>`).
pub fn default_combo_key() -> String {
    format!("1_1_{}", chrono::Utc::now().timestamp_millis())
}

/// Accept a like/gift response: the body is only checked when it carries a
/// `result` field.
fn check_optional_result(body: &str) -> Result<(), ApiError> {
    match serde_json::from_str::<ResultEnvelope>(body) {
        Ok(envelope) if envelope.result != 1 => Err(ApiError::Rejected {
            code: envelope.result,
            message: envelope.message.unwrap_or_else(|| body.to_string()),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl ActionClient for AcfunClient {
    async fn send_like(
        &self,
        session: &Session,
        live_id: &str,
        count: u32,
        duration_ms: u32,
    ) -> Result<(), ApiError> {
        let body = self
            .post_form(
                LIKE_PATH,
                session,
                &[
                    ("visitorId", session.user_id.to_string()),
                    ("liveId", live_id.to_string()),
                    ("count", count.to_string()),
                    ("durationMs", duration_ms.to_string()),
                ],
            )
            .await?;
        check_optional_result(&body)?;
        debug!("Sent like to live {}", live_id);
        Ok(())
    }

    async fn send_comment(
        &self,
        session: &Session,
        live_id: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        if live_id.is_empty() {
            return Err(ApiError::InvalidRequest("live id is empty".to_string()));
        }
        if content.is_empty() {
            return Err(ApiError::InvalidRequest("comment content is empty".to_string()));
        }

        let body = self
            .post_form(
                COMMENT_PATH,
                session,
                &[
                    ("visitorId", session.user_id.to_string()),
                    ("liveId", live_id.to_string()),
                    ("content", content.to_string()),
                ],
            )
            .await?;
        expect_result(&body, 1)?;
        info!("Sent comment to live {}", live_id);
        Ok(())
    }

    async fn send_gift(
        &self,
        session: &Session,
        live_id: &str,
        gift_id: u32,
        batch_size: u32,
        combo_key: Option<&str>,
    ) -> Result<(), ApiError> {
        let combo_key = combo_key
            .map(str::to_string)
            .unwrap_or_else(default_combo_key);

        let body = self
            .post_form(
                GIFT_PATH,
                session,
                &[
                    ("visitorId", session.user_id.to_string()),
                    ("liveId", live_id.to_string()),
                    ("giftId", gift_id.to_string()),
                    ("batchSize", batch_size.to_string()),
                    ("comboKey", combo_key),
                ],
            )
            .await?;
        check_optional_result(&body)?;
        info!("Sent gift {} x{} to live {}", gift_id, batch_size, live_id);
        Ok(())
    }
}
