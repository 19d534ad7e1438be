//! Room subscriptions: stream info via `startPlay` and audience polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use serde::Deserialize;

use livewatch_protocol::{
    ApiError, LiveConnector, LiveEvent, LiveSubscription, RoomDescriptor, Session, StreamVariant,
};

use crate::client::connection::AcfunClient;

const START_PLAY_PATH: &str = "startPlay";
const WATCHING_LIST_PATH: &str = "watchingList";

#[derive(Debug, Deserialize)]
struct StartPlayResponse {
    result: i64,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    data: Option<StartPlayData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPlayData {
    live_id: String,
    /// JSON document embedded as a string.
    #[serde(default)]
    video_play_res: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoPlayRes {
    #[serde(default)]
    live_adaptive_manifest: Vec<AdaptiveManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdaptiveManifest {
    adaptation_set: AdaptationSet,
}

#[derive(Debug, Deserialize)]
struct AdaptationSet {
    #[serde(default)]
    representation: Vec<Representation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Representation {
    bitrate: u64,
    url: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    quality_type: String,
}

#[derive(Debug, Deserialize)]
struct WatchingListResponse {
    result: i64,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    data: Option<WatchingListData>,
}

#[derive(Debug, Deserialize)]
struct WatchingListData {
    #[serde(default)]
    list: Vec<serde_json::Value>,
}

/// State threaded through the audience polling stream.
struct PollState {
    client: AcfunClient,
    session: Arc<Session>,
    live_id: String,
    interval: Duration,
    finished: bool,
}

impl AcfunClient {
    /// Request play info for a room and return its live id and stream variants.
    pub async fn start_play(
        &self,
        session: &Session,
        owner_id: i64,
    ) -> Result<(String, Vec<StreamVariant>), ApiError> {
        let body = self
            .post_form(
                START_PLAY_PATH,
                session,
                &[
                    ("authorId", owner_id.to_string()),
                    ("pullStreamType", "FLV".to_string()),
                ],
            )
            .await?;
        parse_start_play(&body)
    }

    /// Number of entries in the room's current watching list.
    pub async fn watching_count(&self, session: &Session, live_id: &str) -> Result<u64, ApiError> {
        let body = self
            .post_form(
                WATCHING_LIST_PATH,
                session,
                &[
                    ("visitorId", session.user_id.to_string()),
                    ("liveId", live_id.to_string()),
                ],
            )
            .await?;
        parse_watching_list(&body)
    }
}

#[async_trait]
impl LiveConnector for AcfunClient {
    async fn connect(
        &self,
        session: Arc<Session>,
        room: &RoomDescriptor,
    ) -> Result<LiveSubscription, ApiError> {
        let (live_id, variants) = self.start_play(&session, room.owner_id).await?;
        if live_id != room.live_id {
            debug!(
                "Room {} reported live id {} but play returned {}",
                room.owner_id, room.live_id, live_id
            );
        }

        let state = PollState {
            client: self.clone(),
            session,
            live_id: live_id.clone(),
            interval: self.config.watching_poll_interval,
            finished: false,
        };

        let events = stream::unfold(state, |mut st| async move {
            if st.finished {
                return None;
            }
            tokio::time::sleep(st.interval).await;
            match st.client.watching_count(&st.session, &st.live_id).await {
                Ok(watching) => Some((Ok(LiveEvent::Audience { watching }), st)),
                Err(e) => {
                    warn!("Audience poll for live {} failed: {}", st.live_id, e);
                    st.finished = true;
                    Some((Err(e), st))
                }
            }
        })
        .boxed();

        Ok(LiveSubscription {
            live_id,
            variants,
            events,
        })
    }
}

fn parse_start_play(body: &str) -> Result<(String, Vec<StreamVariant>), ApiError> {
    let resp: StartPlayResponse = serde_json::from_str(body)?;
    if resp.result != 1 {
        return Err(ApiError::Rejected {
            code: resp.result,
            message: resp.error_msg.unwrap_or_else(|| "startPlay rejected".to_string()),
        });
    }
    let data = resp
        .data
        .ok_or_else(|| ApiError::Protocol("startPlay response without data".to_string()))?;

    let variants = if data.video_play_res.is_empty() {
        Vec::new()
    } else {
        let play_res: VideoPlayRes = serde_json::from_str(&data.video_play_res)?;
        play_res
            .live_adaptive_manifest
            .into_iter()
            .next()
            .map(|manifest| {
                manifest
                    .adaptation_set
                    .representation
                    .into_iter()
                    .map(|r| StreamVariant {
                        bitrate: r.bitrate,
                        url: r.url,
                        name: r.name,
                        quality_type: r.quality_type,
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok((data.live_id, variants))
}

fn parse_watching_list(body: &str) -> Result<u64, ApiError> {
    let resp: WatchingListResponse = serde_json::from_str(body)?;
    if resp.result != 1 {
        return Err(ApiError::Rejected {
            code: resp.result,
            message: resp.error_msg.unwrap_or_else(|| "watching list rejected".to_string()),
        });
    }
    Ok(resp.data.map(|d| d.list.len() as u64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_play() {
        let play_res = serde_json::json!({
            "liveAdaptiveManifest": [{
                "adaptationSet": {
                    "representation": [
                        {"bitrate": 2000, "url": "https://pull/hd.flv", "name": "高清", "qualityType": "HIGH"},
                        {"bitrate": 800, "url": "https://pull/sd.flv", "name": "标清", "qualityType": "STANDARD"}
                    ]
                }
            }]
        })
        .to_string();
        let body = serde_json::json!({
            "result": 1,
            "data": {"liveId": "kB2x", "videoPlayRes": play_res, "availableTickets": ["t"]}
        })
        .to_string();

        let (live_id, variants) = parse_start_play(&body).unwrap();
        assert_eq!(live_id, "kB2x");
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].bitrate, 800);
        assert_eq!(variants[1].quality_type, "STANDARD");
    }

    #[test]
    fn test_parse_start_play_rejected() {
        let err = parse_start_play(r#"{"result":380023,"error_msg":"live ended"}"#).unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                code: 380023,
                message: "live ended".to_string()
            }
        );
    }

    #[test]
    fn test_parse_start_play_without_manifest() {
        let (live_id, variants) =
            parse_start_play(r#"{"result":1,"data":{"liveId":"x","videoPlayRes":""}}"#).unwrap();
        assert_eq!(live_id, "x");
        assert!(variants.is_empty());
    }

    #[test]
    fn test_parse_watching_list() {
        let body = r#"{"result":1,"data":{"list":[{"userId":1},{"userId":2},{"userId":3}]}}"#;
        assert_eq!(parse_watching_list(body).unwrap(), 3);

        assert!(matches!(
            parse_watching_list(r#"{"result":129}"#),
            Err(ApiError::Rejected { code: 129, .. })
        ));
    }
}
