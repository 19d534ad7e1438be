//! Live room discovery.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use livewatch_protocol::{ApiError, RoomDescriptor, RoomSource};

use crate::client::connection::{check_status, transport, AcfunClient, LIVE_REFERER};

const LIVE_LIST_URL: &str = "https://live.acfun.cn/api/channel/list";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelListResponse {
    channel_list_data: ChannelListData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelListData {
    result: i64,
    #[serde(default)]
    live_list: Vec<LiveEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveEntry {
    author_id: i64,
    live_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    online_count: u64,
    #[serde(default)]
    user: Option<LiveUser>,
}

#[derive(Debug, Deserialize)]
struct LiveUser {
    #[serde(default)]
    name: String,
}

impl AcfunClient {
    /// Fetch every live room in one page.
    pub async fn all_live_rooms(&self) -> Result<Vec<RoomDescriptor>, ApiError> {
        let resp = self
            .http
            .get(LIVE_LIST_URL)
            .query(&[
                ("count", self.config.live_list_count.to_string()),
                ("pcursor", "0".to_string()),
            ])
            .header(reqwest::header::REFERER, LIVE_REFERER)
            .send()
            .await
            .map_err(transport)?;
        check_status(resp.status(), "live list")?;

        let body = resp.text().await.map_err(transport)?;
        let rooms = parse_live_list(&body)?;
        debug!("Live list returned {} rooms", rooms.len());
        Ok(rooms)
    }
}

#[async_trait]
impl RoomSource for AcfunClient {
    async fn live_rooms(&self) -> Result<Vec<RoomDescriptor>, ApiError> {
        self.all_live_rooms().await
    }
}

fn parse_live_list(body: &str) -> Result<Vec<RoomDescriptor>, ApiError> {
    let resp: ChannelListResponse = serde_json::from_str(body)?;
    let data = resp.channel_list_data;
    if data.result != 1 {
        return Err(ApiError::Rejected {
            code: data.result,
            message: "live list request rejected".to_string(),
        });
    }

    Ok(data
        .live_list
        .into_iter()
        .map(|entry| RoomDescriptor {
            owner_id: entry.author_id,
            live_id: entry.live_id,
            display_name: entry.user.map(|u| u.name).unwrap_or_default(),
            title: entry.title,
            online_count: entry.online_count,
        })
        .collect())
}
