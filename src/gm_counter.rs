use crate::address::Address;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::Deserialize;

/// topic0 of `GMSent(address indexed sender, address indexed recipient, ...)`.
pub const GM_EVENT_TOPIC: &str =
    "0xf62776e55315cfefc3f5fe84685591b4eb5f568199fbd8df4f308e36a9aa5dac";

const NO_RECORDS: &str = "No records found";

/// Which indexed side of the GM event to match an address against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventRole {
    Sender,
    Recipient,
}

impl EventRole {
    fn topic_index(self) -> u8 {
        match self {
            EventRole::Sender => 1,
            EventRole::Recipient => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GmStats {
    pub sent: u64,
    pub received: u64,
}

/// Counts GM events through a Blockscout-style `getLogs` endpoint.
#[derive(Clone)]
pub struct GmCountClient {
    base_url: String,
    contract: Address,
    from_block: u64,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct LogsResponseDto {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl GmCountClient {
    pub fn new(base_url: impl Into<String>, contract: Address, from_block: u64) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for explorer")?;
        Ok(Self {
            base_url,
            contract,
            from_block,
            http,
        })
    }

    pub fn query(&self, address: &Address, role: EventRole) -> Vec<(String, String)> {
        let index = role.topic_index();
        vec![
            ("module".to_string(), "logs".to_string()),
            ("action".to_string(), "getLogs".to_string()),
            ("address".to_string(), self.contract.to_string()),
            ("topic0".to_string(), GM_EVENT_TOPIC.to_string()),
            (format!("topic{index}"), address.to_topic()),
            (format!("topic0_{index}_opr"), "and".to_string()),
            ("fromBlock".to_string(), self.from_block.to_string()),
            ("toBlock".to_string(), "latest".to_string()),
        ]
    }

    pub async fn count(&self, address: &Address, role: EventRole) -> Result<u64> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&self.query(address, role))
            .send()
            .await
            .wrap_err("explorer request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read explorer response body")?;
        parse_count_response(status, &bytes)
            .wrap_err_with(|| format!("failed to count {role:?} GMs for {}", address.short()))
    }

    pub async fn stats(&self, address: &Address) -> Result<GmStats> {
        let (sent, received) = futures::try_join!(
            self.count(address, EventRole::Sender),
            self.count(address, EventRole::Recipient),
        )?;
        Ok(GmStats { sent, received })
    }
}

pub fn parse_count_response(status: StatusCode, bytes: &[u8]) -> Result<u64> {
    if !status.is_success() {
        let body = String::from_utf8_lossy(bytes);
        return Err(eyre!("explorer responded with {status}: {body}"));
    }
    let dto: LogsResponseDto =
        serde_json::from_slice(bytes).wrap_err("invalid explorer logs payload")?;
    if dto.status != "1" {
        if dto.message == NO_RECORDS {
            return Ok(0);
        }
        let message = if dto.message.is_empty() {
            "Failed to fetch events".to_string()
        } else {
            dto.message
        };
        return Err(eyre!("explorer error: {message}"));
    }
    let logs = dto.result.as_array().map(Vec::len).unwrap_or_default();
    Ok(logs as u64)
}
