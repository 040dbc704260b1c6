//! A [`WalletConnector`] that talks to a node or signer over JSON-RPC.

use crate::{
    address::Address,
    chain::ChainId,
    wallet::{
        ContractCall,
        TxHash,
        WalletConnector,
        WalletError,
    },
};
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::cell::Cell;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RpcErrorDto {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponseDto {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorDto>,
}

pub struct RpcWallet {
    url: String,
    http: reqwest::Client,
    account: Option<Address>,
    can_switch: bool,
    next_id: Cell<u64>,
}

impl RpcWallet {
    pub fn new(
        url: impl Into<String>,
        account: Option<Address>,
        can_switch: bool,
    ) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| WalletError::new(format!("failed to build RPC client: {err}")))?;
        Ok(Self {
            url: url.into(),
            http,
            account,
            can_switch,
            next_id: Cell::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, WalletError> {
        let id = self.next_id.replace(self.next_id.get() + 1);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|err| WalletError::new(format!("{method} request failed: {err}")))?;
        let bytes = res
            .bytes()
            .await
            .map_err(|err| WalletError::new(format!("{method} response unreadable: {err}")))?;
        let result = decode_rpc_response(&bytes)?;
        serde_json::from_value(result)
            .map_err(|err| WalletError::new(format!("unexpected {method} result: {err}")))
    }
}

/// A configured account counts only when the wallet lists it; otherwise any
/// listed account will do.
pub fn account_is_listed(configured: Option<Address>, listed: &[Address]) -> bool {
    match configured {
        Some(account) => listed.contains(&account),
        None => !listed.is_empty(),
    }
}

/// Splits a JSON-RPC reply into its result or a coded [`WalletError`].
pub fn decode_rpc_response(bytes: &[u8]) -> Result<Value, WalletError> {
    let dto: RpcResponseDto = serde_json::from_slice(bytes)
        .map_err(|err| WalletError::new(format!("malformed JSON-RPC response: {err}")))?;
    match dto.error {
        Some(error) => Err(WalletError::with_code(error.code, error.message)),
        None => Ok(dto.result),
    }
}

impl WalletConnector for RpcWallet {
    async fn is_connected(&self) -> bool {
        match self.request::<Vec<Address>>("eth_accounts", json!([])).await {
            Ok(listed) => account_is_listed(self.account, &listed),
            Err(err) => {
                debug!(%err, "wallet unreachable");
                false
            }
        }
    }

    async fn current_network(&self) -> Option<ChainId> {
        match self.request::<String>("eth_chainId", json!([])).await {
            Ok(raw) => ChainId::from_quantity(&raw),
            Err(err) => {
                debug!(%err, "could not read wallet network");
                None
            }
        }
    }

    async fn account(&self) -> Option<Address> {
        if self.account.is_some() {
            return self.account;
        }
        match self.request::<Vec<Address>>("eth_accounts", json!([])).await {
            Ok(accounts) => accounts.into_iter().next(),
            Err(err) => {
                debug!(%err, "could not read wallet accounts");
                None
            }
        }
    }

    fn can_switch_network(&self) -> bool {
        self.can_switch
    }

    async fn switch_network(&self, id: ChainId) -> Result<(), WalletError> {
        self.request::<Value>(
            "wallet_switchEthereumChain",
            json!([{ "chainId": id.to_quantity() }]),
        )
        .await
        .map(|_| ())
    }

    async fn write_contract(&self, call: ContractCall) -> Result<TxHash, WalletError> {
        let from = self
            .account()
            .await
            .ok_or_else(|| WalletError::new("no account available to sign with"))?;
        let tx = json!({
            "from": from.to_string(),
            "to": call.contract.to_string(),
            "data": format!("0x{}", hex::encode(call.call.calldata())),
        });
        let raw: String = self.request("eth_sendTransaction", json!([tx])).await?;
        raw.parse()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        chain::BASE_SEPOLIA,
        classify::ErrorKind,
        network::NetworkGuard,
        notice::Notifier,
        submission::{
            GmRequest,
            SubmissionOutcome,
            SubmitResult,
            Submitter,
        },
        test_helpers::{
            TEST_ACCOUNT,
            TEST_CONTRACT,
        },
    };

    /// Nothing listens on port 1, so every request fails to connect.
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

    #[test]
    fn decode_rpc_response__returns_result() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":"0x14a34"}"#;
        let value = decode_rpc_response(body).unwrap();
        assert_eq!(value, json!("0x14a34"));
    }

    #[test]
    fn decode_rpc_response__keeps_provider_error_code() {
        // given
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": { "code": 4001, "message": "User rejected the request." },
        }))
        .unwrap();

        // when
        let err = decode_rpc_response(&body).unwrap_err();

        // then
        assert_eq!(
            err,
            WalletError::with_code(4001, "User rejected the request.")
        );
    }

    #[test]
    fn decode_rpc_response__garbage_has_no_code() {
        let err = decode_rpc_response(b"502 Bad Gateway").unwrap_err();
        assert_eq!(err.code, None);
    }

    #[test]
    fn account_is_listed__configured_account_must_be_listed() {
        let other = Address::new([0xbb; 20]);
        assert!(account_is_listed(Some(TEST_ACCOUNT), &[other, TEST_ACCOUNT]));
        assert!(!account_is_listed(Some(TEST_ACCOUNT), &[other]));
        assert!(!account_is_listed(Some(TEST_ACCOUNT), &[]));
        assert!(account_is_listed(None, &[other]));
        assert!(!account_is_listed(None, &[]));
    }

    #[tokio::test]
    async fn is_connected__unreachable_wallet_is_not_connected() {
        // given
        let wallet = RpcWallet::new(DEAD_ENDPOINT, Some(TEST_ACCOUNT), true).unwrap();

        // when
        let connected = wallet.is_connected().await;

        // then
        assert!(!connected);
    }

    #[tokio::test]
    async fn submit__unreachable_wallet_is_rejected_as_not_connected() {
        // given
        let wallet = RpcWallet::new(DEAD_ENDPOINT, Some(TEST_ACCOUNT), true).unwrap();
        let submitter = Submitter::new(
            wallet,
            NetworkGuard::default(),
            BASE_SEPOLIA,
            TEST_CONTRACT,
            Notifier::silent(),
        );

        // when
        let result = submitter.submit(GmRequest::ToSelf).await;

        // then
        assert_eq!(
            result,
            SubmitResult::Finished(SubmissionOutcome::Rejected(ErrorKind::NotConnected))
        );
    }
}
