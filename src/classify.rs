//! Error taxonomy and the message classification tables.
//!
//! Wallets report failures as free text. Everything that inspects that text
//! lives here so the tables can be tested without a live wallet, and so
//! `Unknown` stays the only default.

use crate::wallet::{
    USER_REJECTED_CODE,
    WalletError,
};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotConnected,
    NetworkUnavailable,
    NetworkSwitchCancelled,
    NetworkSwitchFailed,
    UserRejected,
    AlreadyDoneToday,
    InvalidRecipient,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::NotConnected => "wallet not connected",
            ErrorKind::NetworkUnavailable => "network switch unavailable",
            ErrorKind::NetworkSwitchCancelled => "network switch cancelled",
            ErrorKind::NetworkSwitchFailed => "network switch failed",
            ErrorKind::UserRejected => "rejected by user",
            ErrorKind::AlreadyDoneToday => "already done today",
            ErrorKind::InvalidRecipient => "invalid recipient",
            ErrorKind::Unknown => "unknown failure",
        };
        write!(f, "{name}")
    }
}

/// Which write variants a rule applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleScope {
    AnyWrite,
    RecipientOnly,
}

#[derive(Clone, Copy, Debug)]
pub struct WriteRule {
    pub needle: &'static str,
    pub kind: ErrorKind,
    pub scope: RuleScope,
}

/// Evaluated top to bottom; the first match wins.
pub const WRITE_RULES: &[WriteRule] = &[
    WriteRule {
        needle: "User rejected",
        kind: ErrorKind::UserRejected,
        scope: RuleScope::AnyWrite,
    },
    WriteRule {
        needle: "User denied",
        kind: ErrorKind::UserRejected,
        scope: RuleScope::AnyWrite,
    },
    WriteRule {
        needle: "AlreadyGMToday",
        kind: ErrorKind::AlreadyDoneToday,
        scope: RuleScope::AnyWrite,
    },
    WriteRule {
        needle: "InvalidRecipient",
        kind: ErrorKind::InvalidRecipient,
        scope: RuleScope::RecipientOnly,
    },
];

/// Substrings that mean the user declined a network switch prompt.
pub const SWITCH_CANCEL_NEEDLES: &[&str] = &["rejected", "denied"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SwitchFailure {
    Cancelled,
    Failed(String),
}

pub fn classify_switch_error(err: &WalletError) -> SwitchFailure {
    let cancelled = err.code == Some(USER_REJECTED_CODE)
        || SWITCH_CANCEL_NEEDLES
            .iter()
            .any(|needle| err.message.contains(needle));
    if cancelled {
        SwitchFailure::Cancelled
    } else {
        SwitchFailure::Failed(err.message.clone())
    }
}

pub fn classify_write_error(err: &WalletError, to_recipient: bool) -> ErrorKind {
    if err.code == Some(USER_REJECTED_CODE) {
        return ErrorKind::UserRejected;
    }
    WRITE_RULES
        .iter()
        .filter(|rule| to_recipient || rule.scope == RuleScope::AnyWrite)
        .find(|rule| err.message.contains(rule.needle))
        .map(|rule| rule.kind)
        .unwrap_or(ErrorKind::Unknown)
}
