//! Response-type derivation.
//!
//! Two strategies, kept apart on purpose:
//! - declared mapping: closed table `RequestType -> ResponseType`
//!   ([`create_response`]); unknown request types are a caller bug.
//! - convention: response type is the request type plus [`RESPONSE_SUFFIX`]
//!   ([`create_convention_response`]); used by simplified handlers.

use std::str::FromStr;

use serde_json::Value;

use crate::error::{MsgBridgeError, Result};

use super::envelope::Envelope;

/// Suffix appended by the convention path.
pub const RESPONSE_SUFFIX: &str = ".response";

/// Unsolicited push: repository state changed on disk.
pub const EVENT_REPO_CHANGED: &str = "repo/changed";
/// Unsolicited push: persisted settings changed.
pub const EVENT_SETTINGS_CHANGED: &str = "settings/changed";

/// Request types with a declared response type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    RepoGetInfo,
    RepoGetCommits,
    RepoGetBranches,
    RepoGetCommitDetails,
    RepoCheckout,
    RepoCreateBranch,
    RepoFetch,
    PrList,
    PrGetDetails,
    SettingsGet,
    SettingsUpdate,
}

/// Response types of the declared mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    RepoInfo,
    RepoCommits,
    RepoBranches,
    RepoCommitDetails,
    RepoCheckedOut,
    RepoBranchCreated,
    RepoFetched,
    PrListed,
    PrDetails,
    SettingsCurrent,
    SettingsUpdated,
}

impl RequestType {
    pub const ALL: [RequestType; 11] = [
        RequestType::RepoGetInfo,
        RequestType::RepoGetCommits,
        RequestType::RepoGetBranches,
        RequestType::RepoGetCommitDetails,
        RequestType::RepoCheckout,
        RequestType::RepoCreateBranch,
        RequestType::RepoFetch,
        RequestType::PrList,
        RequestType::PrGetDetails,
        RequestType::SettingsGet,
        RequestType::SettingsUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::RepoGetInfo => "repo/getInfo",
            RequestType::RepoGetCommits => "repo/getCommits",
            RequestType::RepoGetBranches => "repo/getBranches",
            RequestType::RepoGetCommitDetails => "repo/getCommitDetails",
            RequestType::RepoCheckout => "repo/checkout",
            RequestType::RepoCreateBranch => "repo/createBranch",
            RequestType::RepoFetch => "repo/fetch",
            RequestType::PrList => "pr/list",
            RequestType::PrGetDetails => "pr/getDetails",
            RequestType::SettingsGet => "settings/get",
            RequestType::SettingsUpdate => "settings/update",
        }
    }

    /// The declared response type for this request.
    pub fn response_type(self) -> ResponseType {
        match self {
            RequestType::RepoGetInfo => ResponseType::RepoInfo,
            RequestType::RepoGetCommits => ResponseType::RepoCommits,
            RequestType::RepoGetBranches => ResponseType::RepoBranches,
            RequestType::RepoGetCommitDetails => ResponseType::RepoCommitDetails,
            RequestType::RepoCheckout => ResponseType::RepoCheckedOut,
            RequestType::RepoCreateBranch => ResponseType::RepoBranchCreated,
            RequestType::RepoFetch => ResponseType::RepoFetched,
            RequestType::PrList => ResponseType::PrListed,
            RequestType::PrGetDetails => ResponseType::PrDetails,
            RequestType::SettingsGet => ResponseType::SettingsCurrent,
            RequestType::SettingsUpdate => ResponseType::SettingsUpdated,
        }
    }
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::RepoInfo => "repo/info",
            ResponseType::RepoCommits => "repo/commits",
            ResponseType::RepoBranches => "repo/branches",
            ResponseType::RepoCommitDetails => "repo/commitDetails",
            ResponseType::RepoCheckedOut => "repo/checkedOut",
            ResponseType::RepoBranchCreated => "repo/branchCreated",
            ResponseType::RepoFetched => "repo/fetched",
            ResponseType::PrListed => "pr/listed",
            ResponseType::PrDetails => "pr/details",
            ResponseType::SettingsCurrent => "settings/current",
            ResponseType::SettingsUpdated => "settings/updated",
        }
    }
}

impl FromStr for RequestType {
    type Err = MsgBridgeError;

    fn from_str(s: &str) -> Result<Self> {
        RequestType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MsgBridgeError::UnknownRequestType(s.to_owned()))
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared-mapping path. The payload is passed through unmodified.
///
/// Returns [`MsgBridgeError::UnknownRequestType`] when `request_type` has no
/// table entry. That error belongs to the caller and is never sent over the
/// channel.
pub fn create_response(request_type: &str, payload: Value) -> Result<Envelope> {
    let req: RequestType = request_type.parse()?;
    Ok(Envelope::new(req.response_type().as_str(), payload))
}

/// Convention path: `<request_type>.response`.
pub fn convention_response_type(request_type: &str) -> String {
    format!("{request_type}{RESPONSE_SUFFIX}")
}

pub fn create_convention_response(request_type: &str, payload: Value) -> Envelope {
    Envelope::new(convention_response_type(request_type), payload)
}
