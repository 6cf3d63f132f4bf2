//! Typed request contract.
//!
//! Handlers registered through the typed API receive their payload already
//! decoded into the request struct and return a serializable output, so each
//! message type keeps its own payload type without casting `Value`s by hand.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A request whose payload decodes into `Self`.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct GetCommits { limit: usize }
///
/// impl Request for GetCommits {
///     const TYPE: &'static str = "repo/getCommits";
///     type Output = Vec<String>;
/// }
/// ```
pub trait Request: DeserializeOwned + Send + 'static {
    /// Wire `type` this request is routed by.
    const TYPE: &'static str;
    /// Result carried in the response payload.
    type Output: Serialize + Send + 'static;
}
