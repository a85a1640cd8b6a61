//! The structural-update vocabulary shared between the streaming JSON
//! fragment parser (`agentcore-fragment`) and the message model
//! (`ToolCallUpdateMessage.jsonFragmentUpdates`). Lives in `agentcore-domain`
//! so both the fragment parser and the message model can depend on it without
//! a cyclic crate dependency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FragmentKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    Key,
    PartialString,
    CompleteString,
    CompleteNumber,
    CompleteBoolean,
    CompleteNull,
}
