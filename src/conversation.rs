//! Conversation identity: which chat a message belongs to and how a reply
//! must be addressed.

use crate::wire::GroupInfo;

/// Conversation id used for every one-to-one chat.
pub const SINGLE_USER: &str = "singleUser";

/// Group ids starting with this prefix are already canonical.
pub const NATIVE_GROUP_PREFIX: &str = "signal";

/// Composite group ids carry their canonical id after this separator.
pub const COMPOSITE_SEPARATOR: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Direct,
    Group,
}

impl AddressingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub mode: AddressingMode,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("group info without a group id")]
    MissingGroupId,

    #[error("group id {0:?} has no \"chat\" segment")]
    MalformedGroupId(String),
}

/// Resolve the conversation a message belongs to.
pub fn resolve(group_info: Option<&GroupInfo>) -> Result<Conversation, ResolveError> {
    let Some(info) = group_info else {
        return Ok(Conversation {
            id: SINGLE_USER.to_string(),
            mode: AddressingMode::Direct,
        });
    };

    let group_id = info
        .group_id
        .as_deref()
        .ok_or(ResolveError::MissingGroupId)?;

    let id = if group_id.starts_with(NATIVE_GROUP_PREFIX) {
        group_id
    } else {
        group_id
            .split(COMPOSITE_SEPARATOR)
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| ResolveError::MalformedGroupId(group_id.to_string()))?
    };

    Ok(Conversation {
        id: id.to_string(),
        mode: AddressingMode::Group,
    })
}
