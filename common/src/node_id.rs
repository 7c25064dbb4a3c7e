use std::fmt;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NodeIdError {
    #[error("node id cannot be empty")]
    Empty,
    #[error("node id must look like <role>-<region>#<group>-<localId>")]
    Malformed,
}

/// Parsed form of a node identity, `<role>-<region>#<group>-<localId>`,
/// e.g. `chunk-eu1#g2-7`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub role: String,
    pub region: String,
    pub group: String,
    pub local_id: String,
}

impl NodeId {
    pub fn parse(raw: &str) -> Result<Self, NodeIdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NodeIdError::Empty);
        }

        let (head, tail) = raw.split_once('#').ok_or(NodeIdError::Malformed)?;
        let (role, region) = head.split_once('-').ok_or(NodeIdError::Malformed)?;
        let (group, local_id) = tail.rsplit_once('-').ok_or(NodeIdError::Malformed)?;

        for part in [role, region, group, local_id] {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(NodeIdError::Malformed);
            }
        }

        Ok(Self {
            role: role.to_string(),
            region: region.to_string(),
            group: group.to_string(),
            local_id: local_id.to_string(),
        })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}#{}-{}",
            self.role, self.region, self.group, self.local_id
        )
    }
}
