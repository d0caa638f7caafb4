use serde::Serialize;

/// How the failover executor reacts to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Health could not be determined; skip the instance this cycle.
    Transient,
    /// Abort the event before any network or shutdown step.
    Provisioning,
    /// Log and continue the state machine.
    PartialMigration,
    /// Log only.
    BestEffort,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStep {
    Detach,
    Attach,
    Allocate,
    DnsUpdate,
}

impl std::fmt::Display for NetworkStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NetworkStep::Detach => "floating address detach",
            NetworkStep::Attach => "floating address attach",
            NetworkStep::Allocate => "floating address allocation",
            NetworkStep::DnsUpdate => "DNS record update",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    #[error("cannot determine health of {instance_id}: {message}")]
    Lookup { instance_id: String, message: String },

    #[error("region discovery failed: {0}")]
    RegionDiscovery(String),

    #[error("no alternate region for {instance_id} (current region {region})")]
    NoAlternateRegion { instance_id: String, region: String },

    #[error("cannot provision replacement in {region}: {message}")]
    Provisioning { region: String, message: String },

    #[error("replacement {server_id} in {region} entered error state")]
    ReplacementFailed { region: String, server_id: String },

    #[error("replacement {server_id} in {region} not active after {waited_ms}ms")]
    ReadyTimeout {
        region: String,
        server_id: String,
        waited_ms: u64,
    },

    #[error("{step} failed: {message}")]
    Network { step: NetworkStep, message: String },

    #[error("{what} failed: {message}")]
    BestEffort { what: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl FailoverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailoverError::Lookup { .. } => ErrorKind::Transient,
            FailoverError::RegionDiscovery(_)
            | FailoverError::NoAlternateRegion { .. }
            | FailoverError::Provisioning { .. }
            | FailoverError::ReplacementFailed { .. }
            | FailoverError::ReadyTimeout { .. } => ErrorKind::Provisioning,
            FailoverError::Network { .. } => ErrorKind::PartialMigration,
            FailoverError::BestEffort { .. } => ErrorKind::BestEffort,
            FailoverError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn aborts_event(&self) -> bool {
        self.kind() == ErrorKind::Provisioning
    }

    /// Whether a replacement instance exists and was left in place.
    pub fn left_replacement(&self) -> Option<&str> {
        match self {
            FailoverError::ReplacementFailed { server_id, .. }
            | FailoverError::ReadyTimeout { server_id, .. } => Some(server_id.as_str()),
            _ => None,
        }
    }

    pub fn network(step: NetworkStep, err: impl std::fmt::Display) -> Self {
        FailoverError::Network {
            step,
            message: err.to_string(),
        }
    }
}
