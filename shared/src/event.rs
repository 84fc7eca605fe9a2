use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{HttpResult, TimerOutput};
use crate::config::DashboardConfig;

// --- Typed numeric IDs ---

macro_rules! sequence_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

sequence_id!(CycleId, "cycle");
sequence_id!(TimerId, "timer");

// --- Remote resources read every cycle ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    LatestLocation,
    Stats,
    Emergency,
    History,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [
        Self::LatestLocation,
        Self::Stats,
        Self::Emergency,
        Self::History,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LatestLocation => "latest_location",
            Self::Stats => "stats",
            Self::Emergency => "emergency",
            Self::History => "history",
        }
    }

    /// Document under `tracking/{device}/` holding this resource.
    #[must_use]
    pub const fn document(self) -> &'static str {
        match self {
            Self::LatestLocation | Self::History => "locations.json",
            Self::Stats => "stats.json",
            Self::Emergency => "emergency.json",
        }
    }

    /// `limitToLast` for timestamp-ordered queries, `None` for plain reads.
    #[must_use]
    pub const fn limit_to_last(self, history_limit: usize) -> Option<usize> {
        match self {
            Self::LatestLocation => Some(1),
            Self::History => Some(history_limit),
            Self::Stats | Self::Emergency => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a cycle. Only used for logging and outcome bookkeeping.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Start,
    Interval,
    Manual,
    Queued,
}

// --- Event enum: large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    Start,
    Stop,
    Configure(Box<DashboardConfig>),

    // Triggers
    Refresh,
    Tick {
        timer: TimerId,
        output: TimerOutput,
    },

    // Shell responses
    #[serde(skip)]
    ResourceFetched {
        cycle: CycleId,
        resource: ResourceKind,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    CycleDeadline {
        cycle: CycleId,
        output: TimerOutput,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Configure(_) => "configure",
            Self::Refresh => "refresh",
            Self::Tick { .. } => "tick",
            Self::ResourceFetched { .. } => "resource_fetched",
            Self::CycleDeadline { .. } => "cycle_deadline",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(self, Self::Refresh | Self::Configure(_))
    }
}
