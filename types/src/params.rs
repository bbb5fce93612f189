//! Governance-tunable farming parameters read by the engine.

use crate::address::Address;
use crate::error::TypesError;
use serde::{Deserialize, Serialize};

/// Parameters every node applies identically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmingParams {
    /// Account holding emitted rewards until they are harvested.
    #[serde(default = "default_reward_reserve")]
    pub reward_reserve: Address,

    /// Upper bound on a snapshot's reference count. A snapshot is referenced
    /// by its pool's forward anchor plus every position anchored to it, so
    /// several fresh positions entering in the same block share one snapshot.
    /// `2` reproduces the strict legacy bound; the default only guards the
    /// `u8` counter itself.
    #[serde(default = "default_max_snapshot_references")]
    pub max_snapshot_references: u8,

    /// Run the full invariant sweep every this many blocks; `0` disables it.
    #[serde(default = "default_invariant_check_interval")]
    pub invariant_check_interval: u64,
}

fn default_reward_reserve() -> Address {
    Address(FarmingParams::DEFAULT_REWARD_RESERVE.to_string())
}

fn default_max_snapshot_references() -> u8 {
    u8::MAX
}

fn default_invariant_check_interval() -> u64 {
    100
}

impl FarmingParams {
    pub const DEFAULT_REWARD_RESERVE: &'static str = "farm_rewards_reserve";

    /// The strict reference bound of two anchors per snapshot.
    pub const LEGACY_MAX_SNAPSHOT_REFERENCES: u8 = 2;

    /// Check that the parameters can drive the engine.
    pub fn validate(&self) -> Result<(), TypesError> {
        // One reference for the pool's own anchor plus at least one position.
        if self.max_snapshot_references < 2 {
            return Err(TypesError::InvalidParams(format!(
                "max_snapshot_references must be at least 2, got {}",
                self.max_snapshot_references
            )));
        }
        if self.reward_reserve.is_staking_reserve() {
            return Err(TypesError::InvalidParams(format!(
                "reward reserve {} collides with a staking reserve",
                self.reward_reserve
            )));
        }
        Ok(())
    }
}

impl Default for FarmingParams {
    fn default() -> Self {
        Self {
            reward_reserve: default_reward_reserve(),
            max_snapshot_references: default_max_snapshot_references(),
            invariant_check_interval: default_invariant_check_interval(),
        }
    }
}
