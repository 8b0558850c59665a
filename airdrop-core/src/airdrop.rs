//! Airdrop catalog structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AirdropError, AirdropResult};

/// Whether the campaign has been confirmed by the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirdropStatus {
    Confirmed,
    #[default]
    Unconfirmed,
}

/// A listed airdrop campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Airdrop {
    pub id: u64,
    pub name: String,
    pub logo: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub reward: String,
    /// Chain the campaign runs on (e.g. "eth")
    pub platform: String,
    pub total_value: String,
    pub is_featured: bool,
    pub join_link: String,
    pub status: AirdropStatus,
    /// Ordered instructions for participating
    pub steps: Vec<String>,
}

/// Payload for creating an airdrop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAirdrop {
    pub name: String,
    pub logo: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub reward: String,
    pub platform: String,
    pub total_value: String,
    #[serde(default)]
    pub is_featured: bool,
    pub join_link: String,
    #[serde(default)]
    pub status: AirdropStatus,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl NewAirdrop {
    pub fn validate(&self) -> AirdropResult<()> {
        if self.name.trim().is_empty() {
            return Err(AirdropError::validation("name must not be empty"));
        }
        if self.join_link.trim().is_empty() {
            return Err(AirdropError::validation("joinLink must not be empty"));
        }
        Ok(())
    }

    pub fn into_airdrop(self, id: u64) -> Airdrop {
        Airdrop {
            id,
            name: self.name,
            logo: self.logo,
            description: self.description,
            deadline: self.deadline,
            reward: self.reward,
            platform: self.platform,
            total_value: self.total_value,
            is_featured: self.is_featured,
            join_link: self.join_link,
            status: self.status,
            steps: self.steps,
        }
    }
}

/// A user's claim against an airdrop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedAirdrop {
    pub id: u64,
    pub airdrop_id: u64,
    pub status: String,
    pub claimed_at: DateTime<Utc>,
}

/// Payload for recording a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClaimedAirdrop {
    pub airdrop_id: u64,
    #[serde(default = "default_claim_status")]
    pub status: String,
}

fn default_claim_status() -> String {
    "claimed".to_string()
}
