//! In-memory airdrop catalog and claim log

use airdrop_core::{
    Airdrop, AirdropError, AirdropResult, AirdropStatus, ClaimedAirdrop, NewAirdrop,
    NewClaimedAirdrop,
};
use chrono::{TimeZone, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;

/// Airdrops and the claims recorded against them
///
/// Ids are assigned sequentially from 1; listings come back in id order.
#[derive(Debug)]
pub struct AirdropCatalog {
    airdrops: RwLock<BTreeMap<u64, Airdrop>>,
    claimed: RwLock<BTreeMap<u64, ClaimedAirdrop>>,
    next_airdrop_id: AtomicU64,
    next_claim_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl AirdropCatalog {
    /// An empty catalog
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            airdrops: RwLock::new(BTreeMap::new()),
            claimed: RwLock::new(BTreeMap::new()),
            next_airdrop_id: AtomicU64::new(1),
            next_claim_id: AtomicU64::new(1),
            clock,
        }
    }

    /// A catalog seeded with the bundled sample airdrops
    pub fn with_samples(clock: Arc<dyn Clock>) -> Self {
        let catalog = Self::new(clock);
        for sample in sample_airdrops() {
            catalog.insert(sample);
        }
        catalog
    }

    pub fn list_airdrops(&self) -> Vec<Airdrop> {
        self.airdrops.read().values().cloned().collect()
    }

    pub fn get_airdrop(&self, id: u64) -> AirdropResult<Airdrop> {
        self.airdrops
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| AirdropError::not_found(format!("airdrop {}", id)))
    }

    /// Case-insensitive lookup by name
    pub fn find_by_name(&self, name: &str) -> Option<Airdrop> {
        let name = name.trim();
        self.airdrops
            .read()
            .values()
            .find(|airdrop| airdrop.name.trim().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn create_airdrop(&self, new: NewAirdrop) -> AirdropResult<Airdrop> {
        new.validate()?;
        let airdrop = self.insert(new);
        info!("Created airdrop {} ({})", airdrop.id, airdrop.name);
        Ok(airdrop)
    }

    fn insert(&self, new: NewAirdrop) -> Airdrop {
        let id = self.next_airdrop_id.fetch_add(1, Ordering::SeqCst);
        let airdrop = new.into_airdrop(id);
        self.airdrops.write().insert(id, airdrop.clone());
        airdrop
    }

    pub fn list_claimed(&self) -> Vec<ClaimedAirdrop> {
        self.claimed.read().values().cloned().collect()
    }

    /// Record a claim; the airdrop must exist
    pub fn claim(&self, new: NewClaimedAirdrop) -> AirdropResult<ClaimedAirdrop> {
        if !self.airdrops.read().contains_key(&new.airdrop_id) {
            return Err(AirdropError::not_found(format!(
                "airdrop {}",
                new.airdrop_id
            )));
        }

        let id = self.next_claim_id.fetch_add(1, Ordering::SeqCst);
        let claimed = ClaimedAirdrop {
            id,
            airdrop_id: new.airdrop_id,
            status: new.status,
            claimed_at: self.clock.now(),
        };
        self.claimed.write().insert(id, claimed.clone());
        info!("Airdrop {} claimed ({})", claimed.airdrop_id, claimed.status);
        Ok(claimed)
    }
}

fn sample_airdrops() -> Vec<NewAirdrop> {
    let date = |y, m, d| {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .unwrap_or_default()
    };
    let steps = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

    vec![
        NewAirdrop {
            name: "Ethereal Protocol".to_string(),
            logo: "https://images.unsplash.com/photo-1641317139750-4a25ddc7e304".to_string(),
            description: "Join Ethereal's Season Zero campaign and earn rewards by depositing USDe tokens".to_string(),
            deadline: date(2025, 5, 29),
            reward: "Ethereal Points + 50x Ethena sats".to_string(),
            platform: "eth".to_string(),
            total_value: "n/a".to_string(),
            is_featured: true,
            join_link: "https://app.ethereal.finance".to_string(),
            status: AirdropStatus::Confirmed,
            steps: steps(&[
                "Acquire USDe Tokens from Binance",
                "Visit the Ethereal Platform and connect your wallet",
                "Make your deposit in USDe",
                "Confirm the transaction to receive eUSDe tokens",
                "Generate and share your referral link",
                "Optional: Deposit into eUSDe Pendle pool for 1.6x points",
            ]),
        },
        NewAirdrop {
            name: "CryptoKitties NFT".to_string(),
            logo: "https://images.unsplash.com/photo-1639815189096-f75717eaecfe".to_string(),
            description: "Claim your exclusive CryptoKitties NFT".to_string(),
            deadline: date(2025, 4, 1),
            reward: "1 NFT".to_string(),
            platform: "eth".to_string(),
            total_value: "$100".to_string(),
            is_featured: true,
            join_link: "https://www.cryptokitties.co".to_string(),
            status: AirdropStatus::Unconfirmed,
            steps: steps(&[
                "Connect your Web3 wallet",
                "Complete social media tasks",
                "Join Discord community",
                "Verify wallet ownership",
                "Claim your NFT",
            ]),
        },
    ]
}
