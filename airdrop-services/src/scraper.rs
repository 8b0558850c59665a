//! Scheduled airdrop scraper
//!
//! Pulls airdrop cards off a listing page and adds the new ones to the
//! catalog. Runs once at startup and then on a fixed interval.

use airdrop_core::{AirdropError, AirdropResult, AirdropStatus, NewAirdrop};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::catalog::AirdropCatalog;
use crate::config::ScraperConfig;
use crate::task::BackgroundTask;

const DEFAULT_LOGO: &str = "https://via.placeholder.com/150";
const DEFAULT_JOIN_LINK: &str = "#";
const DEFAULT_STEPS: &[&str] = &["Connect Wallet", "Complete Tasks", "Claim Airdrop"];

/// Source of listing pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> AirdropResult<String>;
}

/// Fetches pages over HTTP
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> AirdropResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; airdrop-hub/0.1)")
            .build()
            .map_err(|e| AirdropError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> AirdropResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AirdropError::network(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AirdropError::api(format!(
                "Failed to fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AirdropError::parse(format!("Failed to read response from {}: {}", url, e)))
    }
}

/// Result of one scrape run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    /// Cards with a name, description and reward
    pub found: usize,
    pub inserted: usize,
    /// Cards whose name is already in the catalog
    pub duplicates: usize,
}

/// Clears the running flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Scrapes a listing page into the airdrop catalog
pub struct AirdropScraper {
    catalog: Arc<AirdropCatalog>,
    fetcher: Arc<dyn PageFetcher>,
    config: ScraperConfig,
    running: AtomicBool,
}

impl AirdropScraper {
    pub fn new(
        catalog: Arc<AirdropCatalog>,
        fetcher: Arc<dyn PageFetcher>,
        config: ScraperConfig,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Run one scrape; `Ok(None)` when another run is still in progress
    pub async fn scrape_once(&self) -> AirdropResult<Option<ScrapeReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Scraper is already running");
            return Ok(None);
        }
        let _running = RunGuard(&self.running);

        info!("Starting scrape from {}", self.config.url);
        let html = self.fetcher.fetch_page(&self.config.url).await?;
        let airdrops = parse_airdrop_cards(&html)?;

        let mut report = ScrapeReport {
            found: airdrops.len(),
            ..ScrapeReport::default()
        };
        for airdrop in airdrops {
            if self.catalog.find_by_name(&airdrop.name).is_some() {
                debug!("Skipping known airdrop {}", airdrop.name);
                report.duplicates += 1;
                continue;
            }
            match self.catalog.create_airdrop(airdrop) {
                Ok(_) => report.inserted += 1,
                Err(e) => warn!("Scraped airdrop rejected: {}", e),
            }
        }

        info!(
            "Successfully scraped {} airdrops ({} new)",
            report.found, report.inserted
        );
        Ok(Some(report))
    }

    /// Start scheduled scraping; the first run starts immediately
    pub fn spawn(self: Arc<Self>) -> BackgroundTask {
        BackgroundTask::spawn("scraper", move |mut shutdown_rx| async move {
            info!(
                "Scheduled scraping of {} every {:?}",
                self.config.url, self.config.interval
            );
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            result = self.scrape_once() => {
                                if let Err(e) = result {
                                    error!("Error scraping airdrops: {}", e);
                                }
                            }
                        }
                    }
                }
            }
            info!("Scheduled scraping stopped");
        })
    }
}

impl std::fmt::Debug for AirdropScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirdropScraper")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

fn selector(css: &str) -> AirdropResult<Selector> {
    Selector::parse(css).map_err(|e| AirdropError::internal(format!("Bad selector {}: {}", css, e)))
}

fn text_of(card: &ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn attr_of(card: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    card.select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn default_deadline() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Extract airdrops from `.airdrop-card` elements
///
/// Cards missing a name, description or reward are skipped. Fields the
/// page does not carry get fixed defaults.
pub fn parse_airdrop_cards(html: &str) -> AirdropResult<Vec<NewAirdrop>> {
    let document = Html::parse_document(html);
    let card = selector(".airdrop-card")?;
    let name = selector(".name")?;
    let description = selector(".description")?;
    let reward = selector(".reward")?;
    let image = selector("img")?;
    let join_link = selector(".join-link")?;

    let mut airdrops = Vec::new();
    for element in document.select(&card) {
        let new = NewAirdrop {
            name: text_of(&element, &name),
            description: text_of(&element, &description),
            reward: text_of(&element, &reward),
            logo: attr_of(&element, &image, "src").unwrap_or_else(|| DEFAULT_LOGO.to_string()),
            deadline: default_deadline(),
            platform: "eth".to_string(),
            total_value: "n/a".to_string(),
            is_featured: false,
            join_link: attr_of(&element, &join_link, "href")
                .unwrap_or_else(|| DEFAULT_JOIN_LINK.to_string()),
            status: AirdropStatus::Unconfirmed,
            steps: DEFAULT_STEPS.iter().map(|s| s.to_string()).collect(),
        };

        if new.name.is_empty() || new.description.is_empty() || new.reward.is_empty() {
            debug!("Skipping incomplete airdrop card");
            continue;
        }
        airdrops.push(new);
    }

    Ok(airdrops)
}
