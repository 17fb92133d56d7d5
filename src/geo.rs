//! Geolocation and reverse-DNS enrichment
//!
//! Lookups are best-effort collaborators: every failure or timeout
//! degrades to `"Unknown"` fields and never reaches the packet pipeline
//! as an error. Results are cached so repeat destinations do not
//! re-query the HTTP service.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Geolocation fields attached to each record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
}

impl GeoInfo {
    pub fn unknown() -> Self {
        Self {
            country: "Unknown".to_string(),
            region: "Unknown".to_string(),
            city: "Unknown".to_string(),
        }
    }
}

/// Geolocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Enable HTTP geolocation lookups
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Lookup service base URL (ipinfo-compatible JSON endpoint)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-lookup timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum cached addresses
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Resolve destination domains via reverse DNS for log enrichment
    #[serde(default)]
    pub rdns_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://ipinfo.io".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_cache_size() -> usize {
    4096
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            cache_size: default_cache_size(),
            rdns_enabled: false,
        }
    }
}

/// External geolocation collaborator. Implementations never fail and
/// never block past their configured timeout.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, ip: IpAddr) -> GeoInfo;
}

/// Resolver that skips lookups entirely (geo disabled)
pub struct NullResolver;

#[async_trait]
impl GeoResolver for NullResolver {
    async fn resolve(&self, _ip: IpAddr) -> GeoInfo {
        GeoInfo::unknown()
    }
}

#[derive(Debug, Deserialize)]
struct IpinfoResponse {
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
}

/// HTTP resolver against an ipinfo-style JSON endpoint
pub struct IpinfoResolver {
    client: Client,
    endpoint: String,
    cache: Mutex<HashMap<IpAddr, GeoInfo>>,
    cache_size: usize,
}

impl IpinfoResolver {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("flowlens/0.1")
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
            cache_size: config.cache_size,
        })
    }

    async fn fetch(&self, ip: IpAddr) -> Result<GeoInfo> {
        let url = format!("{}/{}/json", self.endpoint, ip);
        let resp: IpinfoResponse = self.client.get(&url).send().await?.json().await?;

        Ok(GeoInfo {
            country: resp.country.unwrap_or_else(|| "Unknown".to_string()),
            region: resp.region.unwrap_or_else(|| "Unknown".to_string()),
            city: resp.city.unwrap_or_else(|| "Unknown".to_string()),
        })
    }
}

#[async_trait]
impl GeoResolver for IpinfoResolver {
    async fn resolve(&self, ip: IpAddr) -> GeoInfo {
        if let Some(cached) = self.cache.lock().get(&ip) {
            return cached.clone();
        }

        let info = match self.fetch(ip).await {
            Ok(info) => info,
            Err(e) => {
                debug!("geolocation lookup failed for {}: {}", ip, e);
                GeoInfo::unknown()
            }
        };

        let mut cache = self.cache.lock();
        if cache.len() < self.cache_size {
            cache.insert(ip, info.clone());
        }
        info
    }
}

/// Best-effort reverse-DNS collaborator, used for log enrichment only.
/// A failed lookup is simply no domain.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    async fn resolve(&self, ip: IpAddr) -> Option<String>;
}

/// Reverse DNS over the system resolver configuration
pub struct DnsDomainResolver {
    resolver: TokioAsyncResolver,
}

impl DnsDomainResolver {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

#[async_trait]
impl DomainResolver for DnsDomainResolver {
    async fn resolve(&self, ip: IpAddr) -> Option<String> {
        let response = self.resolver.reverse_lookup(ip).await.ok()?;
        response
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
    }
}
