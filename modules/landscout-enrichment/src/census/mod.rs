// Census enrichment: regional statistics for five catchment radii around a
// coordinate, scraped from a form-driven report generator.
//
// Cache first. On a miss, a browser session is acquired from the ordered
// engine list, the report form is filled and submitted, and the CSV artifact
// linked from the results page is downloaded, cached and parsed.

pub mod artifact;
pub mod cache;
pub mod engines;
pub mod form;
pub mod session;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use landscout_common::config::CensusConfig;
use landscout_common::{AppConfig, IdentityKey, RadiusBand};
use tracing::{debug, info, warn};

pub use artifact::{parse_artifact, CensusExtract};
pub use cache::ArtifactCache;
pub use engines::{BrowserlessEngine, ChromeEngine};
pub use session::{acquire_session, BrowserSession, PageRenderer, RenderedSession, SessionEngine};

use crate::error::Result;

/// Form field names on the report page.
pub const LATITUDE_FIELD: &str = "latitude";
pub const LONGITUDE_FIELD: &str = "longitude";
pub const RADII_FIELD: &str = "radii";

/// Anything that can produce census values for a coordinate.
#[async_trait]
pub trait CensusSource: Send + Sync {
    async fn fetch(&self, key: &IdentityKey) -> Result<CensusExtract>;
}

#[async_trait]
impl<T: CensusSource + ?Sized> CensusSource for std::sync::Arc<T> {
    async fn fetch(&self, key: &IdentityKey) -> Result<CensusExtract> {
        (**self).fetch(key).await
    }
}

pub struct CensusAdapter {
    engines: Vec<Box<dyn SessionEngine>>,
    cache: ArtifactCache,
    endpoint: String,
    artifact_link_text: String,
    render_timeout: Duration,
}

impl CensusAdapter {
    pub fn new(
        engines: Vec<Box<dyn SessionEngine>>,
        cache: ArtifactCache,
        config: &CensusConfig,
    ) -> Self {
        Self {
            engines,
            cache,
            endpoint: config.endpoint.clone(),
            artifact_link_text: config.artifact_link_text.clone(),
            render_timeout: config.render_timeout(),
        }
    }

    /// Build the engine list named in `config.engines`, in order. Engines
    /// that are not configured in the environment are left out.
    pub fn from_config(app: &AppConfig, config: &CensusConfig) -> Self {
        let timeout = config.render_timeout();
        let mut engines: Vec<Box<dyn SessionEngine>> = Vec::new();
        for name in &config.engines {
            match name.as_str() {
                "chrome" => engines.push(Box::new(ChromeEngine::new(&app.chrome_bin, timeout))),
                "browserless" => match &app.browserless_url {
                    Some(url) => engines.push(Box::new(BrowserlessEngine::new(
                        url,
                        app.browserless_token.as_deref(),
                        timeout,
                    ))),
                    None => debug!("BROWSERLESS_URL not set; browserless engine disabled"),
                },
                other => warn!(engine = other, "unknown session engine in config; ignored"),
            }
        }
        info!(
            engines = ?engines.iter().map(|e| e.name().to_string()).collect::<Vec<_>>(),
            "census adapter ready"
        );
        Self::new(engines, ArtifactCache::new(app.census_cache_dir()), config)
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    fn from_cache(&self, key: &IdentityKey) -> Option<CensusExtract> {
        let path = self.cache.latest(key)?;
        let body = match self.cache.read(&path) {
            Ok(body) => body,
            Err(e) => {
                warn!(%key, error = %e, "cached artifact unreadable; fetching fresh");
                return None;
            }
        };
        match parse_artifact(&body, &key.to_string()) {
            Ok(extract) if !extract.is_empty() => {
                info!(%key, path = %path.display(), "census: using cached artifact");
                Some(extract)
            }
            Ok(_) => {
                warn!(%key, path = %path.display(), "cached artifact has no values; fetching fresh");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "cached artifact unparseable; fetching fresh");
                None
            }
        }
    }

    async fn drive(&self, session: &mut dyn BrowserSession, key: &IdentityKey) -> Result<String> {
        let (latitude, longitude) = key.coordinates();

        session.navigate(&self.endpoint).await?;
        session.fill(LATITUDE_FIELD, &latitude.to_string())?;
        session.fill(LONGITUDE_FIELD, &longitude.abs().to_string())?;
        session.fill(RADII_FIELD, &RadiusBand::form_value())?;
        session.submit().await?;

        let link = session
            .wait_for_link(&self.artifact_link_text, self.render_timeout)
            .await?;
        debug!(%key, link = %link, "census: artifact link found");
        session.download(&link).await
    }
}

#[async_trait]
impl CensusSource for CensusAdapter {
    async fn fetch(&self, key: &IdentityKey) -> Result<CensusExtract> {
        if let Some(extract) = self.from_cache(key) {
            return Ok(extract);
        }

        let mut session = acquire_session(&self.engines).await?;
        let outcome = self.drive(session.as_mut(), key).await;
        session.close().await;
        let body = outcome?;

        if let Err(e) = self.cache.store(key, &body, Local::now().date_naive()) {
            warn!(%key, error = %e, "failed to cache census artifact");
        }
        parse_artifact(&body, &key.to_string())
    }
}
