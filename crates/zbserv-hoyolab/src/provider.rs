//! HTTP resource provider backed by the HoYoLAB game record API.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use zbserv_core::{Domain, DomainConfig, FetchError, ResourceProvider, ResourceSnapshot};

use crate::ds::generate_ds;
use crate::response::parse_note;

/// Base URL for Genshin Impact and Star Rail notes.
pub const DEFAULT_BBS_BASE: &str = "https://bbs-api-os.hoyolab.com";

/// Base URL for Zenless Zone Zero notes.
pub const DEFAULT_ZZZ_BASE: &str = "https://sg-public-api.hoyolab.com";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0";
const CLIENT_TYPE: &str = "5";
const LANGUAGE: &str = "en-us";
const ZZZ_PAGE: &str = "v1.7.1_#/zzz";

/// Fetches daily notes using the account cookie.
///
/// One `reqwest::Client` is shared by every domain so connections are pooled.
pub struct HoyolabProvider {
    client: reqwest::Client,
    cookie: Option<String>,
    bbs_base: String,
    zzz_base: String,
}

impl HoyolabProvider {
    /// Creates a provider. A `None` or blank cookie makes every fetch fail
    /// with [`FetchError::MissingCredentials`].
    pub fn new(cookie: Option<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            client,
            cookie: cookie.filter(|c| !c.trim().is_empty()),
            bbs_base: DEFAULT_BBS_BASE.to_string(),
            zzz_base: DEFAULT_ZZZ_BASE.to_string(),
        })
    }

    /// Overrides both API base URLs.
    pub fn with_base_urls(mut self, bbs_base: impl Into<String>, zzz_base: impl Into<String>) -> Self {
        self.bbs_base = bbs_base.into();
        self.zzz_base = zzz_base.into();
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.cookie.is_some()
    }

    /// Returns the note endpoint for a domain.
    pub fn note_url(&self, domain: Domain) -> String {
        let bbs = self.bbs_base.trim_end_matches('/');
        match domain {
            Domain::Genshin => format!("{bbs}/game_record/genshin/api/dailyNote"),
            Domain::StarRail => format!("{bbs}/game_record/hkrpg/api/note"),
            Domain::Zzz => format!(
                "{}/event/game_record_zzz/api/zzz/note",
                self.zzz_base.trim_end_matches('/')
            ),
        }
    }

    fn build_request(&self, config: &DomainConfig, cookie: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(self.note_url(config.domain))
            .query(&[
                ("role_id", config.role_id.as_str()),
                ("server", config.server.as_str()),
            ])
            .header("DS", generate_ds())
            .header("Cookie", cookie)
            .header("x-rpc-client_type", CLIENT_TYPE)
            .header("x-rpc-language", LANGUAGE);

        if let Some(version) = &config.app_version {
            request = request.header("x-rpc-app_version", version.as_str());
        }
        if config.domain == Domain::Zzz {
            request = request.header("x-rpc-page", ZZZ_PAGE);
        }
        for (name, value) in &config.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }
}

#[async_trait]
impl ResourceProvider for HoyolabProvider {
    async fn fetch(&self, config: &DomainConfig) -> Result<ResourceSnapshot, FetchError> {
        let domain = config.domain;
        let cookie = self
            .cookie
            .as_deref()
            .ok_or(FetchError::MissingCredentials { domain })?;

        let response = self
            .build_request(config, cookie)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let status = response.status();
        info!(domain = %domain, status = status.as_u16(), "Fetched daily note");

        if !status.is_success() {
            return Err(FetchError::Status {
                domain,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let snapshot = parse_note(config, &body, chrono::Utc::now().timestamp())?;
        debug!(
            domain = %domain,
            current = snapshot.current,
            max = snapshot.max,
            fully_recovered_epoch = snapshot.fully_recovered_epoch,
            "Parsed daily note"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_urls() {
        let provider = HoyolabProvider::new(Some("ltoken=x".to_string())).unwrap();
        assert_eq!(
            provider.note_url(Domain::Genshin),
            "https://bbs-api-os.hoyolab.com/game_record/genshin/api/dailyNote"
        );
        assert_eq!(
            provider.note_url(Domain::StarRail),
            "https://bbs-api-os.hoyolab.com/game_record/hkrpg/api/note"
        );
        assert_eq!(
            provider.note_url(Domain::Zzz),
            "https://sg-public-api.hoyolab.com/event/game_record_zzz/api/zzz/note"
        );
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let provider = HoyolabProvider::new(None)
            .unwrap()
            .with_base_urls("http://127.0.0.1:9000/", "http://127.0.0.1:9001/");
        assert_eq!(
            provider.note_url(Domain::StarRail),
            "http://127.0.0.1:9000/game_record/hkrpg/api/note"
        );
        assert_eq!(
            provider.note_url(Domain::Zzz),
            "http://127.0.0.1:9001/event/game_record_zzz/api/zzz/note"
        );
    }

    #[test]
    fn test_blank_cookie_is_no_credentials() {
        assert!(!HoyolabProvider::new(None).unwrap().has_credentials());
        assert!(!HoyolabProvider::new(Some("  ".to_string())).unwrap().has_credentials());
        assert!(HoyolabProvider::new(Some("ltuid=1".to_string())).unwrap().has_credentials());
    }

    #[tokio::test]
    async fn test_fetch_without_cookie_fails_fast() {
        let provider = HoyolabProvider::new(None).unwrap();
        let err = provider
            .fetch(&DomainConfig::new(Domain::Genshin))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::MissingCredentials {
                domain: Domain::Genshin
            }
        );
    }

    #[test]
    fn test_request_headers() {
        let provider = HoyolabProvider::new(Some("c".to_string())).unwrap();
        let mut config = DomainConfig::new(Domain::Zzz);
        config.role_id = "1000482805".to_string();
        config.server = "prod_gf_us".to_string();
        config
            .extra_headers
            .insert("x-rpc-geetest_ext".to_string(), "{}".to_string());

        let request = provider.build_request(&config, "c").build().unwrap();
        let headers = request.headers();
        assert_eq!(headers.get("Cookie").unwrap(), "c");
        assert_eq!(headers.get("x-rpc-page").unwrap(), ZZZ_PAGE);
        assert_eq!(headers.get("x-rpc-geetest_ext").unwrap(), "{}");
        assert!(headers.get("x-rpc-app_version").is_none());
        assert!(headers.get("DS").is_some());

        let query = request.url().query().unwrap();
        assert!(query.contains("role_id=1000482805"));
        assert!(query.contains("server=prod_gf_us"));
    }
}
