// Enlighten web portal repository implementation
use crate::application::portal_repository::PortalRepository;
use crate::domain::error::{EnlightenError, Result};
use crate::domain::raw_day::RawDaySample;
use crate::domain::topology::{DeviceTopology, PlacedModule};
use crate::infrastructure::config::PersistenceSettings;
use crate::infrastructure::payload_mapper::decode_day;
use crate::infrastructure::persistence::{load_toml, save_toml, PortalState, SessionState};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, redirect, Client, Response, StatusCode, Url};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="authenticity_token"\s+value="([^"]+)""#).expect("valid token pattern")
});
static SYSTEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/systems/([^/?#\s]+)").expect("valid system id pattern"));

/// Cookie jar and the client that sends it.
#[derive(Clone)]
struct HttpSession {
    jar: Arc<Jar>,
    client: Client,
}

impl HttpSession {
    fn new() -> Result<Self> {
        let jar = Arc::new(Jar::default());

        // Redirects carry the system id and signal expired sessions, so they
        // are inspected rather than followed.
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { jar, client })
    }
}

pub struct EnlightenPortal {
    base: Url,
    session: RwLock<HttpSession>,
    persistence: PersistenceSettings,
    state: Mutex<Option<PortalState>>,
}

#[derive(Debug, Deserialize)]
struct LayoutResponse {
    #[serde(default)]
    arrays: Vec<LayoutArray>,
}

#[derive(Debug, Deserialize)]
struct LayoutArray {
    #[serde(default)]
    modules: Vec<LayoutModule>,
}

#[derive(Debug, Deserialize)]
struct LayoutModule {
    x: f64,
    inverter: LayoutInverter,
}

#[derive(Debug, Deserialize)]
struct LayoutInverter {
    inverter_id: serde_json::Value,
}

impl EnlightenPortal {
    pub fn new(base_url: &str, persistence: PersistenceSettings) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            EnlightenError::Configuration(format!("invalid base_url {}: {}", base_url, e))
        })?;
        Ok(Self {
            base,
            session: RwLock::new(HttpSession::new()?),
            persistence,
            state: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| EnlightenError::Configuration(format!("bad portal path {}: {}", path, e)))
    }

    fn session(&self) -> HttpSession {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn client(&self) -> Client {
        self.session().client
    }

    /// Swaps in an empty cookie jar.
    fn reset_session(&self) -> Result<()> {
        let fresh = HttpSession::new()?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    pub fn has_session(&self) -> bool {
        self.session().jar.cookies(&self.base).is_some()
    }

    /// Loads cookies saved by an earlier run. Returns whether any were found.
    pub async fn restore_session(&self) -> Result<bool> {
        let Some(session) = load_toml::<SessionState>(&self.persistence.session_file).await? else {
            return Ok(false);
        };
        let jar = self.session().jar;
        for cookie in &session.cookies {
            jar.add_cookie_str(cookie, &self.base);
        }
        tracing::info!("Restored portal session ({} cookie(s))", session.cookies.len());
        Ok(!session.cookies.is_empty())
    }

    async fn save_session(&self) -> Result<()> {
        if !self.persistence.persist_session {
            return Ok(());
        }
        let cookies: Vec<String> = self
            .session()
            .jar
            .cookies(&self.base)
            .and_then(|v| v.to_str().ok().map(str::to_string))
            .map(|v| v.split("; ").map(str::to_string).collect())
            .unwrap_or_default();
        save_toml(&self.persistence.session_file, &SessionState { cookies }).await
    }

    /// Signs in unless a session is already held. Discovers the system and
    /// its layout afterwards. `force` discards any held cookies first.
    pub async fn login(&self, username: &str, password: &str, force: bool) -> Result<()> {
        if force {
            self.reset_session()?;
        } else if self.has_session() {
            tracing::debug!("Portal session already present, skipping login");
            return Ok(());
        }

        let token = self.fetch_csrf().await?;
        self.post_login(username, password, &token).await?;
        self.save_session().await?;
        self.portal_state(false).await?;
        Ok(())
    }

    async fn fetch_csrf(&self) -> Result<String> {
        let body = self.client().get(self.base.clone()).send().await?.text().await?;
        match extract_authenticity_token(&body) {
            Some(token) => Ok(token),
            None => {
                tracing::warn!("No authenticity token on login page, posting without one");
                Ok(String::new())
            }
        }
    }

    async fn post_login(&self, username: &str, password: &str, token: &str) -> Result<()> {
        let params = [
            ("user[email]", username),
            ("user[password]", password),
            ("authenticity_token", token),
            ("commit", "Sign In"),
            ("utf8", "✓"),
        ];
        let origin = self.base.as_str().trim_end_matches('/').to_string();

        let response = self
            .client()
            .post(self.url("/login/login")?)
            .header(header::ORIGIN, origin.as_str())
            .header(header::REFERER, format!("{}/", origin))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(EnlightenError::Authentication(format!(
                "login returned {}",
                status
            )));
        }
        if !self.has_session() {
            return Err(EnlightenError::Authentication(
                "portal did not issue a session cookie".to_string(),
            ));
        }
        tracing::info!("Logged in to {} as {}", self.base, username);
        Ok(())
    }

    /// System id and layout, from memory, the config file, or the portal.
    async fn portal_state(&self, force: bool) -> Result<PortalState> {
        let mut state = self.state.lock().await;
        if !force {
            if let Some(current) = state.as_ref() {
                return Ok(current.clone());
            }
            if let Some(saved) = load_toml::<PortalState>(&self.persistence.config_file).await? {
                tracing::info!("Loaded portal config for system {}", saved.system_id);
                *state = Some(saved.clone());
                return Ok(saved);
            }
        }

        let system_id = self.fetch_system_id().await?;
        let topology = self.fetch_layout(&system_id).await?;
        let discovered = PortalState {
            system_id,
            device_index: topology.devices().to_vec(),
        };
        tracing::info!(
            "Discovered system {} with {} inverter(s)",
            discovered.system_id,
            discovered.device_index.len()
        );

        if self.persistence.persist_config {
            save_toml(&self.persistence.config_file, &discovered).await?;
        }
        *state = Some(discovered.clone());
        Ok(discovered)
    }

    async fn fetch_system_id(&self) -> Result<String> {
        let response = self.client().get(self.base.clone()).send().await?;
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(EnlightenError::AuthenticationExpired)?;

        extract_system_id(location).ok_or_else(|| {
            EnlightenError::Payload(format!("no system id in redirect to {}", location))
        })
    }

    async fn fetch_layout(&self, system_id: &str) -> Result<DeviceTopology> {
        let url = self.url(&format!("/systems/{}/site_array_layout_x", system_id))?;
        let response = check_session(self.client().get(url).send().await?)?;
        let layout = response.error_for_status()?.json::<LayoutResponse>().await?;

        // TODO: account for array azimuth when ordering modules by position
        let array = layout
            .arrays
            .into_iter()
            .next()
            .ok_or_else(|| EnlightenError::Payload("layout has no arrays".to_string()))?;
        let modules = array
            .modules
            .into_iter()
            .map(|m| PlacedModule {
                device_id: device_id_string(&m.inverter.inverter_id),
                x: m.x,
            })
            .collect();

        Ok(DeviceTopology::from_layout(modules))
    }
}

#[async_trait]
impl PortalRepository for EnlightenPortal {
    async fn fetch_raw_day(&self, date: NaiveDate) -> Result<RawDaySample> {
        let state = self.portal_state(false).await?;
        let url = self.url(&format!(
            "/systems/{}/inverter_data_x/time_series.json",
            state.system_id
        ))?;
        let date_param = date.format("%Y-%m-%d").to_string();

        tracing::debug!("GET {} date={}", url, date_param);
        let response = check_session(
            self.client()
                .get(url)
                .query(&[("date", date_param.as_str())])
                .send()
                .await?,
        )?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(EnlightenError::InvalidDate(date_param));
            }
            _ => {}
        }

        let body = response
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        decode_day(body)
    }

    async fn device_topology(&self) -> Result<DeviceTopology> {
        let state = self.portal_state(false).await?;
        Ok(DeviceTopology::new(state.device_index))
    }

    async fn refresh_device_topology(&self) -> Result<DeviceTopology> {
        let state = self.portal_state(true).await?;
        Ok(DeviceTopology::new(state.device_index))
    }
}

/// Redirects and 401/403 mean the portal wants a fresh login.
fn check_session(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_redirection()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        tracing::warn!("Portal answered {} for {}", status, response.url());
        return Err(EnlightenError::AuthenticationExpired);
    }
    Ok(response)
}

fn extract_authenticity_token(html: &str) -> Option<String> {
    TOKEN_RE.captures(html).map(|c| c[1].to_string())
}

fn extract_system_id(location: &str) -> Option<String> {
    SYSTEM_ID_RE.captures(location).map(|c| c[1].to_string())
}

fn device_id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
