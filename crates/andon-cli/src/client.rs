//! Async HTTP client wrapping the andon JSON API.

use andon_core::{
  issue::{Issue, IssueUpdate, NewIssue},
  node::Node,
  store::{DeviceQuery, PrevDayStats},
};
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// Connection settings for the andon API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the andon JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Error envelope the server wraps every failure in.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  code:    String,
  message: String,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  /// The username requests are sent as; recorded on acknowledge/close.
  pub fn username(&self) -> &str {
    &self.config.username
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Surface the server's error envelope when the status is a failure.
  async fn check(what: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    match resp.json::<ErrorEnvelope>().await {
      Ok(envelope) => Err(anyhow!(
        "{what} → {status}: [{}] {}",
        envelope.error.code,
        envelope.error.message
      )),
      Err(_) => Err(anyhow!("{what} → {status}")),
    }
  }

  // ── Hierarchy ─────────────────────────────────────────────────────────────

  /// `GET /{collection}[?parent_id=<id>][&name=<name>]`
  pub async fn list_nodes(
    &self,
    collection: &str,
    parent_id: Option<Uuid>,
    name: Option<&str>,
  ) -> Result<Vec<Node>> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(parent_id) = parent_id {
      query.push(("parent_id", parent_id.to_string()));
    }
    if let Some(name) = name {
      query.push(("name", name.to_string()));
    }
    let what = format!("GET /{collection}");
    let resp = self
      .auth(self.client.get(self.url(&format!("/{collection}"))))
      .query(&query)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    let resp = Self::check(&what, resp).await?;
    resp.json().await.context("deserialising nodes")
  }

  /// `GET /{collection}/{id}`, with 404 mapped to `None`.
  pub async fn get_node(&self, collection: &str, id: Uuid) -> Result<Option<Node>> {
    let what = format!("GET /{collection}/{id}");
    let resp = self
      .auth(self.client.get(self.url(&format!("/{collection}/{id}"))))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let resp = Self::check(&what, resp).await?;
    resp.json().await.map(Some).context("deserialising node")
  }

  /// First node of `collection` named `name`, in creation order.
  pub async fn find_node(&self, collection: &str, name: &str) -> Result<Node> {
    let mut hits = self.list_nodes(collection, None, Some(name)).await?;
    if hits.is_empty() {
      return Err(anyhow!("no {collection} named {name:?}"));
    }
    Ok(hits.remove(0))
  }

  // ── Issues ────────────────────────────────────────────────────────────────

  /// `POST /issues`
  pub async fn create_issue(&self, input: &NewIssue) -> Result<Issue> {
    let resp = self
      .auth(self.client.post(self.url("/issues")))
      .json(input)
      .send()
      .await
      .context("POST /issues failed")?;
    let resp = Self::check("POST /issues", resp).await?;
    resp.json().await.context("deserialising issue")
  }

  /// `GET /issues/{id}`
  pub async fn get_issue(&self, id: Uuid) -> Result<Issue> {
    let what = format!("GET /issues/{id}");
    let resp = self
      .auth(self.client.get(self.url(&format!("/issues/{id}"))))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    let resp = Self::check(&what, resp).await?;
    resp.json().await.context("deserialising issue")
  }

  /// `PATCH /issues/{id}`
  pub async fn update_issue(&self, update: &IssueUpdate) -> Result<Issue> {
    let what = format!("PATCH /issues/{}", update.id);
    let resp = self
      .auth(self.client.patch(self.url(&format!("/issues/{}", update.id))))
      .json(update)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    let resp = Self::check(&what, resp).await?;
    resp.json().await.context("deserialising issue")
  }

  /// `GET /issues/by-device?site_name=<site>&...`
  pub async fn issues_by_device(&self, query: &DeviceQuery) -> Result<Vec<Issue>> {
    let resp = self
      .auth(self.client.get(self.url("/issues/by-device")))
      .query(query)
      .send()
      .await
      .context("GET /issues/by-device failed")?;
    let resp = Self::check("GET /issues/by-device", resp).await?;
    resp.json().await.context("deserialising issues")
  }

  /// `GET /issues/stats`
  pub async fn stats(&self) -> Result<PrevDayStats> {
    let resp = self
      .auth(self.client.get(self.url("/issues/stats")))
      .send()
      .await
      .context("GET /issues/stats failed")?;
    let resp = Self::check("GET /issues/stats", resp).await?;
    resp.json().await.context("deserialising stats")
  }

  // ── Deltas ────────────────────────────────────────────────────────────────

  /// `GET /deltas`, returning the raw streaming response.
  ///
  /// Uses a dedicated client without a request timeout: the feed idles
  /// between deltas and the default 30s budget would cut it off mid-watch.
  pub async fn deltas(&self) -> Result<reqwest::Response> {
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .context("failed to build streaming client")?;
    let resp = self
      .auth(
        client
          .get(self.url("/deltas"))
          .header(reqwest::header::ACCEPT, "text/event-stream"),
      )
      .send()
      .await
      .context("GET /deltas failed")?;
    Self::check("GET /deltas", resp).await
  }
}
