use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::time::Duration;

use crate::ingest::types::{Event, EventProvider, FetchError};

pub const DEFAULT_API_BASE: &str = "https://api.meetup.com";

/// Fetcher for the Meetup "upcoming events" endpoint.
pub struct MeetupProvider {
    mode: Mode,
}

enum Mode {
    // Canned bodies keyed by source, decoded exactly like HTTP bodies.
    Fixture(HashMap<String, String>),
    Http { api_base: Url, client: Client },
}

impl MeetupProvider {
    /// Build an HTTP provider. `timeout` bounds each request end to end.
    pub fn from_url(api_base: &str, timeout: Duration) -> Result<Self, FetchError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| FetchError::InvalidUrl(format!("{api_base}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(format!(
                "{api_base}: cannot carry a path"
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            mode: Mode::Http { api_base, client },
        })
    }

    pub fn from_fixtures<I, K, V>(bodies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            mode: Mode::Fixture(
                bodies
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// `{api_base}/{source}/events?status=upcoming`, with `source` encoded as
    /// a single path segment.
    pub fn events_url(api_base: &Url, source: &str) -> Result<Url, FetchError> {
        let mut url = api_base.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::InvalidUrl(format!("{api_base}: cannot carry a path")))?
            .pop_if_empty()
            .push(source)
            .push("events");
        url.set_query(Some("status=upcoming"));
        Ok(url)
    }

    async fn fetch_body(client: &Client, url: Url) -> Result<String, FetchError> {
        let resp = client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(resp.text().await?)
    }

    fn parse_events_from_str(s: &str) -> Result<Vec<Event>, FetchError> {
        let events: Vec<Event> = serde_json::from_str(s)?;
        counter!("meetup_fetch_events_total").increment(events.len() as u64);
        Ok(events)
    }
}

#[async_trait]
impl EventProvider for MeetupProvider {
    async fn fetch_events(&self, source: &str) -> Result<Vec<Event>, FetchError> {
        match &self.mode {
            Mode::Fixture(bodies) => {
                let body = bodies
                    .get(source)
                    .ok_or_else(|| FetchError::UnknownSource(source.to_string()))?;
                Self::parse_events_from_str(body)
            }

            Mode::Http { api_base, client } => {
                let url = Self::events_url(api_base, source)?;
                let t0 = std::time::Instant::now();
                let body = Self::fetch_body(client, url).await;
                let outcome = match &body {
                    Ok(_) => "ok",
                    Err(e) => e.kind(),
                };
                histogram!("meetup_fetch_duration_ms", "outcome" => outcome)
                    .record(t0.elapsed().as_secs_f64() * 1_000.0);
                Self::parse_events_from_str(&body?)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Meetup"
    }
}
