use std::{fmt, sync::Arc, thread, time::Duration};

use anyhow::Context;
use rayon::prelude::*;
use reqwest::{blocking::Client, redirect::Policy};

use crate::{
    config::{CensusConfig, Config, RetryPolicy},
    error::{Error, Result},
    types::{GeoId, PR_STATE_FIPS},
};

use super::{response::parse_response, tract::TractTable, variables::AcsVariable};

/// Why a single HTTP attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Status(u16),
    Timeout,
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status(code) => write!(f, "HTTP {code}"),
            TransportError::Timeout => f.write_str("request timed out"),
            TransportError::Other(msg) => f.write_str(msg),
        }
    }
}

/// One blocking GET. Implementations must be shareable across fetch workers.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &[(String, String)]) -> std::result::Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str, query: &[(String, String)]) -> std::result::Result<String, TransportError> {
        (**self).get(url, query)
    }
}

/// Waits between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

/// `reqwest` blocking transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("prelecciones-xref/0.1")
            .redirect(Policy::limited(10))
            .timeout(timeout)
            .build()
            .context("failed to build Census HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> std::result::Result<String, TransportError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() { TransportError::Timeout }
            else if let Some(status) = e.status() { TransportError::Status(status.as_u16()) }
            else { TransportError::Other(e.to_string()) }
        };

        let resp = self.client.get(url).query(query).send().map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        resp.text().map_err(classify)
    }
}

/// What a request asks the API for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Geography {
    /// The island as one row.
    Island,
    /// One row per municipality.
    Municipalities,
    /// Every tract in one municipality (3-digit county FIPS).
    TractsIn(String),
    /// Every tract on the island.
    AllTracts,
}

impl Geography {
    fn query(&self) -> Vec<(String, String)> {
        let state = format!("state:{PR_STATE_FIPS}");
        match self {
            Geography::Island => vec![("for".into(), state)],
            Geography::Municipalities => vec![("for".into(), "county:*".into()), ("in".into(), state)],
            Geography::TractsIn(fips) => vec![("for".into(), "tract:*".into()), ("in".into(), format!("{state} county:{fips}"))],
            Geography::AllTracts => vec![("for".into(), "tract:*".into()), ("in".into(), state)],
        }
    }

    /// GEOID naming the area covered, for error context.
    fn geoid(&self) -> String {
        match self {
            Geography::TractsIn(fips) => format!("{PR_STATE_FIPS}{fips}"),
            _ => GeoId::island().id().to_string(),
        }
    }
}

/// ACS API client applying the configured retry schedule.
pub struct CensusClient<T: Transport = HttpTransport, S: Sleeper = ThreadSleeper> {
    census: CensusConfig,
    retry: RetryPolicy,
    max_concurrent: usize,
    transport: T,
    sleeper: S,
}

impl CensusClient {
    /// Client over HTTP, sleeping real time between retries.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.retry.request_timeout)?;
        Ok(Self::with_transport(config, transport, ThreadSleeper))
    }
}

impl<T: Transport, S: Sleeper> CensusClient<T, S> {
    pub fn with_transport(config: &Config, transport: T, sleeper: S) -> Self {
        if config.census.resolved_api_key().is_none() {
            tracing::warn!("no Census API key configured; requests may be rate-limited");
        }
        Self {
            census: config.census.clone(),
            retry: config.retry.clone(),
            max_concurrent: config.max_concurrent_requests.max(1),
            transport,
            sleeper,
        }
    }

    fn url(&self) -> String {
        format!("{}/{}/{}", self.census.base_url.trim_end_matches('/'), self.census.year, self.census.dataset)
    }

    /// Fetch `variables` for `geography`, retrying per policy.
    pub fn fetch(&self, geography: &Geography, variables: &[&AcsVariable]) -> Result<TractTable> {
        let url = self.url();
        let columns = std::iter::once("NAME".to_string())
            .chain(variables.iter().flat_map(|v| [v.estimate_column(), v.moe_column()]))
            .collect::<Vec<_>>()
            .join(",");

        let mut query = vec![("get".to_string(), columns)];
        query.extend(geography.query());
        if let Some(key) = self.census.resolved_api_key() {
            query.push(("key".into(), key));
        }

        let fetch_error = |attempts: u32, cause: String| Error::Fetch {
            url: url.clone(),
            variables: variables.iter().map(|v| v.code.to_string()).collect(),
            geoid: geography.geoid(),
            year: self.census.year,
            attempts,
            cause,
        };

        let (body, attempts) = self.get_with_retry(&url, &query)
            .map_err(|(attempts, e)| fetch_error(attempts, e.to_string()))?;

        parse_response(&body, variables)
            .map_err(|e| fetch_error(attempts, format!("malformed response: {e:#}")))
    }

    /// Run one GET under the retry schedule. Returns the body and the attempt count,
    /// or the last failure and the attempt count.
    fn get_with_retry(&self, url: &str, query: &[(String, String)]) -> std::result::Result<(String, u32), (u32, TransportError)> {
        let (mut rate_limited, mut server_errors, mut timeouts) = (0, 0, 0);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let wait = match self.transport.get(url, query) {
                Ok(body) => return Ok((body, attempts)),
                Err(TransportError::Status(429)) if rate_limited < self.retry.rate_limit_max_retries => {
                    rate_limited += 1;
                    self.retry.rate_limit_wait
                }
                Err(TransportError::Status(code)) if (500..600).contains(&code) && server_errors < self.retry.server_error_max_retries => {
                    server_errors += 1;
                    self.retry.server_error_wait
                }
                Err(TransportError::Timeout) if timeouts < self.retry.timeout_max_retries => {
                    timeouts += 1;
                    self.retry.timeout_wait
                }
                Err(e) => return Err((attempts, e)),
            };
            tracing::warn!(url, attempt = attempts, wait_secs = wait.as_secs(), "Census request failed; retrying");
            self.sleeper.sleep(wait);
        }
    }

    /// Tracts of several municipalities, at most `max_concurrent_requests` in flight.
    /// Any exhausted fetch fails the whole call.
    pub fn fetch_counties(&self, county_fips: &[&str], variables: &[&AcsVariable]) -> Result<TractTable> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_concurrent)
            .build()
            .map_err(|e| Error::InvalidInput(format!("cannot start fetch pool: {e}")))?;

        let tables = pool.install(|| {
            county_fips.par_iter()
                .map(|fips| self.fetch(&Geography::TractsIn(fips.to_string()), variables))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut merged = TractTable::new();
        for table in tables {
            merged.merge(table);
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Scripted(Mutex<Vec<std::result::Result<String, TransportError>>>);

    impl Transport for Scripted {
        fn get(&self, _: &str, _: &[(String, String)]) -> std::result::Result<String, TransportError> {
            self.0.lock().unwrap().remove(0)
        }
    }

    #[derive(Default)]
    struct Recorded(Mutex<Vec<Duration>>);

    impl Sleeper for &Recorded {
        fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn query_names_estimate_and_moe_columns() {
        let geography = Geography::TractsIn("127".into());
        assert_eq!(geography.query()[1], ("in".to_string(), "state:72 county:127".to_string()));
        assert_eq!(geography.geoid(), "72127");
        assert_eq!(Geography::Municipalities.geoid(), "72");
    }

    #[test]
    fn client_errors_are_not_retried() {
        let sleeps = Recorded::default();
        let transport = Scripted(Mutex::new(vec![Err(TransportError::Status(400))]));
        let client = CensusClient::with_transport(&Config::default(), transport, &sleeps);

        let result = client.get_with_retry("u", &[]);
        assert_eq!(result, Err((1, TransportError::Status(400))));
        assert!(sleeps.0.lock().unwrap().is_empty());
    }
}
