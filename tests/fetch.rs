// Integration tests for the Census client retry policy and bounded county fan-out.
// HTTP and sleeping are replaced by recording fakes; nothing touches the network.

use std::{
    collections::VecDeque,
    sync::{atomic::{AtomicUsize, Ordering}, Arc, Mutex},
    thread,
    time::Duration,
};

use prelecciones_xref::{
    census::{lookup, CensusClient, Geography, Sleeper, Transport, TransportError},
    Config, Error, GeoId,
};

const BODY: &str = r#"[["NAME","B19013_001E","B19013_001M","state","county","tract"],
    ["Census Tract 11, San Juan Municipio, Puerto Rico","40000","2500","72","127","001100"]]"#;

/// Replays scripted responses and records every query.
#[derive(Default)]
struct Scripted {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    queries: Mutex<Vec<Vec<(String, String)>>>,
}

impl Scripted {
    fn new(responses: impl IntoIterator<Item = Result<String, TransportError>>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().collect()), ..Self::default() }
    }
}

impl Transport for Scripted {
    fn get(&self, _url: &str, query: &[(String, String)]) -> Result<String, TransportError> {
        self.queries.lock().unwrap().push(query.to_vec());
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

#[derive(Clone, Default)]
struct Recorded(Arc<Mutex<Vec<Duration>>>);

impl Recorded {
    fn sleeps(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

impl Sleeper for Recorded {
    fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.census.api_key = Some("test-key".into());
    config
}

#[test]
fn single_rate_limit_waits_sixty_seconds_once() {
    let sleeper = Recorded::default();
    let transport = Scripted::new([Err(TransportError::Status(429)), Ok(BODY.to_string())]);
    let client = CensusClient::with_transport(&config(), transport, sleeper.clone());

    let income = lookup("median_household_income").unwrap();
    let table = client.fetch(&Geography::TractsIn("127".into()), &[income]).unwrap();

    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(60)]);
    let cell = table.get(&GeoId::parse("72127001100").unwrap(), "median_household_income");
    assert_eq!(cell.value, Some(40_000.0));
}

#[test]
fn server_errors_exhaust_after_three_retries() {
    let sleeper = Recorded::default();
    let transport = Scripted::new((0..4).map(|_| Err(TransportError::Status(503))));
    let client = CensusClient::with_transport(&config(), transport, sleeper.clone());

    let income = lookup("median_household_income").unwrap();
    match client.fetch(&Geography::TractsIn("127".into()), &[income]) {
        Err(Error::Fetch { attempts, geoid, year, variables, cause, .. }) => {
            assert_eq!(attempts, 4);
            assert_eq!(geoid, "72127");
            assert_eq!(year, 2022);
            assert_eq!(variables, vec!["B19013_001".to_string()]);
            assert!(cause.contains("503"));
        }
        other => panic!("expected Fetch error, got {other:?}"),
    }
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(30); 3]);
}

#[test]
fn timeouts_retry_on_a_shorter_schedule() {
    let sleeper = Recorded::default();
    let transport = Scripted::new([Err(TransportError::Timeout), Err(TransportError::Timeout), Ok(BODY.to_string())]);
    let client = CensusClient::with_transport(&config(), transport, sleeper.clone());

    let income = lookup("median_household_income").unwrap();
    assert!(client.fetch(&Geography::TractsIn("127".into()), &[income]).is_ok());
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(15); 2]);
}

#[test]
fn malformed_body_is_a_fetch_error_without_retry() {
    let sleeper = Recorded::default();
    let transport = Scripted::new([Ok("<html>maintenance</html>".to_string())]);
    let client = CensusClient::with_transport(&config(), transport, sleeper.clone());

    let income = lookup("median_household_income").unwrap();
    assert!(matches!(client.fetch(&Geography::Municipalities, &[income]), Err(Error::Fetch { attempts: 1, .. })));
    assert!(sleeper.sleeps().is_empty());
}

#[test]
fn query_names_columns_geography_and_key() {
    let transport = Scripted::new([Ok(BODY.to_string())]);
    let shared = Arc::new(transport);
    let client = CensusClient::with_transport(&config(), Arc::clone(&shared), Recorded::default());
    let income = lookup("median_household_income").unwrap();
    client.fetch(&Geography::TractsIn("127".into()), &[income]).unwrap();

    let query = shared.queries.lock().unwrap()[0].clone();
    assert!(query.contains(&("get".into(), "NAME,B19013_001E,B19013_001M".into())));
    assert!(query.contains(&("for".into(), "tract:*".into())));
    assert!(query.contains(&("in".into(), "state:72 county:127".into())));
    assert!(query.contains(&("key".into(), "test-key".into())));
}

/// Answers every county request after a short delay, tracking peak concurrency.
#[derive(Default)]
struct Counties {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Transport for Counties {
    fn get(&self, _url: &str, query: &[(String, String)]) -> Result<String, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let county = query.iter()
            .find(|(k, _)| k == "in")
            .and_then(|(_, v)| v.rsplit(':').next())
            .unwrap_or("000")
            .to_string();
        Ok(format!(
            r#"[["NAME","B01003_001E","B01003_001M","state","county","tract"],["x","1000","50","72","{county}","000100"]]"#
        ))
    }
}

#[test]
fn county_fan_out_is_bounded_and_merged() {
    let mut config = config();
    config.max_concurrent_requests = 2;
    let transport = Arc::new(Counties::default());
    let client = CensusClient::with_transport(&config, Arc::clone(&transport), Recorded::default());

    let population = lookup("total_population").unwrap();
    let fips = ["001", "003", "005", "007", "009", "011"];
    let table = client.fetch_counties(&fips, &[population]).unwrap();

    assert_eq!(table.len(), fips.len());
    assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    let tract = GeoId::parse("72011000100").unwrap();
    assert_eq!(table.get(&tract, "total_population").value, Some(1_000.0));
}
