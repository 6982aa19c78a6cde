//! Synthetic payload generators, one per scenario.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use super::Scenario;

const STOCKS: &[&str] = &["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "META", "NVDA"];
const SOCIAL_USERS: &[&str] = &["Alice", "Bob", "Charlie", "Diana", "Eve", "Frank"];
const SOCIAL_ACTIONS: &[&str] = &["posted", "liked", "shared", "commented"];
const SOCIAL_TOPICS: &[&str] = &["#tech", "#crypto", "#ai", "#web3", "#startup"];
const CHAT_USERS: &[&str] = &["Alice", "Bob", "Charlie", "Diana"];
const CHAT_LINES: &[&str] = &[
    "Hello everyone!",
    "How are you doing?",
    "Great weather today!",
    "Anyone working on interesting projects?",
    "Check out this new framework",
    "Performance optimization is crucial",
    "Real-time features are amazing",
];
const SENSORS: &[(&str, &str)] = &[
    ("temperature", "°C"),
    ("humidity", "%"),
    ("pressure", "hPa"),
    ("light", "lux"),
    ("motion", "bool"),
];

/// Per-tick inputs shared by every generator.
pub(crate) struct Tick<'a> {
    pub sequence: u64,
    pub simulation_id: &'a str,
    pub started_at: i64,
    pub now: i64,
}

/// Build the full payload `{scenario, timestamp, data, messageId, simulationId}`.
pub(crate) fn generate<R: Rng + ?Sized>(scenario: Scenario, tick: &Tick<'_>, rng: &mut R) -> Value {
    let data = match scenario {
        Scenario::StockPrices => stock_prices(rng),
        Scenario::SocialFeed => social_feed(tick, rng),
        Scenario::SystemMetrics => system_metrics(tick, rng),
        Scenario::ChatMessages => chat_message(tick, rng),
        Scenario::IotSensors => iot_sensors(rng),
        Scenario::HighFrequency => high_frequency(tick, rng),
    };
    json!({
        "scenario": scenario.as_str(),
        "timestamp": tick.now,
        "data": data,
        "messageId": tick.sequence,
        "simulationId": tick.simulation_id,
    })
}

fn pick<'a, R: Rng + ?Sized>(items: &[&'a str], rng: &mut R) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn fixed<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64, places: usize) -> String {
    format!("{:.*}", places, rng.gen_range(lo..hi))
}

fn stock_prices<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let quotes: Vec<Value> = STOCKS
        .iter()
        .map(|symbol| {
            json!({
                "symbol": symbol,
                "price": fixed(rng, 150.0, 250.0, 2),
                "change": fixed(rng, -5.0, 5.0, 2),
                "changePercent": fixed(rng, -5.0, 5.0, 2),
                "volume": rng.gen_range(0..1_000_000u64),
                "marketCap": fixed(rng, 0.0, 1e12, 0),
            })
        })
        .collect();
    Value::Array(quotes)
}

fn social_feed<R: Rng + ?Sized>(tick: &Tick<'_>, rng: &mut R) -> Value {
    let count = rng.gen_range(1..=5);
    let posts: Vec<Value> = (0..count)
        .map(|_| {
            json!({
                "user": pick(SOCIAL_USERS, rng),
                "action": pick(SOCIAL_ACTIONS, rng),
                "topic": pick(SOCIAL_TOPICS, rng),
                "likes": rng.gen_range(0..1000u32),
                "timestamp": tick.now - rng.gen_range(0..3_600_000i64),
            })
        })
        .collect();
    Value::Array(posts)
}

fn system_metrics<R: Rng + ?Sized>(tick: &Tick<'_>, rng: &mut R) -> Value {
    json!({
        "cpu": fixed(rng, 0.0, 100.0, 1),
        "memory": fixed(rng, 0.0, 100.0, 1),
        "disk": fixed(rng, 0.0, 100.0, 1),
        "network": {
            "in": fixed(rng, 0.0, 1000.0, 0),
            "out": fixed(rng, 0.0, 1000.0, 0),
        },
        "processes": rng.gen_range(50..550u32),
        "uptime": tick.now - tick.started_at,
        "loadAverage": [
            fixed(rng, 0.0, 2.0, 2),
            fixed(rng, 0.0, 2.0, 2),
            fixed(rng, 0.0, 2.0, 2),
        ],
    })
}

fn chat_message<R: Rng + ?Sized>(tick: &Tick<'_>, rng: &mut R) -> Value {
    json!({
        "user": pick(CHAT_USERS, rng),
        "message": pick(CHAT_LINES, rng),
        "room": "general",
        "id": format!("msg-{}-{}", tick.now, rng.gen::<u32>()),
        "reactions": rng.gen_range(0..10u32),
    })
}

fn iot_sensors<R: Rng + ?Sized>(rng: &mut R) -> Value {
    let readings: Vec<Value> = SENSORS
        .iter()
        .map(|(sensor, unit)| {
            json!({
                "sensor": sensor,
                "value": fixed(rng, 0.0, 100.0, 2),
                "unit": unit,
                "location": format!("Room-{}", rng.gen_range(1..=5)),
                "battery": rng.gen_range(0..100u32),
                "status": if rng.gen_bool(0.9) { "online" } else { "offline" },
            })
        })
        .collect();
    Value::Array(readings)
}

fn high_frequency<R: Rng + ?Sized>(tick: &Tick<'_>, rng: &mut R) -> Value {
    // 0.1 Hz sine sampled at wall-clock time.
    let seconds = tick.now as f64 / 1000.0;
    json!({
        "value": rng.gen::<f64>(),
        "sequence": tick.sequence,
        "batch": tick.sequence / 100,
        "frequency": 10,
        "signal": (seconds * 2.0 * std::f64::consts::PI * 0.1).sin(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tick(sequence: u64) -> Tick<'static> {
        Tick {
            sequence,
            simulation_id: "sim_test",
            started_at: 1_000,
            now: 6_000,
        }
    }

    #[test]
    fn envelope_fields_present_for_every_scenario() {
        let mut rng = StdRng::seed_from_u64(7);
        for scenario in Scenario::ALL {
            let payload = generate(scenario, &tick(3), &mut rng);
            assert_eq!(payload["scenario"], scenario.as_str());
            assert_eq!(payload["timestamp"], 6_000);
            assert_eq!(payload["messageId"], 3);
            assert_eq!(payload["simulationId"], "sim_test");
            assert!(!payload["data"].is_null());
        }
    }

    #[test]
    fn stock_prices_cover_all_symbols() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = stock_prices(&mut rng);
        let symbols: Vec<&str> = data
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["symbol"].as_str().unwrap())
            .collect();
        assert_eq!(symbols, STOCKS);
        let price: f64 = data[0]["price"].as_str().unwrap().parse().unwrap();
        assert!((150.0..250.0).contains(&price));
    }

    #[test]
    fn social_feed_has_one_to_five_posts() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let n = social_feed(&tick(1), &mut rng).as_array().unwrap().len();
            assert!((1..=5).contains(&n));
        }
    }

    #[test]
    fn system_uptime_from_simulation_start() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(system_metrics(&tick(1), &mut rng)["uptime"], 5_000);
    }

    #[test]
    fn iot_units_match_sensors() {
        let mut rng = StdRng::seed_from_u64(4);
        let data = iot_sensors(&mut rng);
        assert_eq!(data[0]["sensor"], "temperature");
        assert_eq!(data[0]["unit"], "°C");
        assert_eq!(data[4]["unit"], "bool");
    }

    #[test]
    fn high_frequency_batches_by_hundred() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(high_frequency(&tick(99), &mut rng)["batch"], 0);
        assert_eq!(high_frequency(&tick(250), &mut rng)["batch"], 2);
        let signal = high_frequency(&tick(1), &mut rng)["signal"].as_f64().unwrap();
        assert!((-1.0..=1.0).contains(&signal));
    }
}
