//! Prometheus exposition of the global counters
//!
//! Each render builds a private registry from a counter snapshot, so the
//! output never mixes in metrics registered by the embedding process.

use std::convert::TryFrom;

use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::observer::counters::GlobalCounters;
use crate::observer::errors::Result;
use crate::observer::query_type::QueryType;

const NAMESPACE: &str = "dns_observer";

/// Gauges are signed; counters past `i64::MAX` saturate
fn clamp_to_gauge(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn gauge(registry: &Registry, name: &str, help: &str, value: u64) -> Result<()> {
    let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    gauge.set(clamp_to_gauge(value));
    registry.register(Box::new(gauge))?;
    Ok(())
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    label: &str,
    values: &[(&str, u64)],
) -> Result<()> {
    let vec = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &[label])?;
    for &(value_label, value) in values {
        vec.with_label_values(&[value_label]).set(clamp_to_gauge(value));
    }
    registry.register(Box::new(vec))?;
    Ok(())
}

/// Renders `counters` in the Prometheus text format
pub fn render(counters: &GlobalCounters) -> Result<String> {
    let registry = Registry::new();

    gauge(&registry, "queries", "Tracked queries observed", counters.queries)?;
    gauge(
        &registry,
        "blocklist_entries",
        "Entries loaded from blocklist hosts files",
        counters.blocklist_entries,
    )?;

    gauge_vec(
        &registry,
        "queries_by_status",
        "Tracked queries by disposition",
        "status",
        &[
            ("unknown", counters.unknown),
            ("forwarded", counters.forwarded),
            ("cached", counters.cached),
            ("blocked", counters.blocked),
            ("wildcard_blocked", counters.wildcard_blocked),
        ],
    )?;

    gauge_vec(
        &registry,
        "replies",
        "Queries by first reply classification",
        "kind",
        &[
            ("nxdomain", counters.reply_nxdomain),
            ("nodata", counters.reply_nodata),
            ("cname", counters.reply_cname),
            ("ip", counters.reply_ip),
        ],
    )?;

    let by_type: Vec<(&str, u64)> = QueryType::ALL
        .iter()
        .map(|qtype| (qtype.name(), counters.query_type(*qtype)))
        .collect();
    gauge_vec(
        &registry,
        "queries_by_type",
        "Queries by type, including untracked types",
        "type",
        &by_type,
    )?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counters() {
        let mut counters = GlobalCounters::default();
        counters.queries = 12;
        counters.forwarded = 7;
        counters.blocked = 2;
        counters.query_types[QueryType::Aaaa.index()] = 3;

        let text = render(&counters).unwrap();

        assert!(text.contains("dns_observer_queries 12"));
        assert!(text.contains("dns_observer_queries_by_status{status=\"forwarded\"} 7"));
        assert!(text.contains("dns_observer_queries_by_status{status=\"blocked\"} 2"));
        assert!(text.contains("dns_observer_queries_by_type{type=\"AAAA\"} 3"));
        assert!(text.contains("# TYPE dns_observer_replies gauge"));
    }

    #[test]
    fn test_huge_counters_saturate() {
        let mut counters = GlobalCounters::default();
        counters.queries = u64::MAX;
        counters.cached = i64::MAX as u64 + 1;

        let text = render(&counters).unwrap();

        assert!(text.contains(&format!("dns_observer_queries {}", i64::MAX)));
        assert!(text.contains(&format!(
            "dns_observer_queries_by_status{{status=\"cached\"}} {}",
            i64::MAX
        )));
    }

    #[test]
    fn test_render_is_repeatable() {
        let counters = GlobalCounters::default();
        assert_eq!(render(&counters).unwrap(), render(&counters).unwrap());
    }
}
