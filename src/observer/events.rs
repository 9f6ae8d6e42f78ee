//! Serializable resolver events
//!
//! A `ResolverEvent` is one resolver callback in a form that can be written to
//! and read back from a JSON line. Replaying a captured stream through
//! `DnsObserver::dispatch` produces the same state as the live callbacks.
//!
//! ```json
//! {"event":"query","name":"example.com","client":"192.168.1.10","query_type":"query[A]","id":7}
//! {"event":"reply","name":"example.com","flags":["F_FORWARD"],"answer":"93.184.216.34","ttl":300,"id":7}
//! ```

use std::net::IpAddr;

use serde_derive::{Deserialize, Serialize};

use crate::observer::engine::DnsObserver;
use crate::observer::errors::Result;
use crate::observer::flags::ReplyFlags;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResolverEvent {
    Query {
        name: String,
        client: IpAddr,
        query_type: String,
        id: i32,
    },
    Forwarded {
        name: String,
        server: IpAddr,
        id: i32,
    },
    Reply {
        name: String,
        #[serde(default, with = "flag_list")]
        flags: ReplyFlags,
        #[serde(default)]
        answer: Option<IpAddr>,
        #[serde(default)]
        ttl: u64,
        id: i32,
    },
    Cache {
        name: String,
        #[serde(default, with = "flag_list")]
        flags: ReplyFlags,
        #[serde(default)]
        answer: Option<IpAddr>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        ttl: u64,
        id: i32,
    },
    Dnssec {
        status: i32,
        id: i32,
    },
    Reload,
    HostsLoaded {
        #[serde(default)]
        path: Option<String>,
        count: u64,
    },
}

/// One line of a captured event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLine {
    /// Unix time the event was observed at, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<i64>,
    #[serde(flatten)]
    pub event: ResolverEvent,
}

/// Address bytes plus the family flag the resolver would have set
fn address_parts(addr: &IpAddr) -> (ReplyFlags, Vec<u8>) {
    match addr {
        IpAddr::V4(v4) => (ReplyFlags::IPV4, v4.octets().to_vec()),
        IpAddr::V6(v6) => (ReplyFlags::IPV6, v6.octets().to_vec()),
    }
}

impl DnsObserver {
    /// Applies a decoded event as if the resolver had invoked the callback
    pub fn dispatch(&self, event: &ResolverEvent) -> Result<()> {
        match event {
            ResolverEvent::Query {
                name,
                client,
                query_type,
                id,
            } => {
                let (family, bytes) = address_parts(client);
                self.on_query_observed(family, name, &bytes, query_type, *id)
            }
            ResolverEvent::Forwarded { name, server, id } => {
                let (family, bytes) = address_parts(server);
                self.on_forwarded(family, name, &bytes, *id)
            }
            ResolverEvent::Reply {
                name,
                flags,
                answer,
                ttl,
                id,
            } => {
                match answer.as_ref().map(address_parts) {
                    Some((family, bytes)) => {
                        self.on_reply(*flags | family, name, Some(&bytes), *ttl, *id)
                    }
                    None => self.on_reply(*flags, name, None, *ttl, *id),
                }
                Ok(())
            }
            ResolverEvent::Cache {
                name,
                flags,
                answer,
                source,
                ttl,
                id,
            } => {
                let source = source.as_deref();
                match answer.as_ref().map(address_parts) {
                    Some((family, bytes)) => self.on_cache_answer(
                        *flags | family,
                        name,
                        Some(&bytes),
                        source,
                        *ttl,
                        *id,
                    ),
                    None => self.on_cache_answer(*flags, name, None, source, *ttl, *id),
                }
                Ok(())
            }
            ResolverEvent::Dnssec { status, id } => {
                self.on_dnssec_result(*status, *id);
                Ok(())
            }
            ResolverEvent::Reload => {
                self.on_zone_reload();
                Ok(())
            }
            ResolverEvent::HostsLoaded { path, count } => {
                self.on_hosts_file_loaded(path.as_deref(), *count);
                Ok(())
            }
        }
    }
}

/// Flags travel as a list of names such as `["F_NEG", "F_NXDOMAIN"]`
mod flag_list {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::observer::flags::ReplyFlags;

    pub fn serialize<S: Serializer>(flags: &ReplyFlags, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(flags.names())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ReplyFlags, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;

        let mut flags = ReplyFlags::empty();
        for name in &names {
            match ReplyFlags::from_name(name) {
                Some(flag) => flags |= flag,
                None => return Err(D::Error::custom(format!("unknown flag {}", name))),
            }
        }
        Ok(flags)
    }
}
