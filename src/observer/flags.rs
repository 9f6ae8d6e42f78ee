//! Resolver flag bitset
//!
//! The resolver describes every cache and reply event with a bitset. Bit
//! positions follow the resolver's own cache flag layout, so raw values can be
//! passed straight through with `ReplyFlags::from_bits`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde_derive::{Deserialize, Serialize};

/// Flag set attached to resolver events
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyFlags(u32);

/// Diagnostic names, indexed by bit position
const FLAG_NAMES: [&str; 28] = [
    "F_IMMORTAL",
    "F_NAMEP",
    "F_REVERSE",
    "F_FORWARD",
    "F_DHCP",
    "F_NEG",
    "F_HOSTS",
    "F_IPV4",
    "F_IPV6",
    "F_BIGNAME",
    "F_NXDOMAIN",
    "F_CNAME",
    "F_DNSKEY",
    "F_CONFIG",
    "F_DS",
    "F_DNSSECOK",
    "F_UPSTREAM",
    "F_RRNAME",
    "F_SERVER",
    "F_QUERY",
    "F_NOERR",
    "F_AUTH",
    "F_DNSSEC",
    "F_KEYTAG",
    "F_SECSTAT",
    "F_NO_RR",
    "F_IPSET",
    "F_NOEXTRA",
];

impl ReplyFlags {
    pub const IMMORTAL: ReplyFlags = ReplyFlags(1 << 0);
    pub const NAMEP: ReplyFlags = ReplyFlags(1 << 1);
    pub const REVERSE: ReplyFlags = ReplyFlags(1 << 2);
    pub const FORWARD: ReplyFlags = ReplyFlags(1 << 3);
    pub const DHCP: ReplyFlags = ReplyFlags(1 << 4);
    pub const NEG: ReplyFlags = ReplyFlags(1 << 5);
    pub const HOSTS: ReplyFlags = ReplyFlags(1 << 6);
    pub const IPV4: ReplyFlags = ReplyFlags(1 << 7);
    pub const IPV6: ReplyFlags = ReplyFlags(1 << 8);
    pub const BIGNAME: ReplyFlags = ReplyFlags(1 << 9);
    pub const NXDOMAIN: ReplyFlags = ReplyFlags(1 << 10);
    pub const CNAME: ReplyFlags = ReplyFlags(1 << 11);
    pub const DNSKEY: ReplyFlags = ReplyFlags(1 << 12);
    pub const CONFIG: ReplyFlags = ReplyFlags(1 << 13);
    pub const DS: ReplyFlags = ReplyFlags(1 << 14);
    pub const DNSSECOK: ReplyFlags = ReplyFlags(1 << 15);
    pub const UPSTREAM: ReplyFlags = ReplyFlags(1 << 16);
    pub const RRNAME: ReplyFlags = ReplyFlags(1 << 17);
    pub const SERVER: ReplyFlags = ReplyFlags(1 << 18);
    pub const QUERY: ReplyFlags = ReplyFlags(1 << 19);
    pub const NOERR: ReplyFlags = ReplyFlags(1 << 20);
    pub const AUTH: ReplyFlags = ReplyFlags(1 << 21);
    pub const DNSSEC: ReplyFlags = ReplyFlags(1 << 22);
    pub const KEYTAG: ReplyFlags = ReplyFlags(1 << 23);
    pub const SECSTAT: ReplyFlags = ReplyFlags(1 << 24);
    pub const NO_RR: ReplyFlags = ReplyFlags(1 << 25);
    pub const IPSET: ReplyFlags = ReplyFlags(1 << 26);
    pub const NOEXTRA: ReplyFlags = ReplyFlags(1 << 27);

    pub const fn empty() -> ReplyFlags {
        ReplyFlags(0)
    }

    /// Wraps a raw resolver bitset; unknown high bits are kept as-is
    pub const fn from_bits(bits: u32) -> ReplyFlags {
        ReplyFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set
    pub const fn contains(self, other: ReplyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: ReplyFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Looks up a single flag by name, with or without the `F_` prefix
    pub fn from_name(name: &str) -> Option<ReplyFlags> {
        let name = name.trim().to_ascii_uppercase();
        let name = name.strip_prefix("F_").unwrap_or(&name);
        FLAG_NAMES
            .iter()
            .position(|candidate| &candidate[2..] == name)
            .map(|bit| ReplyFlags(1 << bit))
    }

    /// Names of the set flags in bit order
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        FLAG_NAMES
            .iter()
            .enumerate()
            .filter(move |(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, name)| *name)
    }
}

impl BitOr for ReplyFlags {
    type Output = ReplyFlags;

    fn bitor(self, rhs: ReplyFlags) -> ReplyFlags {
        ReplyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ReplyFlags {
    fn bitor_assign(&mut self, rhs: ReplyFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ReplyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "ReplyFlags(empty)");
        }

        write!(f, "ReplyFlags(")?;
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", name)?;
        }
        write!(f, ")")
    }
}
