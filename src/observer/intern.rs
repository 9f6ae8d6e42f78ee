//! Identifier interning
//!
//! Domains, clients and upstream servers are referenced everywhere by small
//! dense ids. Strings are lowercased before lookup, so `Example.COM` and
//! `example.com` share one id.

use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

use crate::observer::config::ObserverConfig;
use crate::observer::errors::{Result, TableKind};
use crate::observer::table::SlotTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForwardId(pub usize);

/// Case-insensitive string to dense id table
#[derive(Debug)]
pub struct Interner {
    names: SlotTable<String>,
    ids: HashMap<String, usize>,
}

impl Interner {
    pub fn new(kind: TableKind, step: usize, limit: Option<usize>) -> Interner {
        Interner {
            names: SlotTable::new(kind, step, limit),
            ids: HashMap::new(),
        }
    }

    /// Returns the id of `raw`, creating an entry on first sight
    ///
    /// The second return value is true when the entry was created.
    pub fn intern(&mut self, raw: &str) -> Result<(usize, bool)> {
        let key = raw.to_lowercase();
        if let Some(&id) = self.ids.get(&key) {
            return Ok((id, false));
        }

        let id = self.names.push(key.clone())?;
        self.ids.insert(key, id);
        Ok((id, true))
    }

    pub fn find(&self, raw: &str) -> Option<usize> {
        self.ids.get(&raw.to_lowercase()).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The three identifier tables of the observer
#[derive(Debug)]
pub struct IdentifierIndex {
    domains: Interner,
    clients: Interner,
    forwards: Interner,
}

impl IdentifierIndex {
    pub fn new(config: &ObserverConfig) -> IdentifierIndex {
        IdentifierIndex {
            domains: Interner::new(TableKind::Domains, config.alloc_step, config.max_domains),
            clients: Interner::new(TableKind::Clients, config.alloc_step, config.max_clients),
            forwards: Interner::new(TableKind::Forwards, config.alloc_step, None),
        }
    }

    pub fn intern_domain(&mut self, raw: &str) -> Result<(DomainId, bool)> {
        let (id, created) = self.domains.intern(raw)?;
        Ok((DomainId(id), created))
    }

    pub fn intern_client(&mut self, raw: &str) -> Result<(ClientId, bool)> {
        let (id, created) = self.clients.intern(raw)?;
        Ok((ClientId(id), created))
    }

    /// Looks up an upstream server, creating it only if asked to
    pub fn intern_forward(
        &mut self,
        raw: &str,
        create_if_missing: bool,
    ) -> Result<Option<(ForwardId, bool)>> {
        if !create_if_missing {
            return Ok(self.forwards.find(raw).map(|id| (ForwardId(id), false)));
        }

        let (id, created) = self.forwards.intern(raw)?;
        Ok(Some((ForwardId(id), created)))
    }

    pub fn find_domain(&self, raw: &str) -> Option<DomainId> {
        self.domains.find(raw).map(DomainId)
    }

    pub fn find_client(&self, raw: &str) -> Option<ClientId> {
        self.clients.find(raw).map(ClientId)
    }

    pub fn domain_name(&self, id: DomainId) -> Option<&str> {
        self.domains.name(id.0)
    }

    pub fn client_name(&self, id: ClientId) -> Option<&str> {
        self.clients.name(id.0)
    }

    pub fn forward_name(&self, id: ForwardId) -> Option<&str> {
        self.forwards.name(id.0)
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn forward_count(&self) -> usize {
        self.forwards.len()
    }
}
