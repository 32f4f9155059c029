use std::collections::HashSet;

/// Outcome of one range scan over the bucket store.
#[derive(Debug, Default)]
pub struct DomainScan {
    pub domains: HashSet<String>,
    pub keys_seen: usize,
    pub buckets_matched: usize,
    pub links_collected: usize,
}

impl DomainScan {
    /// Domains in a stable order for display and responses.
    pub fn sorted_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.domains.iter().cloned().collect();
        domains.sort();
        domains
    }
}
