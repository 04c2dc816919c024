//! Virtual host matching.
//!
//! # Responsibilities
//! - Normalize the Host header (case-insensitive, port stripped)
//! - Bind TLS connections to the virtual host named by their SNI
//! - Redirect plaintext requests for TLS virtual hosts
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - SNI mismatches are rejected, never best-matched
//! - Path matching happens afterwards against the matched route table

use crate::resolver::validator::normalize_fqdn;
use crate::resolver::{Resolution, RouteTable};

/// Outcome of matching the connection and Host header to a virtual host.
#[derive(Debug, PartialEq, Eq)]
pub enum HostMatch<'r> {
    Matched(&'r RouteTable),
    /// Plaintext request for a TLS virtual host; carries the https location.
    Redirect(String),
    NotFound,
    /// The TLS server name does not select this host.
    Misdirected(String),
}

/// Lowercase a Host header value and strip any port.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map(|(name, _)| name)
            .unwrap_or(host)
    };
    normalize_fqdn(without_port)
}

/// Match a request to a virtual host.
///
/// `sni` is `Some` for TLS connections and carries the requested server name.
pub fn match_virtual_host<'r>(
    resolution: &'r Resolution,
    host: &str,
    sni: Option<&str>,
    path: &str,
) -> HostMatch<'r> {
    let host = normalize_host(host);

    match sni {
        Some(sni) => {
            let sni = normalize_fqdn(sni);
            if sni != host {
                return HostMatch::Misdirected(format!(
                    "host {:?} does not match server name {:?}",
                    host, sni
                ));
            }
            match resolution.tables.get(&sni) {
                Some(table) if table.tls.as_ref().is_some_and(|t| t.enforce_sni) => {
                    HostMatch::Matched(table)
                }
                Some(_) => HostMatch::Misdirected(format!("{:?} is not served over TLS", sni)),
                None => HostMatch::Misdirected(format!("no virtual host for server name {:?}", sni)),
            }
        }
        None => match resolution.tables.get(&host) {
            Some(table) if table.tls.is_some() => {
                HostMatch::Redirect(format!("https://{}{}", table.fqdn, path))
            }
            Some(table) => HostMatch::Matched(table),
            None => HostMatch::NotFound,
        },
    }
}
