//! Accept-Encoding content negotiation (RFC 7231 section 5.3.4).
//!
//! Parsing never fails: malformed quality values degrade to "that coding is
//! not acceptable" so a bad header can't take down an otherwise fine
//! response. Selection is pure; the same inputs always pick the same coding.

use std::collections::HashMap;

use crate::encoding::Encoding;

/// Implicit weight for `identity` when the client never mentions it.
///
/// Identity is always minimally acceptable unless the client rules it out
/// explicitly (`identity;q=0`) or via a zero-weight wildcard.
const IDENTITY_DEFAULT_WEIGHT: f64 = 0.001;

const IDENTITY: &str = "identity";
const WILDCARD: &str = "*";

/// Outcome of negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiated {
    /// Compress with this server-supported coding.
    Encoding(Encoding),
    /// Send uncompressed.
    Identity,
    /// The client rejected every server coding and identity too.
    ///
    /// Callers serve the response as-is; this layer never produces a 406.
    NotAcceptable,
}

/// Parsed client encoding preferences.
///
/// One weight per distinct token; when a token appears more than once the
/// last occurrence wins. The wildcard weight applies to any token not
/// explicitly listed.
#[derive(Debug, Clone, Default)]
pub struct AcceptEncoding {
    weights: HashMap<String, f64>,
}

impl AcceptEncoding {
    /// Parse an Accept-Encoding header value.
    ///
    /// An absent or blank header is treated as the single token
    /// `default_if_absent` at weight 1.0.
    pub fn parse(header: Option<&str>, default_if_absent: &str) -> Self {
        let raw = match header {
            Some(h) if !h.trim().is_empty() => h,
            _ => default_if_absent,
        };

        let mut weights = HashMap::new();
        for item in raw.split(',') {
            let (token, weight) = match item.split_once(';') {
                Some((token, params)) => (token.trim(), parse_weight(params)),
                None => (item.trim(), 1.0),
            };
            if token.is_empty() {
                continue;
            }
            weights.insert(token.to_ascii_lowercase(), weight);
        }
        Self { weights }
    }

    /// Effective client weight for a token: explicit entry, else wildcard,
    /// else not acceptable.
    pub fn weight(&self, token: &str) -> Option<f64> {
        self.weights
            .get(token)
            .or_else(|| self.weights.get(WILDCARD))
            .copied()
    }

    /// Effective weight for `identity`, including its implicit floor.
    pub fn identity_weight(&self) -> f64 {
        self.weight(IDENTITY).unwrap_or(IDENTITY_DEFAULT_WEIGHT)
    }

    /// Pick one coding from the server's preference order.
    ///
    /// Client weight is the primary key; the server's declared order breaks
    /// ties (earlier wins). Never returns a coding absent from
    /// `server_order`.
    pub fn select(&self, server_order: &[Encoding]) -> Negotiated {
        let mut best: Option<(Encoding, f64)> = None;
        for &encoding in server_order {
            let weight = match self.weight(encoding.token()) {
                Some(w) if w > 0.0 => w,
                _ => continue,
            };
            // strictly-greater keeps the earlier server entry on ties
            if best.map_or(true, |(_, bw)| weight > bw) {
                best = Some((encoding, weight));
            }
        }
        match best {
            Some((encoding, _)) => Negotiated::Encoding(encoding),
            None if self.identity_weight() > 0.0 => Negotiated::Identity,
            None => Negotiated::NotAcceptable,
        }
    }
}

/// Parse the parameter part of `token;q=weight`.
///
/// A missing `q` parameter means 1.0. Malformed or out-of-range weights
/// count as 0 (rejected) rather than erroring.
fn parse_weight(params: &str) -> f64 {
    for param in params.split(';') {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("q") {
            continue;
        }
        return match value.trim().parse::<f64>() {
            Ok(w) if (0.0..=1.0).contains(&w) => w,
            _ => 0.0,
        };
    }
    1.0
}
