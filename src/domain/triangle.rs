//! Triangle generation and the closure-rule invariant (spec §3, §4.4).

use crate::domain::types::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An ordered triple of pairs that close a currency loop. Construction is
/// only possible through [`Triangle::try_new`], which enforces the
/// closure rule, so a `Triangle` value is always valid by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub p1: Symbol,
    pub p2: Symbol,
    pub p3: Symbol,
}

impl Triangle {
    /// Validate the closure rule from spec §3:
    /// either (i) quote of P1 = base of P2 and the remaining currencies of
    /// P1 and P2 form P3, or (ii) base of P1 = quote of P2 analogously.
    pub fn try_new(p1: Symbol, p2: Symbol, p3: Symbol) -> Option<Self> {
        let closes = Self::closes_loop(&p1, &p2, &p3);
        if closes { Some(Triangle { p1, p2, p3 }) } else { None }
    }

    fn closes_loop(p1: &Symbol, p2: &Symbol, p3: &Symbol) -> bool {
        // Case (i): quote(P1) == base(P2), remaining currencies form P3.
        let case_i = p1.quote() == p2.base()
            && ((p3.base() == p1.base() && p3.quote() == p2.quote())
                || (p3.base() == p2.quote() && p3.quote() == p1.base()));

        // Case (ii): base(P1) == quote(P2), remaining currencies form P3.
        let case_ii = p1.base() == p2.quote()
            && ((p3.base() == p1.quote() && p3.quote() == p2.base())
                || (p3.base() == p2.base() && p3.quote() == p1.quote()));

        case_i || case_ii
    }

    pub fn symbols(&self) -> [&Symbol; 3] {
        [&self.p1, &self.p2, &self.p3]
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols().iter().any(|s| *s == symbol)
    }

    /// Canonical sort key used for dedup/stable ordering: the symbols'
    /// string forms sorted lexicographically, joined.
    fn dedup_key(&self) -> (String, String, String) {
        let mut strs = [
            self.p1.as_str().to_string(),
            self.p2.as_str().to_string(),
            self.p3.as_str().to_string(),
        ];
        strs.sort();
        (strs[0].clone(), strs[1].clone(), strs[2].clone())
    }

    pub fn is_majors_only(&self) -> bool {
        self.symbols().iter().all(|s| {
            s.base() == "EUR" || s.base() == "USD" || s.base() == "GBP" || s.base() == "JPY"
        }) && self.symbols().iter().all(|s| {
            s.quote() == "EUR" || s.quote() == "USD" || s.quote() == "GBP" || s.quote() == "JPY"
        })
    }
}

/// Generate every valid triangle from a set of available symbols, filtered
/// to major/minor pairs, deduplicated as unordered triangles, and sorted
/// for reproducibility (spec §4.4). Falls back to a hard-coded common-market
/// list (intersected with what's available) if generation yields nothing —
/// grounded on `trading/arbitrage_detector.py`'s `_get_common_triangles`.
pub fn generate_triangles(available: &[Symbol]) -> Vec<Triangle> {
    let majors: Vec<&Symbol> = available.iter().filter(|s| s.is_major_minor()).collect();

    let mut seen_keys: BTreeSet<(String, String, String)> = BTreeSet::new();
    let mut out: Vec<Triangle> = Vec::new();

    for i in 0..majors.len() {
        for j in 0..majors.len() {
            if i == j {
                continue;
            }
            for k in 0..majors.len() {
                if k == i || k == j {
                    continue;
                }
                if let Some(t) = Triangle::try_new(majors[i].clone(), majors[j].clone(), majors[k].clone()) {
                    let key = t.dedup_key();
                    if seen_keys.insert(key) {
                        out.push(t);
                    }
                }
            }
        }
    }

    out.sort_by(|a, b| a.dedup_key().cmp(&b.dedup_key()));

    if out.is_empty() {
        return fallback_triangles(available);
    }

    out
}

/// Hard-coded common-market triangles, intersected with the available set.
fn fallback_triangles(available: &[Symbol]) -> Vec<Triangle> {
    let available_set: BTreeSet<&str> = available.iter().map(|s| s.as_str()).collect();
    let candidates: [(&str, &str, &str); 4] = [
        ("EURUSD", "USDJPY", "EURJPY"),
        ("GBPUSD", "USDJPY", "GBPJPY"),
        ("EURUSD", "USDCHF", "EURCHF"),
        ("AUDUSD", "USDJPY", "AUDJPY"),
    ];

    candidates
        .iter()
        .filter(|(a, b, c)| {
            available_set.contains(a) && available_set.contains(b) && available_set.contains(c)
        })
        .filter_map(|(a, b, c)| {
            let p1 = Symbol::parse(a)?;
            let p2 = Symbol::parse(b)?;
            let p3 = Symbol::parse(c)?;
            Triangle::try_new(p1, p2, p3)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn eurusd_usdjpy_eurjpy_closes() {
        let t = Triangle::try_new(sym("EURUSD"), sym("USDJPY"), sym("EURJPY"));
        assert!(t.is_some());
    }

    #[test]
    fn non_closing_triple_rejected() {
        let t = Triangle::try_new(sym("EURUSD"), sym("GBPJPY"), sym("AUDCAD"));
        assert!(t.is_none());
    }

    #[test]
    fn generate_triangles_deduplicates_and_sorts() {
        let available = vec![sym("EURUSD"), sym("USDJPY"), sym("EURJPY")];
        let triangles = generate_triangles(&available);
        assert_eq!(triangles.len(), 1);
        // Deterministic regardless of input order.
        let mut reordered = available.clone();
        reordered.reverse();
        let triangles2 = generate_triangles(&reordered);
        assert_eq!(triangles, triangles2);
    }

    #[test]
    fn two_pairs_cannot_form_a_triangle() {
        let two = vec![sym("EURUSD"), sym("USDJPY")];
        assert!(generate_triangles(&two).is_empty());
    }

    #[test]
    fn fallback_only_returns_triangles_fully_available() {
        // AUDUSD present but USDJPY/AUDJPY missing: no fallback triangle should use it.
        let available = vec![sym("AUDUSD"), sym("EURUSD"), sym("USDCHF"), sym("EURCHF")];
        let triangles = generate_triangles(&available);
        assert!(triangles.iter().any(|t| t.contains(&sym("EURCHF"))));
        assert!(!triangles.iter().any(|t| t.contains(&sym("AUDUSD"))));
    }
}
