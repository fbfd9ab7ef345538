//! Canonicalization tables: insurer aliases, the relevant-admissions
//! stopword set, and the bounded equivalence alias map used by BM25
//! query normalization (§4.3, §9).

use std::collections::{HashMap, HashSet};

/// Raw insurer name -> canonical name. Lookup is case-insensitive and
/// falls back to bidirectional substring matching at the filter site
/// (see [`crate::filters::filter_insurance`]); this table only holds
/// exact known aliases.
#[derive(Debug, Clone)]
pub struct InsurerAliasTable {
    aliases: HashMap<String, String>,
}

impl Default for InsurerAliasTable {
    fn default() -> Self {
        let pairs = [
            ("bupa health", "Bupa"),
            ("bupa international", "Bupa"),
            ("bupa", "Bupa"),
            ("axa ppp", "AXA"),
            ("axa health", "AXA"),
            ("axa", "AXA"),
            ("vitality health", "Vitality"),
            ("vitality", "Vitality"),
            ("aviva health", "Aviva"),
            ("aviva", "Aviva"),
            ("cigna global", "Cigna"),
            ("cigna", "Cigna"),
            ("wpa", "WPA"),
            ("the exeter", "The Exeter"),
        ];
        let mut aliases = HashMap::new();
        for (raw, canonical) in pairs {
            aliases.insert(raw.to_string(), canonical.to_string());
        }
        Self { aliases }
    }
}

impl InsurerAliasTable {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    /// Canonicalize a raw insurer name. Unknown names pass through
    /// unchanged so the caller can still attempt a substring match
    /// against the corpus (§4.2 step 3). `canonical(A)` is a fixed
    /// point: canonicalizing an already-canonical name returns it
    /// unchanged (§8).
    pub fn canonical(&self, raw: &str) -> String {
        let key = raw.trim().to_lowercase();
        if let Some(found) = self.aliases.get(&key) {
            return found.clone();
        }
        // A canonical name fed back in should map to itself: check
        // whether `raw` already equals one of our canonical values.
        if self.aliases.values().any(|v| v.eq_ignore_ascii_case(raw)) {
            return raw.to_string();
        }
        raw.to_string()
    }
}

/// Generic medical/geographic stopwords that don't count as
/// "meaningful" terms for the relevant-admissions heuristic (§4.3).
/// Hand-tuned; not externally validated (§9 open question).
pub fn relevant_admission_stopwords() -> HashSet<&'static str> {
    [
        "and", "for", "the", "with", "without", "including", "general",
        "clinic", "clinics", "service", "services", "unit", "units",
        "department", "centre", "center", "hospital", "care", "medical",
        "medicine", "surgery", "surgical", "procedure", "procedures",
        "treatment", "treatments", "patient", "patients", "consultant",
        "consultation", "consultations", "london", "uk", "nhs", "private",
    ]
    .into_iter()
    .collect()
}

/// A single equivalence alias entry. `bidirectional` pairs (e.g.
/// ischaemic/ischemic) expand in either direction; `required_context`
/// gates a context-sensitive expansion (e.g. "echo" only expands when
/// "heart"/"cardiac" is also present).
#[derive(Debug, Clone)]
pub struct AliasEntry {
    pub from: String,
    pub to: String,
    pub bidirectional: bool,
    pub required_context: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct EquivalenceAliasTable {
    entries: Vec<AliasEntry>,
}

impl EquivalenceAliasTable {
    pub fn new(entries: Vec<AliasEntry>) -> Self {
        Self { entries }
    }

    pub fn with_defaults() -> Self {
        Self::new(vec![
            AliasEntry {
                from: "svt".into(),
                to: "supraventricular tachycardia".into(),
                bidirectional: false,
                required_context: None,
            },
            AliasEntry {
                from: "afib".into(),
                to: "atrial fibrillation".into(),
                bidirectional: false,
                required_context: None,
            },
            AliasEntry {
                from: "ischaemic".into(),
                to: "ischemic".into(),
                bidirectional: true,
                required_context: None,
            },
            AliasEntry {
                from: "paediatric".into(),
                to: "pediatric".into(),
                bidirectional: true,
                required_context: None,
            },
            AliasEntry {
                from: "echo".into(),
                to: "echocardiogram".into(),
                bidirectional: false,
                required_context: Some(vec!["heart".into(), "cardiac".into()]),
            },
        ])
    }

    /// Apply the bounded alias expansion: exact word-boundary matches
    /// expand to their canonical form, up to at most 2 appended aliases
    /// regardless of how many tokens match (§8 alias cap).
    pub fn expand(&self, query: &str) -> Vec<String> {
        let normalized = query.to_lowercase();
        let words: HashSet<&str> = normalized.split_whitespace().collect();
        let mut appended = Vec::new();

        for entry in &self.entries {
            if appended.len() >= 2 {
                break;
            }
            let matched_forward = words.contains(entry.from.as_str());
            let matched_backward = entry.bidirectional && words.contains(entry.to.as_str());
            if !matched_forward && !matched_backward {
                continue;
            }
            if let Some(ctx) = &entry.required_context {
                if !ctx.iter().any(|c| words.contains(c.as_str())) {
                    continue;
                }
            }
            let expansion = if matched_forward {
                entry.to.clone()
            } else {
                entry.from.clone()
            };
            if !appended.contains(&expansion) {
                appended.push(expansion);
            }
        }
        appended.truncate(2);
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_is_a_fixed_point() {
        let table = InsurerAliasTable::default();
        let canon = table.canonical("Bupa Health");
        assert_eq!(canon, "Bupa");
        assert_eq!(table.canonical(&canon), "Bupa");
    }

    #[test]
    fn canonical_passes_through_unknown_names() {
        let table = InsurerAliasTable::default();
        assert_eq!(table.canonical("Some Unknown Insurer"), "Some Unknown Insurer");
    }

    #[test]
    fn alias_expansion_caps_at_two() {
        let table = EquivalenceAliasTable::with_defaults();
        let expanded = table.expand("svt afib ischaemic paediatric query");
        assert!(expanded.len() <= 2);
    }

    #[test]
    fn context_gated_alias_requires_context_term() {
        let table = EquivalenceAliasTable::with_defaults();
        assert!(table.expand("echo appointment").is_empty());
        assert_eq!(table.expand("heart echo appointment"), vec!["echocardiogram"]);
    }

    #[test]
    fn bidirectional_alias_expands_either_way() {
        let table = EquivalenceAliasTable::with_defaults();
        assert_eq!(table.expand("ischaemic heart disease"), vec!["ischemic"]);
        assert_eq!(table.expand("ischemic heart disease"), vec!["ischaemic"]);
    }
}
