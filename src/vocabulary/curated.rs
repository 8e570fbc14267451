//! Curated list of B2+ news vocabulary.

/// Hard words that recur in broadcast news
pub const CURATED_NEWS_WORDS: &[&str] = &[
    "acquisition", "allegation", "amendment", "antitrust", "arbitration", "asylum", "austerity",
    "autonomous", "ballistic", "benchmark", "bilateral", "boycott", "bureaucracy", "censorship",
    "ceasefire", "coalition", "compliance", "concession", "consensus", "constitutional", "contingency",
    "controversy", "convene", "corruption", "credential", "cybersecurity", "declaration", "default",
    "delegation", "demographic", "deportation", "derivative", "diplomatic", "disinformation",
    "disruptive", "diversification", "embargo", "emission", "escalation", "evacuation", "exemption",
    "expansionary", "expenditure", "extradition", "faction", "federal", "fiscal", "fluctuation",
    "formulation", "friction", "geopolitical", "governance", "humanitarian", "immunity",
    "implementation", "incentive", "incumbent", "indictment", "inflation", "infrastructure",
    "injunction", "integration", "intervention", "jurisdiction", "legislation", "legitimacy",
    "liquidity", "litigation", "macroeconomic", "mandate", "mediation", "merger", "militant",
    "mobilization", "monetary", "moratorium", "multilateral", "negotiation", "oversight", "pandemic",
    "parliamentary", "peninsula", "plaintiff", "polarization", "procurement", "prosecution",
    "ratification", "recession", "referendum", "regulatory", "retaliatory", "sanction", "sovereignty",
    "stalemate", "subsidy", "surveillance", "tariff", "transparency", "unilateral", "volatile",
    "withdrawal",
];

pub fn is_curated_hard_word(lemma: &str) -> bool {
    let lemma = lemma.trim().to_lowercase();
    CURATED_NEWS_WORDS.contains(&lemma.as_str())
}
