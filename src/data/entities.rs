// ============================================================
// Layer 4 — Entity Placeholder Filter
// ============================================================
// The dataset files replace named entities with placeholder
// tokens (PERSON, ORG, DATE, ...) and wrap entity spans with
// BOE / EOE markers. Unless a batch request asks to keep them,
// those tokens are removed from both sentences, one token at
// a time.

/// Placeholder tokens removed by `remove_entities`
pub const ENTITY_PLACEHOLDERS: [&str; 19] = [
    "PERSON", "NORP", "FACILITY", "ORG", "GPE", "LOC", "PRODUCT", "EVENT",
    "WORK_OF_ART", "LANGUAGE", "DATE", "TIME", "PERCENT", "MONEY", "QUANTITY",
    "ORDINAL", "CARDINAL", "BOE", "EOE",
];

pub fn is_entity(token: &str) -> bool {
    ENTITY_PLACEHOLDERS.contains(&token)
}

/// Drop every placeholder token from every sentence
pub fn remove_entities(sentences: Vec<Vec<String>>) -> Vec<Vec<String>> {
    sentences
        .into_iter()
        .map(|tokens| tokens.into_iter().filter(|t| !is_entity(t)).collect())
        .collect()
}
