use serde_json::Value;

/// Entity key produced by Wit.ai's built-in Wolfram search-query resolution.
pub const SEARCH_QUERY_ENTITY: &str = "wit$wolfram_search_query:wolfram_search_query";

/// Pulls the first resolved search-query entity value out of an NLU response
/// document.
///
/// The lookup path is `entities.{SEARCH_QUERY_ENTITY}.0.value`. Any absent or
/// wrongly shaped level degrades to the empty string rather than signaling
/// failure; the caller decides what an empty query means.
pub fn search_query(document: &Value) -> String {
    document
        .get("entities")
        .and_then(|entities| entities.get(SEARCH_QUERY_ENTITY))
        .and_then(|candidates| candidates.get(0))
        .and_then(|first| first.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}
