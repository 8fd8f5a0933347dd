//! Test fixtures and factory functions for request bodies.

use serde_json::json;
use uuid::Uuid;

/// Create a user register request body.
pub fn register_request(name: Option<&str>) -> serde_json::Value {
    match name {
        Some(n) => json!({ "name": n }),
        None => json!({}),
    }
}

/// Create a card creation request body with `count` cards.
pub fn create_cards_request(count: usize) -> serde_json::Value {
    let cards: Vec<serde_json::Value> = (0..count)
        .map(|i| json!({ "front": format!("Question {}?", i + 1), "back": format!("Answer {}.", i + 1) }))
        .collect();
    json!({ "cards": cards })
}

/// Create a submit review request body. `grade` may be a name or a number.
pub fn review_request(card_id: i64, grade: serde_json::Value) -> serde_json::Value {
    json!({ "card_id": card_id, "grade": grade })
}

/// Submit review request body pinned to a review time.
pub fn review_request_at(card_id: i64, grade: &str, reviewed_at: &str) -> serde_json::Value {
    json!({ "card_id": card_id, "grade": grade, "reviewed_at": reviewed_at })
}

/// Submit review request body with an optimistic version precondition.
pub fn review_request_versioned(card_id: i64, grade: &str, expected_version: i64) -> serde_json::Value {
    json!({ "card_id": card_id, "grade": grade, "expected_version": expected_version })
}

/// Generate a document id unlikely to collide across test runs.
pub fn unique_document_id() -> i64 {
    (Uuid::new_v4().as_u128() >> 80) as i64
}
