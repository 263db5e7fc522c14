//! In-process fake of the booking API

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Credentials accepted by `POST /auth`
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "password123";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDates {
    pub checkin: String,
    pub checkout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub firstname: String,
    pub lastname: String,
    pub totalprice: i64,
    pub depositpaid: bool,
    pub bookingdates: BookingDates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additionalneeds: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
struct BookingFilter {
    firstname: Option<String>,
    lastname: Option<String>,
}

impl BookingFilter {
    fn matches(&self, booking: &Booking) -> bool {
        self.firstname.as_ref().map_or(true, |f| *f == booking.firstname)
            && self.lastname.as_ref().map_or(true, |l| *l == booking.lastname)
    }
}

#[derive(Debug, Default)]
struct BookerState {
    last_id: u64,
    bookings: BTreeMap<u64, Booking>,
    tokens: HashSet<String>,
}

/// Shared state behind the fake API; clones see the same bookings
#[derive(Debug, Clone, Default)]
pub struct FakeBooker {
    state: Arc<RwLock<BookerState>>,
}

impl FakeBooker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ping", get(ping_handler))
            .route("/auth", post(auth_handler))
            .route("/booking", get(list_handler).post(create_handler))
            .route(
                "/booking/:id",
                get(get_handler)
                    .put(update_handler)
                    .patch(partial_update_handler)
                    .delete(delete_handler),
            )
            .with_state(self.clone())
    }

    /// Store a booking directly and return its id
    pub fn insert(&self, booking: Booking) -> u64 {
        let mut state = self.state.write();
        state.last_id += 1;
        let id = state.last_id;
        state.bookings.insert(id, booking);
        id
    }

    pub fn booking(&self, id: u64) -> Option<Booking> {
        self.state.read().bookings.get(&id).cloned()
    }

    pub fn booking_count(&self) -> usize {
        self.state.read().bookings.len()
    }

    /// Number of tokens handed out by `POST /auth`
    pub fn issued_tokens(&self) -> usize {
        self.state.read().tokens.len()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let state = self.state.read();
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().strip_prefix("token="))
            .any(|token| state.tokens.contains(token))
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

async fn ping_handler() -> Response {
    (StatusCode::CREATED, "Created").into_response()
}

async fn auth_handler(State(booker): State<FakeBooker>, Json(creds): Json<Credentials>) -> Response {
    if creds.username != USERNAME || creds.password != PASSWORD {
        return Json(json!({ "reason": "Bad credentials" })).into_response();
    }

    let token = uuid::Uuid::new_v4().simple().to_string()[..15].to_string();
    booker.state.write().tokens.insert(token.clone());
    debug!("issued token {}", token);
    Json(json!({ "token": token })).into_response()
}

async fn list_handler(State(booker): State<FakeBooker>, Query(filter): Query<BookingFilter>) -> Response {
    let state = booker.state.read();
    let ids: Vec<Value> = state
        .bookings
        .iter()
        .filter(|(_, booking)| filter.matches(booking))
        .map(|(id, _)| json!({ "bookingid": id }))
        .collect();
    Json(Value::Array(ids)).into_response()
}

async fn create_handler(State(booker): State<FakeBooker>, Json(booking): Json<Booking>) -> Response {
    let id = booker.insert(booking.clone());
    debug!("created booking {}", id);
    Json(json!({ "bookingid": id, "booking": booking })).into_response()
}

async fn get_handler(State(booker): State<FakeBooker>, Path(id): Path<u64>) -> Response {
    match booker.booking(id) {
        Some(booking) => Json(booking).into_response(),
        None => not_found(),
    }
}

async fn update_handler(
    State(booker): State<FakeBooker>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(booking): Json<Booking>,
) -> Response {
    if !booker.authorized(&headers) {
        return forbidden();
    }

    let mut state = booker.state.write();
    match state.bookings.get_mut(&id) {
        Some(slot) => {
            *slot = booking.clone();
            Json(booking).into_response()
        }
        None => not_found(),
    }
}

async fn partial_update_handler(
    State(booker): State<FakeBooker>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    if !booker.authorized(&headers) {
        return forbidden();
    }

    let mut state = booker.state.write();
    let Some(slot) = state.bookings.get_mut(&id) else {
        return not_found();
    };

    let mut merged = match serde_json::to_value(&*slot) {
        Ok(value) => value,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    merge(&mut merged, patch);

    match serde_json::from_value::<Booking>(merged) {
        Ok(booking) => {
            *slot = booking.clone();
            Json(booking).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

async fn delete_handler(State(booker): State<FakeBooker>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    if !booker.authorized(&headers) {
        return forbidden();
    }

    match booker.state.write().bookings.remove(&id) {
        Some(_) => (StatusCode::CREATED, "Created").into_response(),
        None => not_found(),
    }
}

/// Overlay `patch` onto `target`, recursing into objects
fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jim() -> Booking {
        Booking {
            firstname: "Jim".to_string(),
            lastname: "Brown".to_string(),
            totalprice: 111,
            depositpaid: true,
            bookingdates: BookingDates {
                checkin: "2018-01-01".to_string(),
                checkout: "2019-01-01".to_string(),
            },
            additionalneeds: Some("Breakfast".to_string()),
        }
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let mut target = serde_json::to_value(jim()).unwrap();
        merge(
            &mut target,
            json!({ "firstname": "James", "bookingdates": { "checkout": "2019-02-01" } }),
        );
        let merged: Booking = serde_json::from_value(target).unwrap();
        assert_eq!(merged.firstname, "James");
        assert_eq!(merged.lastname, "Brown");
        assert_eq!(merged.bookingdates.checkin, "2018-01-01");
        assert_eq!(merged.bookingdates.checkout, "2019-02-01");
    }

    #[test]
    fn test_filter() {
        let booking = jim();
        assert!(BookingFilter::default().matches(&booking));
        let by_name = BookingFilter {
            firstname: Some("Jim".to_string()),
            lastname: Some("Brown".to_string()),
        };
        assert!(by_name.matches(&booking));
        let other = BookingFilter {
            firstname: Some("Sally".to_string()),
            lastname: None,
        };
        assert!(!other.matches(&booking));
    }

    #[test]
    fn test_cookie_authorization() {
        let booker = FakeBooker::new();
        booker.state.write().tokens.insert("abc123".to_string());

        let mut headers = HeaderMap::new();
        assert!(!booker.authorized(&headers));

        headers.insert(header::COOKIE, "theme=dark; token=abc123".parse().unwrap());
        assert!(booker.authorized(&headers));

        headers.insert(header::COOKIE, "token=stale".parse().unwrap());
        assert!(!booker.authorized(&headers));
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let booker = FakeBooker::new();
        assert_eq!(booker.insert(jim()), 1);
        assert_eq!(booker.insert(jim()), 2);
        assert_eq!(booker.booking_count(), 2);
        assert_eq!(booker.booking(1), Some(jim()));
        assert_eq!(booker.booking(3), None);
    }
}
