//! Mock scheduling backend
//!
//! Serves canned services, staff and a generated two-week schedule under the
//! same paths as the backend proxy, so the `booking` CLI can run locally.
//!
//! Behavior:
//! 1. Slots run hourly 10:00-19:00; a few are pre-taken per staff and day
//! 2. POST /bookings marks the slot taken; booking it again returns 409
//! 3. POST /bookings/{id}/cancel frees the slot when the code matches
//! 4. `--fail-staff` makes one specialist's slot lookups return 500
//! 5. `--flaky N` answers the first N requests with 503 to exercise retries
//!
//! Usage:
//!   cargo run --bin mock-scheduler -- --port 8787
//!   cargo run --bin booking -- --base-url http://localhost:8787/api services

use barbershop_booking::domain::types::{
    AvailableDate, BookingPayload, ScheduleSlot, Service, ServiceCategory, ServiceId,
    ServiceStaff, SlotPreview, Staff, StaffId,
};
use barbershop_booking::domain::validation::validate_booking_payload;
use bytes::Bytes;
use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, Weekday};
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const SLOT_HOURS: std::ops::Range<u32> = 10..20;
const SCHEDULE_DAYS: i64 = 14;

#[derive(Parser, Debug)]
#[command(name = "mock-scheduler")]
#[command(about = "Mock scheduling backend for local runs of the booking CLI")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "8787")]
    port: u16,

    /// Path prefix the endpoints live under
    #[arg(long, default_value = "/api/alteg")]
    prefix: String,

    /// Specialist whose slot lookups fail with 500
    #[arg(long)]
    fail_staff: Option<i64>,

    /// Answer this many initial requests with 503
    #[arg(long, default_value = "0")]
    flaky: u32,
}

struct Record {
    staff_id: StaffId,
    datetime: String,
    code: String,
}

struct MockState {
    prefix: String,
    fail_staff: Option<StaffId>,
    flaky_remaining: AtomicU32,
    services: Vec<Service>,
    staff: Vec<Staff>,
    records: Mutex<HashMap<i64, Record>>,
    next_id: AtomicU32,
}

fn service(id: i64, title: &str, price_min: u64, price_max: u64, minutes: u32, category: i64) -> Service {
    Service {
        id: ServiceId(id),
        title: title.to_string(),
        description: None,
        price_min,
        price_max,
        duration: minutes,
        category_id: Some(category),
        image_url: None,
        staff: Vec::new(),
    }
}

fn staff(id: i64, name: &str, specialization: &str, rating: f32) -> Staff {
    Staff {
        id: StaffId(id),
        name: name.to_string(),
        specialization: Some(specialization.to_string()),
        avatar_url: None,
        rating: Some(rating),
        reviews_count: Some(40 + id as u32 * 7),
        next_slots: Vec::new(),
    }
}

impl MockState {
    fn new(args: &Args) -> Self {
        let mut beard = service(2, "Оформление бороды", 900, 900, 30, 1);
        beard.staff = vec![
            ServiceStaff { id: StaffId(1), seance_length: 2400 },
            ServiceStaff { id: StaffId(3), seance_length: 1800 },
        ];
        Self {
            prefix: args.prefix.trim_end_matches('/').to_string(),
            fail_staff: args.fail_staff.map(StaffId),
            flaky_remaining: AtomicU32::new(args.flaky),
            services: vec![
                service(1, "Мужская стрижка", 1500, 2000, 45, 1),
                beard,
                service(3, "Стрижка + борода", 2200, 2600, 75, 1),
                service(4, "Камуфляж седины", 1200, 1200, 30, 2),
            ],
            staff: vec![
                staff(1, "Артём", "Топ-барбер", 4.9),
                staff(2, "Илья", "Барбер", 4.7),
                staff(3, "Марат", "Барбер", 4.8),
            ],
            records: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Staff 2 does not do beards
    fn staff_for(&self, service_id: Option<ServiceId>) -> Vec<&Staff> {
        self.staff
            .iter()
            .filter(|s| !(s.id == StaffId(2) && service_id == Some(ServiceId(2))))
            .collect()
    }

    fn is_taken(&self, staff_id: StaffId, datetime: &str) -> bool {
        self.records.lock().values().any(|r| r.staff_id == staff_id && r.datetime == datetime)
    }

    fn slots(&self, staff_id: StaffId, date: NaiveDate) -> Vec<ScheduleSlot> {
        if date.weekday() == Weekday::Mon {
            return Vec::new();
        }
        let name = self.staff.iter().find(|s| s.id == staff_id).map(|s| s.name.clone());
        SLOT_HOURS
            .map(|hour| {
                let time = format!("{hour:02}:00");
                let datetime = format!("{}T{}:00+03:00", date.format("%Y-%m-%d"), time);
                let pre_taken = (hour as i64 + staff_id.0 + i64::from(date.day())) % 4 == 0;
                ScheduleSlot {
                    available: !pre_taken && !self.is_taken(staff_id, &datetime),
                    time,
                    datetime,
                    staff_id,
                    staff_name: name.clone(),
                }
            })
            .collect()
    }

    fn dates(&self, staff_id: StaffId, from: NaiveDate) -> Vec<AvailableDate> {
        let staff_ids: Vec<StaffId> = if staff_id.is_any() {
            self.staff.iter().map(|s| s.id).collect()
        } else {
            vec![staff_id]
        };
        (0..SCHEDULE_DAYS)
            .map(|offset| from + ChronoDuration::days(offset))
            .filter_map(|date| {
                let slots_count = staff_ids
                    .iter()
                    .map(|&id| self.slots(id, date).iter().filter(|s| s.available).count() as u32)
                    .sum();
                (slots_count > 0).then_some(AvailableDate { date, slots_count })
            })
            .collect()
    }

    fn with_preview(&self, member: &Staff) -> Staff {
        let today = Local::now().date_naive();
        let next_slots = (0..SCHEDULE_DAYS)
            .map(|offset| today + ChronoDuration::days(offset))
            .flat_map(|date| {
                self.slots(member.id, date)
                    .into_iter()
                    .filter(|s| s.available)
                    .map(move |s| SlotPreview { time: s.time, date })
            })
            .take(3)
            .collect();
        Staff { next_slots, ..member.clone() }
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    response
}

fn not_found() -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, json!({ "error": "not_found" }))
}

fn bad_request(message: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::BAD_REQUEST, json!({ "message": message }))
}

fn query_params(req: &Request<hyper::body::Incoming>) -> HashMap<String, String> {
    req.uri()
        .query()
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn param<T: std::str::FromStr>(params: &HashMap<String, String>, key: &str) -> Option<T> {
    params.get(key)?.parse().ok()
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<MockState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let flaky = state
        .flaky_remaining
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok();
    if flaky {
        warn!(method = %method, path = %path, "mock_flaky_503");
        return Ok(json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "message": "Сервис временно недоступен" }),
        ));
    }

    let Some(route) = path.strip_prefix(&state.prefix) else {
        return Ok(not_found());
    };
    let route = route.to_string();
    let segments: Vec<&str> = route.trim_matches('/').split('/').collect();
    let params = query_params(&req);
    info!(method = %method, path = %path, "mock_request");

    let response = match (&method, segments.as_slice()) {
        (&Method::GET, ["services"]) => json_response(StatusCode::OK, json!({ "services": state.services })),
        (&Method::GET, ["services", "categories"]) => {
            let categories: Vec<ServiceCategory> = [(1, "Барбершоп"), (2, "Уход")]
                .iter()
                .map(|&(id, title)| ServiceCategory {
                    id,
                    title: title.to_string(),
                    services: state.services.iter().filter(|s| s.category_id == Some(id)).cloned().collect(),
                })
                .collect();
            json_response(StatusCode::OK, json!({ "categories": categories }))
        }
        (&Method::GET, ["services", id]) => {
            match id.parse::<i64>().ok().and_then(|id| state.services.iter().find(|s| s.id == ServiceId(id))) {
                Some(service) => json_response(StatusCode::OK, json!({ "service": service })),
                None => not_found(),
            }
        }
        (&Method::GET, ["staff"]) => {
            let service_id = param::<i64>(&params, "service_id").map(ServiceId);
            let with_slots = params.get("with_slots").is_some_and(|v| v == "true");
            let staff: Vec<Staff> = state
                .staff_for(service_id)
                .into_iter()
                .map(|s| if with_slots { state.with_preview(s) } else { s.clone() })
                .collect();
            json_response(StatusCode::OK, json!({ "staff": staff }))
        }
        (&Method::GET, ["staff", id]) => {
            match id.parse::<i64>().ok().and_then(|id| state.staff.iter().find(|s| s.id == StaffId(id))) {
                Some(member) => json_response(StatusCode::OK, json!({ "staff": member })),
                None => not_found(),
            }
        }
        (&Method::GET, ["schedule", "dates"]) => {
            let staff_id = param::<i64>(&params, "staff_id").map(StaffId).unwrap_or(StaffId::ANY);
            let from = param::<NaiveDate>(&params, "from_date").unwrap_or_else(|| Local::now().date_naive());
            json_response(StatusCode::OK, json!({ "dates": state.dates(staff_id, from) }))
        }
        (&Method::GET, ["schedule", "slots"]) => {
            let (Some(staff_id), Some(date)) =
                (param::<i64>(&params, "staff_id").map(StaffId), param::<NaiveDate>(&params, "date"))
            else {
                return Ok(bad_request("staff_id and date are required"));
            };
            if state.fail_staff == Some(staff_id) {
                error!(staff_id = %staff_id, "mock_staff_failure");
                json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "schedule backend failed" }))
            } else {
                json_response(StatusCode::OK, json!({ "slots": state.slots(staff_id, date) }))
            }
        }
        (&Method::POST, ["bookings"]) => create_booking(req, &state).await,
        (&Method::POST, ["bookings", id, "cancel"]) => {
            let id = id.parse::<i64>().unwrap_or_default();
            cancel_booking(req, &state, id).await
        }
        _ => not_found(),
    };
    Ok(response)
}

async fn read_json(req: Request<hyper::body::Incoming>) -> Option<Value> {
    let body = req.into_body().collect().await.ok()?.to_bytes();
    serde_json::from_slice(&body).ok()
}

async fn create_booking(req: Request<hyper::body::Incoming>, state: &MockState) -> Response<Full<Bytes>> {
    let Some(payload) = read_json(req).await.and_then(|v| serde_json::from_value::<BookingPayload>(v).ok())
    else {
        return bad_request("Некорректный запрос");
    };
    if let Err(e) = validate_booking_payload(&payload) {
        return json_response(StatusCode::UNPROCESSABLE_ENTITY, json!({ "message": e.to_string() }));
    }
    if state.is_taken(payload.staff_id, &payload.datetime) {
        return json_response(StatusCode::CONFLICT, json!({ "message": "Это время уже занято" }));
    }

    let id = i64::from(state.next_id.fetch_add(1, Ordering::Relaxed)) + 1000;
    let code = format!("{:06}", (id * 7919) % 1_000_000);
    info!(booking_id = %id, staff_id = %payload.staff_id, datetime = %payload.datetime, "mock_booking_created");
    state.records.lock().insert(
        id,
        Record { staff_id: payload.staff_id, datetime: payload.datetime, code: code.clone() },
    );
    json_response(
        StatusCode::CREATED,
        json!({ "booking": { "id": id, "status": "confirmed", "code": code } }),
    )
}

async fn cancel_booking(req: Request<hyper::body::Incoming>, state: &MockState, id: i64) -> Response<Full<Bytes>> {
    let code = read_json(req).await.and_then(|v| v.get("code")?.as_str().map(str::to_string));
    let mut records = state.records.lock();
    match records.get(&id) {
        None => not_found(),
        Some(record) if Some(&record.code) != code.as_ref() => {
            json_response(StatusCode::FORBIDDEN, json!({ "message": "Неверный код отмены" }))
        }
        Some(_) => {
            records.remove(&id);
            info!(booking_id = %id, "mock_booking_cancelled");
            json_response(StatusCode::OK, json!({ "ok": true }))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let state = Arc::new(MockState::new(&args));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = %args.port, prefix = %state.prefix, fail_staff = ?args.fail_staff, flaky = %args.flaky, "mock_scheduler_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle_request(req, state.clone()));
                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "mock_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "mock_accept_error");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("mock_scheduler_shutdown");
                return Ok(());
            }
        }
    }
}
