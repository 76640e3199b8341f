//! Barbershop booking CLI
//!
//! Talks to the scheduling backend proxy (or the `mock-scheduler` binary)
//! and keeps the cart and auth token in a local JSON store.
//!
//! Module structure:
//! - `domain/` - Booking types, wizard state machine, validation
//! - `io/` - External interfaces (HTTP client, scheduling API, local storage)
//! - `services/` - Booking flow controller, cart and auth persistence
//! - `infra/` - Infrastructure (Config, Metrics)
//!
//! Usage:
//!   booking services
//!   booking slots --service-id 1 --date 2026-10-20
//!   booking book --service-id 1 --date 2026-10-20 --time 15:00 --name Иван --phone 89151234567

use anyhow::{bail, Context};
use barbershop_booking::domain::cart::CartItem;
use barbershop_booking::domain::types::{ClientInfo, Service, ServiceId, Staff, StaffId};
use barbershop_booking::domain::validation::validate_client;
use barbershop_booking::domain::wizard::format_date_ru;
use barbershop_booking::domain::BookingStep;
use barbershop_booking::infra::{ApiMetrics, Config};
use barbershop_booking::io::{BookingApi, HttpClient, HttpSchedulerApi, LocalStorage};
use barbershop_booking::services::{AuthSession, BookingFlow, CartStore};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Barbershop booking client
#[derive(Parser, Debug)]
#[command(
    name = "booking",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about
)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Override `[api].base_url`
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List services
    Services {
        /// Group by category
        #[arg(long)]
        categories: bool,
    },
    /// List specialists, optionally only those performing a service
    Staff {
        #[arg(long)]
        service_id: Option<i64>,
    },
    /// Days with free slots
    Dates {
        #[arg(long)]
        staff_id: i64,
        #[arg(long)]
        service_id: i64,
        /// YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
    },
    /// Free slots on a day; every specialist when --staff-id is omitted
    Slots {
        #[arg(long)]
        service_id: i64,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        staff_id: Option<i64>,
    },
    /// Walk the booking wizard end to end
    Book(BookArgs),
    /// Cancel a record with its confirmation code
    Cancel {
        #[arg(long)]
        booking_id: i64,
        #[arg(long)]
        code: String,
    },
    /// Local cart
    Cart {
        #[command(subcommand)]
        action: CartCmd,
    },
    /// Stored auth token
    Auth {
        #[command(subcommand)]
        action: AuthCmd,
    },
}

#[derive(clap::Args, Debug)]
struct BookArgs {
    /// Repeat for several services (needs `[booking].multi_service`)
    #[arg(long = "service-id", required = true)]
    service_ids: Vec<i64>,
    /// Any free specialist when omitted
    #[arg(long)]
    staff_id: Option<i64>,
    /// YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,
    /// HH:MM
    #[arg(long)]
    time: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    comment: Option<String>,
    /// SMS reminder this many hours before the visit
    #[arg(long)]
    sms_hours: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum CartCmd {
    List,
    Add {
        #[arg(long)]
        service_id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    Remove {
        #[arg(long)]
        id: i64,
    },
    Clear,
}

#[derive(Subcommand, Debug)]
enum AuthCmd {
    Login { token: String },
    Logout,
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load_from_path(&args.config);
    if let Some(url) = &args.base_url {
        config = config.with_api_base_url(url);
    }

    info!(
        config_file = %config.config_file(),
        api_url = %config.api_url(""),
        max_retries = %config.api_max_retries(),
        steps = %config.steps().len(),
        storage = %config.storage_path(),
        "config_loaded"
    );

    let storage = LocalStorage::open_shared(config.storage_path());
    let metrics = Arc::new(ApiMetrics::new());
    let session = AuthSession::restore(storage.clone());
    let http = HttpClient::new(&config, metrics.clone())
        .context("Failed to build HTTP client")?
        .with_bearer_token(session.token().map(str::to_string));
    let api: Arc<dyn BookingApi> = Arc::new(HttpSchedulerApi::from_client(http));

    let result = match args.command {
        Cmd::Services { categories } => list_services(api.as_ref(), categories).await,
        Cmd::Staff { service_id } => list_staff(api.as_ref(), service_id.map(ServiceId)).await,
        Cmd::Dates { staff_id, service_id, from } => {
            list_dates(api.as_ref(), StaffId(staff_id), ServiceId(service_id), from).await
        }
        Cmd::Slots { service_id, date, staff_id } => {
            list_slots(api.as_ref(), ServiceId(service_id), date, staff_id.map(StaffId)).await
        }
        Cmd::Book(book) => run_booking(api, &config, book).await,
        Cmd::Cancel { booking_id, code } => {
            api.cancel_booking(booking_id, &code).await?;
            println!("Запись {booking_id} отменена");
            Ok(())
        }
        Cmd::Cart { action } => run_cart(api.as_ref(), CartStore::load(storage), action).await,
        Cmd::Auth { action } => run_auth(session, action),
    };

    if metrics.requests_total() > 0 {
        metrics.report().log();
    }
    result
}

async fn list_services(api: &dyn BookingApi, categories: bool) -> anyhow::Result<()> {
    if categories {
        for category in api.fetch_services_by_category().await? {
            println!("[{}] {}", category.id, category.title);
            for service in &category.services {
                print_service(service);
            }
        }
        return Ok(());
    }
    for service in api.fetch_services().await? {
        print_service(&service);
    }
    Ok(())
}

fn print_service(service: &Service) {
    let price = if service.price_max > service.price_min {
        format!("{}–{} ₽", service.price_min, service.price_max)
    } else {
        format!("{} ₽", service.price_min)
    };
    println!("  {:>4}  {:<40} {:>12}  {} мин", service.id.0, service.title, price, service.duration);
}

async fn list_staff(api: &dyn BookingApi, service_id: Option<ServiceId>) -> anyhow::Result<()> {
    for member in api.fetch_staff(service_id, true).await? {
        print_staff(&member);
    }
    Ok(())
}

fn print_staff(member: &Staff) {
    let next: Vec<String> =
        member.next_slots.iter().map(|s| format!("{} {}", s.date, s.time)).collect();
    println!(
        "  {:>4}  {:<30} {:<20} {}",
        member.id.0,
        member.name,
        member.specialization.as_deref().unwrap_or(""),
        next.join(", ")
    );
}

async fn list_dates(
    api: &dyn BookingApi,
    staff_id: StaffId,
    service_id: ServiceId,
    from: Option<NaiveDate>,
) -> anyhow::Result<()> {
    for day in api.fetch_available_dates(staff_id, service_id, from).await? {
        println!("  {}  {:>3} слотов", format_date_ru(day.date), day.slots_count);
    }
    Ok(())
}

async fn list_slots(
    api: &dyn BookingApi,
    service_id: ServiceId,
    date: NaiveDate,
    staff_id: Option<StaffId>,
) -> anyhow::Result<()> {
    let slots = match staff_id {
        Some(staff_id) => api.fetch_available_time(staff_id, service_id, date).await?,
        None => api.fetch_available_time_all_staff(service_id, date).await?,
    };
    for slot in slots {
        println!("  {}  {}", slot.time, slot.staff_name.as_deref().unwrap_or(""));
    }
    Ok(())
}

/// Surface the wizard's error slot as a command failure
fn check(flow: &BookingFlow) -> anyhow::Result<()> {
    match &flow.state().error {
        Some(message) => bail!("{message}"),
        None => Ok(()),
    }
}

async fn run_booking(
    api: Arc<dyn BookingApi>,
    config: &Config,
    book: BookArgs,
) -> anyhow::Result<()> {
    let mut flow = BookingFlow::new(api, config.steps().clone())
        .with_multi_service(config.multi_service() || book.service_ids.len() > 1)
        .with_notify_by_sms(book.sms_hours.unwrap_or(config.notify_by_sms_hours()));

    flow.load_services().await;
    check(&flow)?;
    for id in &book.service_ids {
        let service = flow
            .state()
            .services
            .iter()
            .find(|s| s.id == ServiceId(*id))
            .cloned()
            .with_context(|| format!("Услуга {id} не найдена"))?;
        flow.choose_service(service);
    }
    flow.next_step().await;
    check(&flow)?;

    while flow.state().current_step != BookingStep::Confirmation {
        match flow.state().current_step {
            BookingStep::Service => bail!("Не выбрана услуга"),
            BookingStep::Staff => match book.staff_id {
                Some(id) => {
                    let staff = flow
                        .state()
                        .staff
                        .iter()
                        .find(|s| s.id == StaffId(id))
                        .cloned()
                        .with_context(|| format!("Мастер {id} не выполняет эту услугу"))?;
                    flow.select_staff(staff);
                }
                None => flow.select_staff(Staff::any()),
            },
            BookingStep::Date => {
                flow.select_date(book.date);
            }
            BookingStep::Time => {
                if flow.state().selected_date != Some(book.date) {
                    flow.select_date(book.date);
                }
                flow.load_available_slots().await;
                check(&flow)?;
                let slot = flow
                    .state()
                    .available_slots
                    .iter()
                    .find(|s| s.time == book.time)
                    .cloned()
                    .with_context(|| format!("Время {} недоступно", book.time))?;
                flow.select_time(slot);
            }
            BookingStep::Confirmation => break,
        }
        let before = flow.state().current_step;
        flow.next_step().await;
        check(&flow)?;
        if flow.state().current_step == before {
            bail!("Шаг «{}» не заполнен", before);
        }
    }

    let client = ClientInfo { name: book.name, phone: book.phone, email: book.email, comment: book.comment };
    validate_client(&client)?;
    flow.set_client_info(client);

    if let Some(when) = flow.formatted_date_time() {
        println!("Запись на {}", when.full);
    }
    let duration = match flow.estimated_duration().total_minutes() {
        Some(minutes) => format!("{minutes} мин"),
        None => "неизвестна".to_string(),
    };
    println!("Стоимость: {} ₽, длительность: {}", flow.total_price(), duration);

    if !flow.create_booking().await {
        check(&flow)?;
        bail!("Не удалось создать запись");
    }

    let result = flow
        .state()
        .booking_result
        .as_ref()
        .context("Запись создана, но ответ пуст")?;
    println!(
        "Запись #{} ({}) к мастеру {}, код: {}",
        result.id,
        result.status.as_str(),
        result.staff.name,
        result.code.as_deref().unwrap_or("-")
    );
    Ok(())
}

async fn run_cart(api: &dyn BookingApi, mut cart: CartStore, action: CartCmd) -> anyhow::Result<()> {
    match action {
        CartCmd::List => {}
        CartCmd::Add { service_id, quantity } => {
            let service = api.fetch_service(ServiceId(service_id)).await?;
            cart.add(CartItem {
                id: service.id.0,
                title: service.title,
                price: service.price_min,
                price_max: (service.price_max > service.price_min).then_some(service.price_max),
                image: service.image_url,
                quantity,
                category_id: service.category_id,
            })?;
        }
        CartCmd::Remove { id } => {
            if !cart.remove(id)? {
                bail!("В корзине нет позиции {id}");
            }
        }
        CartCmd::Clear => cart.clear()?,
    }

    for item in cart.items() {
        println!("  {:>4}  {:<40} {:>3} × {} ₽", item.id, item.title, item.quantity, item.price);
    }
    println!("Итого: {} шт., {} ₽", cart.total_items(), cart.total_price());
    Ok(())
}

fn run_auth(mut session: AuthSession, action: AuthCmd) -> anyhow::Result<()> {
    match action {
        AuthCmd::Login { token } => session.login(&token)?,
        AuthCmd::Logout => session.logout()?,
        AuthCmd::Status => {}
    }
    println!("{}", if session.is_authenticated() { "authenticated" } else { "anonymous" });
    Ok(())
}
