//! Operator console for the kiosk order engine: watch the live board
//! or run a guarded bulk purge. Runs against an in-process store
//! seeded on demand, so every flow is observable end to end.

use std::collections::BTreeSet;
use std::io::Write as _;

use chrono::{Local, NaiveTime};
use clap::{Parser, Subcommand};
use kiosk_common::order::{OrderId, OrderItem, OrderStatus};
use kiosk_common::schedule::{DayWindow, PickupConfig, WeeklyHours};
use kiosk_engine::bulk::{self, DeleteSelector, DELETE_CONFIRM_PHRASE};
use kiosk_engine::localstore::LocalFlags;
use kiosk_engine::orders::{self, CheckoutForm};
use kiosk_engine::session::{Session, Slot};
use kiosk_engine::sync::OrderBoard;
use kiosk_engine::ORDERS;
use kiosk_store::{Filter, Store};

#[derive(Parser)]
#[command(name = "kiosk-admin", about = "Kiosk order engine operator console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the live order board and print coalesced alerts.
    Watch {
        /// Orders to seed before the board opens (they never alert).
        #[arg(long, default_value_t = 5)]
        seed: usize,

        /// Place one simulated incoming order per interval.
        #[arg(long, default_value_t = 3)]
        demo_interval_secs: u64,
    },

    /// Bulk-delete orders behind the confirmation guard.
    Purge {
        /// Restrict to these statuses (comma-separated); omit for all.
        #[arg(long, value_delimiter = ',')]
        status: Vec<OrderStatusArg>,

        /// Restrict to explicit order ids (comma-separated).
        #[arg(long, value_delimiter = ',')]
        id: Vec<String>,

        /// Orders to seed first, so the purge has something to chew.
        #[arg(long, default_value_t = 450)]
        seed: usize,
    },
}

#[derive(Clone, Copy)]
struct OrderStatusArg(OrderStatus);

impl std::str::FromStr for OrderStatusArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<OrderStatus>()
            .map(OrderStatusArg)
            .map_err(|e| e.to_string())
    }
}

fn always_open() -> WeeklyHours {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("valid time");
    let mut hours = WeeklyHours::closed();
    for day in 0..7 {
        // close == open crosses midnight: a 24h window.
        hours.set_day(day, DayWindow::new(midnight, midnight));
    }
    hours
}

async fn seed_orders(store: &Store, n: usize) {
    let hours = always_open();
    let config = PickupConfig::default();
    let mut local = LocalFlags::in_memory();
    for i in 0..n {
        let now = Local::now().naive_local();
        let form = CheckoutForm {
            items: vec![OrderItem {
                id: "espresso".into(),
                name: "Espresso".into(),
                qty: 1 + (i % 3) as u32,
                base_price: 12,
                modifiers: Default::default(),
                unit_price: 12,
                line_total: 0,
            }],
            customer_name: format!("Seeded customer {i}"),
            customer_phone: "050-1234567".into(),
            notes: String::new(),
            pickup_slot: Some(now + chrono::Duration::minutes(30)),
        };
        if let Err(e) = orders::checkout(store, &mut local, &hours, &config, now, form).await {
            tracing::warn!(i, error = %e, "seed order failed");
        }
    }
    println!("Seeded {n} orders");
}

// ─── Watch ──────────────────────────────────────────────────────────────────

async fn run_watch(store: Store, seed: usize, demo_interval_secs: u64) {
    seed_orders(&store, seed).await;

    let mut session = Session::new(store.clone(), LocalFlags::open("admin"));
    session.local.set_admin_session(true);
    session.install(Slot::OrderBoard, |s| s.subscribe(ORDERS, Filter::All));
    let mut board = OrderBoard::new();

    // Simulated storefront traffic so the board has something live.
    let traffic = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut n = 0usize;
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(demo_interval_secs)).await;
                n += 1;
                seed_orders(&store, 1).await;
                if n >= 10 {
                    break;
                }
            }
        })
    };

    println!("Watching the order board; Ctrl-C to stop.");
    loop {
        let Some(sub) = session.subscription(Slot::OrderBoard) else {
            break;
        };
        let snapshot = tokio::select! {
            snap = sub.next() => snap,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(snapshot) = snapshot else {
            break;
        };
        let alert = board.apply(&snapshot);
        let counts = board.counts();
        println!(
            "board: {} orders | new {} / in_progress {} / ready {} / denied {}",
            board.orders.len(),
            counts.new,
            counts.in_progress,
            counts.ready,
            counts.denied_deliveries
        );
        if let Some(alert) = alert {
            if alert.new_orders > 0 {
                println!("  ** {} new order(s) arrived", alert.new_orders);
            }
            if alert.updated_threads > 0 {
                println!("  ** {} thread(s) have new customer messages", alert.updated_threads);
            }
        }
    }

    traffic.abort();
    session.logout();
    println!("Board closed.");
}

// ─── Purge ──────────────────────────────────────────────────────────────────

fn prompt(line: &str) -> String {
    print!("{line}");
    let _ = std::io::stdout().flush();
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return String::new();
    }
    input.trim().to_owned()
}

async fn run_purge(store: Store, statuses: Vec<OrderStatusArg>, ids: Vec<String>, seed: usize) {
    seed_orders(&store, seed).await;

    let selector = if !ids.is_empty() {
        DeleteSelector::ById(ids.into_iter().map(OrderId).collect())
    } else if !statuses.is_empty() {
        DeleteSelector::ByStatus(statuses.iter().map(|s| s.0).collect::<BTreeSet<_>>())
    } else {
        DeleteSelector::All
    };

    let count = match bulk::count_matching(&store, &selector).await {
        Ok(count) => count,
        Err(e) => {
            eprintln!("Count failed: {e}");
            return;
        }
    };
    println!("Target: {} ({count} currently match)", selector.describe());
    if count == 0 {
        println!("Nothing to delete.");
        return;
    }

    let phrase = prompt(&format!("Type {DELETE_CONFIRM_PHRASE} to continue: "));
    if phrase != DELETE_CONFIRM_PHRASE {
        println!("Aborted: confirmation phrase did not match.");
        return;
    }

    // The world may have moved while the operator was typing; the
    // number in the final prompt is recomputed, not reused.
    let count = match bulk::count_matching(&store, &selector).await {
        Ok(count) => count,
        Err(e) => {
            eprintln!("Recount failed: {e}");
            return;
        }
    };
    let answer = prompt(&format!("{count} orders will be deleted. Proceed? [y/N] "));
    if !answer.eq_ignore_ascii_case("y") {
        println!("Aborted.");
        return;
    }

    match bulk::delete_orders(&store, &selector).await {
        Ok(deleted) => println!("Deleted {deleted} orders."),
        Err(abort) => eprintln!(
            "Purge stopped early: {} ({} already deleted)",
            abort.source, abort.deleted
        ),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let store = Store::new();

    match cli.command {
        Command::Watch {
            seed,
            demo_interval_secs,
        } => run_watch(store, seed, demo_interval_secs).await,
        Command::Purge { status, id, seed } => run_purge(store, status, id, seed).await,
    }
}
