//! Line-oriented command front end over the store.

use std::fmt::Write as _;

use ulid::Ulid;

use crate::engine::AppointmentStore;
use crate::model::*;
use crate::revenue::{aggregate, WeekStats, WeekWindow};
use crate::time::{Period, TimeOfDay};

pub const HELP: &str = "\
commands:
  list [date-key]                                       show appointments, optionally for one day
  book <date-key> <HH:MM> <AM|PM> <price> <service> [client...]
  toggle <id>                                           flip pending/completed
  delete <id>
  report [week-offset]                                  weekly revenue, 0 = this week, -1 = last
  reload                                                re-read every appointment
  json                                                  dump the list as JSON
  help
date-key is YYYY-MM-DD or a weekday name";

/// Parsed command from one input line.
#[derive(Debug, PartialEq)]
pub enum Command {
    List { date_key: Option<DateKey> },
    Book(BookingRequest),
    Toggle { id: Ulid },
    Delete { id: Ulid },
    Report { week_offset: i64 },
    Reload,
    Json,
    Help,
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(CommandError::Empty);
    };
    let args: Vec<&str> = words.collect();

    match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => {
            let date_key = match args.as_slice() {
                [] => None,
                [key] => Some(parse_date_key(key)?),
                _ => return Err(CommandError::Usage("list [date-key]")),
            };
            Ok(Command::List { date_key })
        }
        "book" => parse_book(&args),
        "toggle" => Ok(Command::Toggle { id: single_id(&args, "toggle <id>")? }),
        "delete" | "rm" => Ok(Command::Delete { id: single_id(&args, "delete <id>")? }),
        "report" => {
            let week_offset = match args.as_slice() {
                [] => 0,
                [n] => n
                    .parse()
                    .map_err(|_| CommandError::Parse(format!("week offset {n:?}")))?,
                _ => return Err(CommandError::Usage("report [week-offset]")),
            };
            Ok(Command::Report { week_offset })
        }
        "reload" => Ok(Command::Reload),
        "json" => Ok(Command::Json),
        "help" | "?" => Ok(Command::Help),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_book(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "book <date-key> <HH:MM> <AM|PM> <price> <service> [client...]";
    let [key, clock, period, price, service, client @ ..] = args else {
        return Err(CommandError::Usage(USAGE));
    };
    let date_key = parse_date_key(key)?;
    let period: Period = period
        .parse()
        .map_err(|e: crate::time::MalformedTime| CommandError::Parse(e.to_string()))?;
    let time = TimeOfDay::parse(clock, period).map_err(|e| CommandError::Parse(e.to_string()))?;
    let price: f64 = price
        .parse()
        .map_err(|_| CommandError::Parse(format!("price {price:?}")))?;
    Ok(Command::Book(BookingRequest::new(
        date_key,
        time,
        &client.join(" "),
        service,
        price,
    )))
}

fn parse_date_key(s: &str) -> Result<DateKey, CommandError> {
    DateKey::parse(s).map_err(|e| CommandError::Parse(e.to_string()))
}

fn single_id(args: &[&str], usage: &'static str) -> Result<Ulid, CommandError> {
    match args {
        [id] => Ulid::from_string(id).map_err(|e| CommandError::Parse(format!("id {id:?}: {e}"))),
        _ => Err(CommandError::Usage(usage)),
    }
}

/// Run a command and render its output.
pub async fn execute(
    store: &AppointmentStore,
    command: Command,
) -> Result<String, Box<dyn std::error::Error>> {
    let out = match command {
        Command::List { date_key } => {
            let list = match &date_key {
                Some(key) => store.by_date_key(key).await,
                None => store.appointments().await,
            };
            render_list(&list)
        }
        Command::Book(request) => {
            let id = store.book(request).await?;
            format!("booked {id}")
        }
        Command::Toggle { id } => match store.toggle_status(id).await? {
            Some(status) => format!("{id} is now {status}"),
            None => format!("no appointment {id}"),
        },
        Command::Delete { id } => match store.delete(id).await? {
            Some(removed) => format!("deleted {}", render_row(&removed)),
            None => format!("no appointment {id}"),
        },
        Command::Report { week_offset } => {
            let window = WeekWindow::containing(store.today()).offset(week_offset);
            let stats = aggregate(&store.appointments().await, &window);
            render_report(&window, &stats)
        }
        Command::Reload => {
            let count = store.load().await?;
            format!("loaded {count} appointments")
        }
        Command::Json => serde_json::to_string_pretty(&store.appointments().await)?,
        Command::Help => HELP.to_string(),
    };
    Ok(out)
}

pub fn render_row(a: &Appointment) -> String {
    format!(
        "{}  {:<10} {}  {} - {} {:.2} [{}]",
        a.id,
        a.date_key().to_string(),
        a.time,
        a.client,
        a.service_name,
        a.price,
        a.status
    )
}

pub fn render_list(list: &[Appointment]) -> String {
    if list.is_empty() {
        return "no appointments".to_string();
    }
    list.iter().map(render_row).collect::<Vec<_>>().join("\n")
}

pub fn render_report(window: &WeekWindow, stats: &WeekStats) -> String {
    let mut out = format!("week {}\n", window.label());
    let days = (0..7).map(|i| window.start.date() + chrono::Duration::days(i));
    for (i, day) in days.enumerate() {
        let _ = writeln!(
            out,
            "  {:<10} completed {:>9.2}  pending {:>9.2}",
            weekday_name(chrono::Datelike::weekday(&day)),
            stats.completed_earnings[i],
            stats.pending_earnings[i],
        );
    }
    let _ = writeln!(
        out,
        "earned {:.2} from {} completed, {:.2} pending in {}",
        stats.total_earnings, stats.completed_count, stats.total_pending, stats.pending_count
    );
    let _ = write!(
        out,
        "busiest day: {}, average per completed: {:.0}",
        stats.busiest_day_label(),
        stats.average_per_completed
    );
    out
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    Usage(&'static str),
    Parse(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(verb) => write!(f, "unknown command {verb:?}, try help"),
            CommandError::Usage(usage) => write!(f, "usage: {usage}"),
            CommandError::Parse(s) => write!(f, "parse error: {s}"),
        }
    }
}

impl std::error::Error for CommandError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use crate::notify::NotifyHub;
    use crate::remote::MemoryRemote;

    #[test]
    fn parse_book_with_multiword_client() {
        let cmd = parse_command("book lunes 9:30 am 25 Haircut Ana María").unwrap();
        let expected = BookingRequest::new(
            DateKey::Weekday("Monday".into()),
            TimeOfDay::parse("09:30", Period::Am).unwrap(),
            "Ana María",
            "Haircut",
            25.0,
        );
        assert_eq!(cmd, Command::Book(expected));
    }

    #[test]
    fn parse_book_without_client_uses_placeholder() {
        let Command::Book(req) = parse_command("book 2026-10-14 3:00 PM 15.5 Beard").unwrap() else {
            panic!("expected book");
        };
        assert_eq!(req.client, CLIENT_PLACEHOLDER);
        assert_eq!(req.date_key, DateKey::Date(NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()));
        assert_eq!(req.price, 15.5);
    }

    #[test]
    fn parse_book_errors() {
        assert!(matches!(parse_command("book monday 9:00 AM"), Err(CommandError::Usage(_))));
        assert!(matches!(
            parse_command("book someday 9:00 AM 10 Cut"),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            parse_command("book monday 13:00 PM 10 Cut"),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            parse_command("book monday 9:00 XM 10 Cut"),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            parse_command("book monday 9:00 AM ten Cut"),
            Err(CommandError::Parse(_))
        ));
    }

    #[test]
    fn parse_other_commands() {
        let id = Ulid::new();
        assert_eq!(parse_command("list").unwrap(), Command::List { date_key: None });
        assert_eq!(
            parse_command("list friday").unwrap(),
            Command::List { date_key: Some(DateKey::Weekday("Friday".into())) }
        );
        assert_eq!(parse_command(&format!("toggle {id}")).unwrap(), Command::Toggle { id });
        assert_eq!(parse_command(&format!("rm {id}")).unwrap(), Command::Delete { id });
        assert_eq!(parse_command("report").unwrap(), Command::Report { week_offset: 0 });
        assert_eq!(parse_command("REPORT -1").unwrap(), Command::Report { week_offset: -1 });
        assert_eq!(parse_command("reload").unwrap(), Command::Reload);
        assert_eq!(parse_command("json").unwrap(), Command::Json);
        assert_eq!(parse_command("help").unwrap(), Command::Help);
    }

    #[test]
    fn parse_rejects_junk() {
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
        assert_eq!(parse_command("dance"), Err(CommandError::Unknown("dance".into())));
        assert!(matches!(parse_command("toggle nope"), Err(CommandError::Parse(_))));
        assert!(matches!(parse_command("toggle"), Err(CommandError::Usage(_))));
    }

    fn thursday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[tokio::test]
    async fn execute_book_report_and_json() {
        let store = AppointmentStore::new(Arc::new(MemoryRemote::new()), Arc::new(NotifyHub::new()))
            .with_clock(thursday);

        let booked = execute(&store, parse_command("book monday 10:00 AM 250 Haircut Ana").unwrap())
            .await
            .unwrap();
        let id: Ulid = booked.trim_start_matches("booked ").parse().unwrap();
        execute(&store, Command::Toggle { id }).await.unwrap();
        execute(&store, parse_command("book wednesday 11:00 AM 150 Beard").unwrap())
            .await
            .unwrap();

        let report = execute(&store, Command::Report { week_offset: 0 }).await.unwrap();
        assert!(report.starts_with("week 12 Oct - 18 Oct"));
        assert!(report.contains("earned 250.00 from 1 completed, 150.00 pending in 1"));
        assert!(report.contains("busiest day: Monday, average per completed: 250"));

        let last_week = execute(&store, Command::Report { week_offset: -1 }).await.unwrap();
        assert!(last_week.contains("busiest day: none"));

        let json: serde_json::Value =
            serde_json::from_str(&execute(&store, Command::Json).await.unwrap()).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[0]["status"], "completed");
        assert_eq!(json[0]["iso_date"], "2026-10-12");
    }

    #[tokio::test]
    async fn execute_reports_store_errors() {
        let store = AppointmentStore::new(Arc::new(MemoryRemote::new()), Arc::new(NotifyHub::new()))
            .with_clock(thursday);
        let cmd = || parse_command("book 2026-10-13 9:00 AM 20 Cut").unwrap();
        execute(&store, cmd()).await.unwrap();

        let err = execute(&store, cmd()).await.unwrap_err();
        assert!(err.to_string().contains("already booked"));

        let missing = Ulid::new();
        let out = execute(&store, Command::Delete { id: missing }).await.unwrap();
        assert_eq!(out, format!("no appointment {missing}"));
    }
}
