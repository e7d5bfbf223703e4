//! Block Kit rendering of a flight card.
//!
//! Rendering is a pure function of the snapshot and the subscription view: the same inputs
//! always produce the same message. Relative times are left to Slack's `<!date>` tokens
//! instead of being computed from the wall clock.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;
use serde_json::json;

use crate::flight::model::FlightSnapshot;
use crate::flight::model::FlightStatus;
use crate::flight::model::ScheduleEntry;
use crate::flight::share_url;
use crate::model::SubscriptionView;
use crate::model::TrackAction;
use crate::notifier::ChatMessage;

/// Renders the live card for a flight.
pub fn render(snapshot: &FlightSnapshot, view: &SubscriptionView) -> ChatMessage {
    let dep = &snapshot.departure;
    let arr = &snapshot.arrival;
    let dep_tz = dep.airport.timezone.as_str();
    let arr_tz = arr.scheduled_airport.timezone.as_str();

    let mut context = vec![
        plain_text(format_date(dep.schedule.initial_gate_time, dep_tz)),
        plain_text(format!(
            "{} - {}{}",
            format_time(dep.schedule.initial_gate_time, dep_tz),
            format_time(arr.schedule.initial_gate_time, arr_tz),
            date_diff_suffix(
                dep.schedule.initial_gate_time,
                dep_tz,
                arr.schedule.initial_gate_time,
                arr_tz
            ),
        )),
        plain_text(airports_line(snapshot)),
    ];
    if let Some(updated_at) = snapshot.updated_at {
        context.push(mrkdwn(format!(
            "<!date^{}^Last updated {{ago}}|Last updated at {} UTC>",
            updated_at.timestamp(),
            updated_at.format("%a, %b %-d, %H:%M"),
        )));
    }

    let mut blocks = vec![
        header(format!(
            ":airplane: {} | {} to {}",
            snapshot.label(),
            dep.airport.city,
            arr.scheduled_airport.city
        )),
        json!({ "type": "context", "elements": context }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": status_text(snapshot) },
            "accessory": overflow_menu(&snapshot.id, view.active),
        }),
        json!({ "type": "divider" }),
        schedule_table(snapshot),
    ];
    blocks.push(footer(view));

    ChatMessage {
        text: format!("Flight {} ({})", snapshot.label(), snapshot.status),
        blocks: Value::Array(blocks),
    }
}

/// Renders the card shown once upstream no longer knows the flight.
pub fn render_unavailable(flight_label: &str, view: &SubscriptionView) -> ChatMessage {
    let blocks = vec![
        header(format!(":airplane: {flight_label}")),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": "Tracking stopped | The flight link is no longer valid",
            },
        }),
        footer(view),
    ];

    ChatMessage {
        text: format!("Flight {flight_label} (no longer available)"),
        blocks: Value::Array(blocks),
    }
}

fn status_text(snapshot: &FlightSnapshot) -> String {
    let dep = &snapshot.departure;
    let arr = &snapshot.arrival;
    // Overdue is judged against upstream's own clock to keep rendering pure.
    let overdue = |at: DateTime<Utc>| {
        snapshot
            .updated_at
            .is_some_and(|updated_at| updated_at > at)
    };
    let due = |at: DateTime<Utc>| if overdue(at) { " due" } else { "" };

    match &snapshot.status {
        FlightStatus::Scheduled => {
            let at = dep.schedule.initial_gate_time;
            format!(
                "Scheduled | Departure{} *{}*",
                due(at),
                date_token(at, &dep.airport.timezone)
            )
        }
        FlightStatus::DepartureTaxiing => {
            let at = dep
                .schedule
                .runway
                .original
                .unwrap_or(dep.schedule.initial_gate_time);
            format!(
                "Taxiing | Take off{} *{}*",
                due(at),
                date_token(at, &dep.airport.timezone)
            )
        }
        FlightStatus::EnRoute => {
            let at = arr
                .schedule
                .runway
                .estimated
                .unwrap_or(arr.schedule.initial_gate_time);
            format!(
                "En route | Lands *{}*",
                date_token(at, &arr.scheduled_airport.timezone)
            )
        }
        FlightStatus::ArrivalTaxiing => {
            let at = arr
                .schedule
                .gate
                .original
                .unwrap_or(arr.schedule.initial_gate_time);
            format!(
                "Taxiing | Gate arrival{} *{}*",
                due(at),
                date_token(at, &arr.actual_airport.timezone)
            )
        }
        FlightStatus::Landed => {
            let at = arr
                .schedule
                .runway
                .actual
                .or(arr.schedule.gate.actual)
                .unwrap_or(arr.schedule.initial_gate_time);
            format!(
                "Landed *{}*",
                date_token(at, &arr.actual_airport.timezone)
            )
        }
        FlightStatus::Unknown(status) => format!("Unknown status ({status})"),
    }
}

fn airports_line(snapshot: &FlightSnapshot) -> String {
    let arr = &snapshot.arrival;
    let mut line = format!(
        "{} - {}",
        snapshot.departure.airport.iata, arr.scheduled_airport.iata
    );
    if snapshot.diverted() {
        line.push_str(&format!(" (actual {})", arr.actual_airport.iata));
    }
    line
}

fn overflow_menu(flight_id: &str, active: bool) -> Value {
    let mut options = vec![
        json!({
            "text": { "type": "plain_text", "text": ":flighty: Open in Flighty", "emoji": true },
            "url": share_url(flight_id),
            "value": TrackAction::Open.value(),
        }),
        json!({
            "text": { "type": "plain_text", "text": ":wastebasket: Delete message", "emoji": true },
            "description": { "type": "plain_text", "text": "Creator only" },
            "value": TrackAction::Delete.value(),
        }),
    ];
    if active {
        options.push(json!({
            "text": { "type": "plain_text", "text": ":x: Stop updating", "emoji": true },
            "description": { "type": "plain_text", "text": "Creator only" },
            "value": TrackAction::Deactivate.value(),
        }));
    }

    json!({
        "type": "overflow",
        "action_id": TrackAction::ACTION_ID,
        "options": options,
    })
}

fn schedule_table(snapshot: &FlightSnapshot) -> Value {
    let dep = &snapshot.departure;
    let arr = &snapshot.arrival;
    let dep_tz = dep.airport.timezone.as_str();
    let arr_tz = arr.actual_airport.timezone.as_str();
    let separator = || vec![rich_text("-", false); 4];

    let rows = vec![
        vec![
            rich_text("Schedule", false),
            rich_text("Scheduled", true),
            rich_text("Estimated", true),
            rich_text("Actual", true),
        ],
        separator(),
        vec![
            rich_text("Departure", true),
            schedule_cell(Some(dep.schedule.initial_gate_time), dep_tz),
            rich_text("-", false),
            rich_text("-", false),
        ],
        entry_row("Gate departure", &dep.schedule.gate, dep_tz),
        entry_row("Take off", &dep.schedule.runway, dep_tz),
        separator(),
        entry_row("Land", &arr.schedule.runway, arr_tz),
        entry_row("Gate arrival", &arr.schedule.gate, arr_tz),
        vec![
            rich_text("Arrival", true),
            schedule_cell(Some(arr.schedule.initial_gate_time), arr_tz),
            rich_text("-", false),
            rich_text("-", false),
        ],
    ];

    json!({ "type": "table", "rows": rows })
}

fn entry_row(
    label: &str,
    entry: &ScheduleEntry,
    tz: &str,
) -> Vec<Value> {
    vec![
        rich_text(label, true),
        schedule_cell(entry.original, tz),
        schedule_cell(entry.estimated, tz),
        schedule_cell(entry.actual, tz),
    ]
}

fn schedule_cell(at: Option<DateTime<Utc>>, tz: &str) -> Value {
    let Some(at) = at else {
        return json!({ "type": "raw_text", "text": "-" });
    };
    json!({
        "type": "rich_text",
        "elements": [{
            "type": "rich_text_section",
            "elements": [
                { "type": "text", "text": format!("{} (", format_time(at, tz)) },
                {
                    "type": "date",
                    "timestamp": at.timestamp(),
                    "format": "{ago}",
                    "fallback": format!("{} in {tz}", format_date_time(at, tz)),
                },
                { "type": "text", "text": ")" },
            ],
        }],
    })
}

fn footer(view: &SubscriptionView) -> Value {
    let mut elements = vec![
        mrkdwn(format!("Tracked by <@{}>", view.owner_ref)),
        mrkdwn(format!(
            "<!date^{}^{{date_short_pretty}} at {{time}}|{}>",
            view.created_at.timestamp(),
            view.created_at.format("%b %-d, %Y %H:%M UTC"),
        )),
    ];
    if !view.active {
        elements.push(plain_text("No longer updating".to_string()));
    }
    json!({ "type": "context", "elements": elements })
}

fn header(text: String) -> Value {
    json!({
        "type": "header",
        "text": { "type": "plain_text", "text": text, "emoji": true },
    })
}

fn plain_text(text: String) -> Value {
    json!({ "type": "plain_text", "text": text })
}

fn mrkdwn(text: String) -> Value {
    json!({ "type": "mrkdwn", "text": text })
}

fn rich_text(text: &str, bold: bool) -> Value {
    let mut element = json!({ "type": "text", "text": text });
    if bold {
        element["style"] = json!({ "bold": true });
    }
    json!({
        "type": "rich_text",
        "elements": [{ "type": "rich_text_section", "elements": [element] }],
    })
}

/// Slack date token with a local-time fallback, e.g. `<!date^1767283200^{ago}|...>`.
fn date_token(at: DateTime<Utc>, tz: &str) -> String {
    format!(
        "<!date^{}^{{ago}}|{} in {tz}>",
        at.timestamp(),
        format_date_time(at, tz)
    )
}

/// Unknown zone names fall back to UTC rather than failing the card.
fn parse_tz(tz: &str) -> Tz {
    tz.parse().unwrap_or(Tz::UTC)
}

pub fn format_time(at: DateTime<Utc>, tz: &str) -> String {
    at.with_timezone(&parse_tz(tz)).format("%H:%M").to_string()
}

pub fn format_date(at: DateTime<Utc>, tz: &str) -> String {
    at.with_timezone(&parse_tz(tz))
        .format("%a, %b %-d")
        .to_string()
}

pub fn format_date_time(at: DateTime<Utc>, tz: &str) -> String {
    at.with_timezone(&parse_tz(tz))
        .format("%a, %b %-d, %H:%M")
        .to_string()
}

/// Suffix such as ` (+1)` when the local arrival date differs from the local departure date.
pub fn date_diff_suffix(
    start: DateTime<Utc>,
    start_tz: &str,
    end: DateTime<Utc>,
    end_tz: &str,
) -> String {
    let start: NaiveDate = start.with_timezone(&parse_tz(start_tz)).date_naive();
    let end: NaiveDate = end.with_timezone(&parse_tz(end_tz)).date_naive();
    let diff = (end - start).num_days();
    match diff {
        d if d > 0 => format!(" (+{d})"),
        d if d < 0 => format!(" ({d})"),
        _ => String::new(),
    }
}
