//! Wire model of the upstream flight document.
//!
//! Upstream has changed the shape of this document at least once without notice, so every
//! field is optional here and the required ones are checked while converting into a
//! [`FlightSnapshot`]. Unknown fields are ignored.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;

use crate::flight::error::FlightError;
use crate::flight::model::Airline;
use crate::flight::model::Airport;
use crate::flight::model::Arrival;
use crate::flight::model::Departure;
use crate::flight::model::Equipment;
use crate::flight::model::FlightSnapshot;
use crate::flight::model::FlightStatus;
use crate::flight::model::Position;
use crate::flight::model::Schedule;
use crate::flight::model::ScheduleEntry;

#[derive(Debug, Deserialize)]
pub struct FlightDocument {
    flight: Option<WireFlight>,
    #[serde(default, rename = "flightPosition", alias = "flight_position")]
    flight_position: Option<Vec<WirePosition>>,
    update: Option<WireInstant>,
    deeplink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFlight {
    id: Option<WireText>,
    status: Option<String>,
    airline: Option<WireAirline>,
    #[serde(alias = "flightNumber")]
    flight_number: Option<WireText>,
    departure: Option<WireDeparture>,
    arrival: Option<WireArrival>,
    equipment: Option<WireEquipment>,
}

/// Some identifiers arrive as strings in one schema and as numbers in the other.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireText {
    Str(String),
    Num(serde_json::Number),
}

impl WireText {
    fn into_string(self) -> String {
        match self {
            WireText::Str(s) => s,
            WireText::Num(n) => n.to_string(),
        }
    }
}

/// Instants are either epoch seconds, UTC components `[y, m, d, h, min, s?]`, or RFC 3339.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireInstant {
    Seconds(f64),
    Components(Vec<i64>),
    Rfc3339(String),
}

#[derive(Debug, Deserialize)]
struct WireAirline {
    iata: Option<String>,
    icao: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAirport {
    iata: Option<String>,
    icao: Option<String>,
    name: Option<String>,
    city: Option<String>,
    #[serde(alias = "timeZone", alias = "time_zone")]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDeparture {
    airport: Option<WireAirport>,
    terminal: Option<WireText>,
    gate: Option<WireText>,
    schedule: Option<WireSchedule>,
}

#[derive(Debug, Deserialize)]
struct WireArrival {
    #[serde(alias = "scheduledAirport", alias = "airport")]
    scheduled_airport: Option<WireAirport>,
    #[serde(alias = "actualAirport")]
    actual_airport: Option<WireAirport>,
    terminal: Option<WireText>,
    #[serde(alias = "baggageBelt")]
    baggage_belt: Option<WireText>,
    schedule: Option<WireSchedule>,
}

#[derive(Debug, Deserialize)]
struct WireSchedule {
    gate: Option<WireScheduleItem>,
    runway: Option<WireScheduleItem>,
    #[serde(rename = "initialGateTime", alias = "initial_gate_time")]
    initial_gate_time: Option<WireInstant>,
}

#[derive(Debug, Deserialize)]
struct WireScheduleItem {
    original: Option<WireInstant>,
    estimated: Option<WireInstant>,
    actual: Option<WireInstant>,
}

#[derive(Debug, Deserialize)]
struct WireEquipment {
    #[serde(alias = "modelName")]
    model_name: Option<String>,
    #[serde(alias = "tailNumber")]
    tail_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePosition {
    latitude: Option<f64>,
    longitude: Option<f64>,
    heading: Option<f64>,
}

/// Decodes a flight document from raw JSON text.
pub fn decode_snapshot(json: &str) -> Result<FlightSnapshot, FlightError> {
    let document: FlightDocument = serde_json::from_str(json)?;
    FlightSnapshot::try_from(document)
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, FlightError> {
    value.ok_or_else(|| FlightError::malformed(format!("missing field `{field}`")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn convert_instant(
    value: Option<WireInstant>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, FlightError> {
    let invalid = || FlightError::malformed(format!("invalid instant in `{field}`"));
    match value {
        None => Ok(None),
        Some(WireInstant::Seconds(secs)) => {
            if !secs.is_finite() {
                return Err(invalid());
            }
            // Upstream uses 0 for "not known yet".
            if secs <= 0.0 {
                return Ok(None);
            }
            let whole = secs.trunc() as i64;
            let nanos = (secs.fract() * 1_000_000_000.0).round() as u32;
            DateTime::from_timestamp(whole, nanos.min(999_999_999))
                .map(Some)
                .ok_or_else(invalid)
        }
        Some(WireInstant::Components(parts)) => {
            if parts.is_empty() || parts.iter().all(|p| *p == 0) {
                return Ok(None);
            }
            if parts.len() < 5 {
                return Err(invalid());
            }
            let part = |i: usize| parts.get(i).copied().unwrap_or(0);
            let year = i32::try_from(part(0)).map_err(|_| invalid())?;
            let [month, day, hour, minute, second] =
                [part(1), part(2), part(3), part(4), part(5)].map(|p| u32::try_from(p).ok());
            let (Some(month), Some(day), Some(hour), Some(minute), Some(second)) =
                (month, day, hour, minute, second)
            else {
                return Err(invalid());
            };
            NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| date.and_hms_opt(hour, minute, second))
                .map(|dt| Some(dt.and_utc()))
                .ok_or_else(invalid)
        }
        Some(WireInstant::Rfc3339(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            DateTime::parse_from_rfc3339(&text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| invalid())
        }
    }
}

fn convert_airport(value: Option<WireAirport>, field: &str) -> Result<Airport, FlightError> {
    let airport = required(value, field)?;
    let iata = required(non_empty(airport.iata), &format!("{field}.iata"))?;
    let timezone = required(non_empty(airport.timezone), &format!("{field}.timezone"))?;
    Ok(Airport {
        city: non_empty(airport.city).unwrap_or_else(|| iata.clone()),
        iata,
        icao: non_empty(airport.icao),
        name: non_empty(airport.name),
        timezone,
    })
}

fn convert_entry(
    value: Option<WireScheduleItem>,
    field: &str,
) -> Result<ScheduleEntry, FlightError> {
    let Some(item) = value else {
        return Ok(ScheduleEntry::default());
    };
    Ok(ScheduleEntry {
        original: convert_instant(item.original, &format!("{field}.original"))?,
        estimated: convert_instant(item.estimated, &format!("{field}.estimated"))?,
        actual: convert_instant(item.actual, &format!("{field}.actual"))?,
    })
}

fn convert_schedule(value: Option<WireSchedule>, field: &str) -> Result<Schedule, FlightError> {
    let schedule = required(value, field)?;
    let initial_gate_time = convert_instant(
        schedule.initial_gate_time,
        &format!("{field}.initialGateTime"),
    )?;
    Ok(Schedule {
        gate: convert_entry(schedule.gate, &format!("{field}.gate"))?,
        runway: convert_entry(schedule.runway, &format!("{field}.runway"))?,
        initial_gate_time: required(initial_gate_time, &format!("{field}.initialGateTime"))?,
    })
}

impl TryFrom<FlightDocument> for FlightSnapshot {
    type Error = FlightError;

    fn try_from(document: FlightDocument) -> Result<Self, Self::Error> {
        let flight = required(document.flight, "flight")?;

        let id = required(flight.id.map(WireText::into_string), "flight.id")?;
        let status = FlightStatus::from(required(flight.status, "flight.status")?.as_str());

        let airline = required(flight.airline, "flight.airline")?;
        let airline = Airline {
            iata: required(non_empty(airline.iata), "flight.airline.iata")?,
            icao: non_empty(airline.icao),
            name: non_empty(airline.name),
        };
        let flight_number = required(
            non_empty(flight.flight_number.map(WireText::into_string)),
            "flight.flight_number",
        )?;

        let departure = required(flight.departure, "flight.departure")?;
        let departure = Departure {
            airport: convert_airport(departure.airport, "flight.departure.airport")?,
            terminal: non_empty(departure.terminal.map(WireText::into_string)),
            gate: non_empty(departure.gate.map(WireText::into_string)),
            schedule: convert_schedule(departure.schedule, "flight.departure.schedule")?,
        };

        let arrival = required(flight.arrival, "flight.arrival")?;
        let scheduled_airport =
            convert_airport(arrival.scheduled_airport, "flight.arrival.scheduled_airport")?;
        let actual_airport = match arrival.actual_airport {
            Some(airport) => convert_airport(Some(airport), "flight.arrival.actual_airport")?,
            None => scheduled_airport.clone(),
        };
        let arrival = Arrival {
            scheduled_airport,
            actual_airport,
            terminal: non_empty(arrival.terminal.map(WireText::into_string)),
            baggage_belt: non_empty(arrival.baggage_belt.map(WireText::into_string)),
            schedule: convert_schedule(arrival.schedule, "flight.arrival.schedule")?,
        };

        let equipment = flight.equipment.map(|e| Equipment {
            model_name: non_empty(e.model_name),
            tail_number: non_empty(e.tail_number),
        });

        let position = document
            .flight_position
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                Some(Position {
                    latitude: p.latitude?,
                    longitude: p.longitude?,
                    heading: p.heading,
                })
            })
            .last();

        Ok(FlightSnapshot {
            id,
            status,
            airline,
            flight_number,
            departure,
            arrival,
            equipment,
            position,
            updated_at: convert_instant(document.update, "update")?,
            deeplink: non_empty(document.deeplink),
        })
    }
}
