//! Decoded flight state.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;

/// Flight status as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlightStatus {
    Scheduled,
    DepartureTaxiing,
    EnRoute,
    ArrivalTaxiing,
    Landed,
    /// A status string this bot does not know about yet.
    Unknown(String),
}

impl FlightStatus {
    pub fn as_str(&self) -> &str {
        match self {
            FlightStatus::Scheduled => "SCHEDULED",
            FlightStatus::DepartureTaxiing => "DEPARTURE_TAXIING",
            FlightStatus::EnRoute => "EN_ROUTE",
            FlightStatus::ArrivalTaxiing => "ARRIVAL_TAXIING",
            FlightStatus::Landed => "LANDED",
            FlightStatus::Unknown(s) => s,
        }
    }

    /// Whether this status ends tracking.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlightStatus::Landed)
    }
}

impl From<&str> for FlightStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => FlightStatus::Scheduled,
            "DEPARTURE_TAXIING" => FlightStatus::DepartureTaxiing,
            "EN_ROUTE" => FlightStatus::EnRoute,
            "ARRIVAL_TAXIING" => FlightStatus::ArrivalTaxiing,
            "LANDED" => FlightStatus::Landed,
            _ => FlightStatus::Unknown(value.to_string()),
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Airline {
    pub iata: String,
    pub icao: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Airport {
    pub iata: String,
    pub icao: Option<String>,
    pub name: Option<String>,
    /// City name. Falls back to the IATA code when upstream omits it.
    pub city: String,
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: String,
}

/// Original, estimated and actual instants of one schedule milestone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleEntry {
    pub original: Option<DateTime<Utc>>,
    pub estimated: Option<DateTime<Utc>>,
    pub actual: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub gate: ScheduleEntry,
    pub runway: ScheduleEntry,
    pub initial_gate_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub airport: Airport,
    pub terminal: Option<String>,
    pub gate: Option<String>,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub scheduled_airport: Airport,
    /// Differs from `scheduled_airport` when the flight diverted.
    pub actual_airport: Airport,
    pub terminal: Option<String>,
    pub baggage_belt: Option<String>,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Equipment {
    pub model_name: Option<String>,
    pub tail_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
}

/// One fetch worth of flight state. Built once per fetch and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSnapshot {
    pub id: String,
    pub status: FlightStatus,
    pub airline: Airline,
    pub flight_number: String,
    pub departure: Departure,
    pub arrival: Arrival,
    pub equipment: Option<Equipment>,
    /// Latest known live position.
    pub position: Option<Position>,
    /// When upstream last refreshed this flight.
    pub updated_at: Option<DateTime<Utc>>,
    pub deeplink: Option<String>,
}

impl FlightSnapshot {
    /// Human-readable designator, e.g. `UA 123`.
    pub fn label(&self) -> String {
        format!("{} {}", self.airline.iata, self.flight_number)
    }

    pub fn is_landed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn diverted(&self) -> bool {
        self.arrival.scheduled_airport.iata != self.arrival.actual_airport.iata
    }
}
