//! Vehicle registry record model
//!
//! A typed projection of one record of the vehicle registry resource. The
//! datastore is loose about types (years and plates arrive as numbers or
//! strings), so every field is read as text.

use crate::upstream::Record;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One vehicle as known to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// `mispar_rechev`
    pub license_plate: String,
    /// `tozeret_nm`
    pub manufacturer: Option<String>,
    /// `kinuy_mishari`
    pub model: Option<String>,
    /// `shnat_yitzur`
    pub year: Option<String>,
    /// `tzeva_rechev`
    pub color: Option<String>,
    /// `degem_manoa`
    pub engine_model: Option<String>,
    /// `sug_delek_nm`
    pub fuel_type: Option<String>,
    /// `baalut`
    pub ownership: Option<String>,
    /// `tokef_dt`
    pub test_valid_until: Option<String>,
    /// `mivchan_acharon_dt`
    pub last_inspection: Option<String>,
    /// `sug_degem`
    pub vehicle_type: Option<String>,
    /// `degem_nm`
    pub model_code: Option<String>,
    /// `misgeret`
    pub chassis_number: Option<String>,
    /// `zmig_kidmi`
    pub front_tires: Option<String>,
    /// `zmig_ahori`
    pub rear_tires: Option<String>,
    /// `moed_aliya_lakvish`
    pub registration_date: Option<String>,
}

fn text(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl VehicleRecord {
    /// Project a raw registry record
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            license_plate: text(record, "mispar_rechev").unwrap_or_default(),
            manufacturer: text(record, "tozeret_nm"),
            model: text(record, "kinuy_mishari"),
            year: text(record, "shnat_yitzur"),
            color: text(record, "tzeva_rechev"),
            engine_model: text(record, "degem_manoa"),
            fuel_type: text(record, "sug_delek_nm"),
            ownership: text(record, "baalut"),
            test_valid_until: text(record, "tokef_dt"),
            last_inspection: text(record, "mivchan_acharon_dt"),
            vehicle_type: text(record, "sug_degem"),
            model_code: text(record, "degem_nm"),
            chassis_number: text(record, "misgeret"),
            front_tires: text(record, "zmig_kidmi"),
            rear_tires: text(record, "zmig_ahori"),
            registration_date: text(record, "moed_aliya_lakvish"),
        }
    }

    /// A record is usable when it has a plate and a manufacturer or model
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.license_plate.is_empty() && (self.manufacturer.is_some() || self.model.is_some())
    }

    /// Short headline: manufacturer, model and year, or the plate alone
    #[must_use]
    pub fn title(&self) -> String {
        let parts: Vec<&str> = [&self.manufacturer, &self.model, &self.year]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            format!("Vehicle {}", self.license_plate)
        } else {
            parts.join(" ")
        }
    }

    /// Display value of `field`, dates formatted as `dd/mm/yyyy`.
    ///
    /// [`DisplayField::DisabilityPermit`] is not part of the registry record
    /// and always yields `None`.
    #[must_use]
    pub fn display_value(&self, field: DisplayField) -> Option<String> {
        match field {
            DisplayField::Manufacturer => self.manufacturer.clone(),
            DisplayField::Model => self.model.clone(),
            DisplayField::Year => self.year.clone(),
            DisplayField::Color => self.color.clone(),
            DisplayField::EngineVolume => self.engine_model.clone(),
            DisplayField::FuelType => self.fuel_type.clone(),
            DisplayField::OwnershipType => self.ownership.clone(),
            DisplayField::TestDate => self.test_valid_until.as_deref().map(format_date),
            DisplayField::VehicleType => self.vehicle_type.clone(),
            DisplayField::FirstRegistration => self.registration_date.as_deref().map(format_date),
            DisplayField::DisabilityPermit => None,
        }
    }
}

/// Format a datastore date as `dd/mm/yyyy`.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and the year-month form
/// `YYYY-M` used for registration dates. Anything else is returned unchanged.
///
/// ```
/// use platebot_core::vehicle::format_date;
/// assert_eq!(format_date("2025-03-09"), "09/03/2025");
/// assert_eq!(format_date("2025-03-09T00:00:00"), "09/03/2025");
/// assert_eq!(format_date("2015-7"), "07/2015");
/// assert_eq!(format_date("soon"), "soon");
/// ```
#[must_use]
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    let date_part = raw.split('T').next().unwrap_or(raw);
    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return date.format("%d/%m/%Y").to_string();
    }
    if let Some((year, month)) = raw.split_once('-') {
        if let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                return date.format("%m/%Y").to_string();
            }
        }
    }
    raw.to_string()
}

/// Fields a user can choose to show in search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayField {
    /// Manufacturer
    Manufacturer,
    /// Commercial model name
    Model,
    /// Production year
    Year,
    /// Color
    Color,
    /// Engine model
    EngineVolume,
    /// Fuel type
    FuelType,
    /// Ownership type
    OwnershipType,
    /// Road test validity
    TestDate,
    /// Disability parking permit
    DisabilityPermit,
    /// Vehicle type
    VehicleType,
    /// First registration date
    FirstRegistration,
}

impl DisplayField {
    /// Every field in display order
    pub const ALL: [Self; 11] = [
        Self::Manufacturer,
        Self::Model,
        Self::Year,
        Self::Color,
        Self::EngineVolume,
        Self::FuelType,
        Self::OwnershipType,
        Self::TestDate,
        Self::DisabilityPermit,
        Self::VehicleType,
        Self::FirstRegistration,
    ];

    /// Callback name, as used in `toggle_field_<name>`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturer",
            Self::Model => "model",
            Self::Year => "year",
            Self::Color => "color",
            Self::EngineVolume => "engine_volume",
            Self::FuelType => "fuel_type",
            Self::OwnershipType => "ownership_type",
            Self::TestDate => "test_date",
            Self::DisabilityPermit => "disability_permit",
            Self::VehicleType => "vehicle_type",
            Self::FirstRegistration => "first_registration",
        }
    }

    /// Human readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manufacturer => "Manufacturer",
            Self::Model => "Model",
            Self::Year => "Year",
            Self::Color => "Color",
            Self::EngineVolume => "Engine",
            Self::FuelType => "Fuel",
            Self::OwnershipType => "Ownership",
            Self::TestDate => "Test valid until",
            Self::DisabilityPermit => "Disability permit",
            Self::VehicleType => "Vehicle type",
            Self::FirstRegistration => "On the road since",
        }
    }

    /// Whether the field is shown for a new user
    #[must_use]
    pub const fn enabled_by_default(self) -> bool {
        !matches!(self, Self::VehicleType | Self::FirstRegistration)
    }
}

impl fmt::Display for DisplayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown display field name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown display field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for DisplayField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}
