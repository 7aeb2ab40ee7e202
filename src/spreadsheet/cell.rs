use crate::database::dataset::Value;
use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

/// Types of cell data in xlsx worksheets.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as 0/1
    Boolean,
    /// Plain numeric values
    Number,
    /// Date/time values stored as serial numbers from the 1900 epoch
    NumberDateTime1900,
    /// Date values stored as serial numbers from the 1900 epoch
    NumberDate1900,
    /// Time values stored as day fractions
    NumberTime1900,
    /// Date/time values stored as serial numbers from the 1904 epoch
    NumberDateTime1904,
    /// Date values stored as serial numbers from the 1904 epoch
    NumberDate1904,
    /// Time values stored as day fractions
    NumberTime1904,
    /// ISO 8601 date/time strings (`t="d"`)
    IsoDateTime,
    /// Inline string values, also used for resolved shared strings
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values (`#N/A`, `#DIV/0!`, ...)
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format codes to determine cell type.
    /// Quoted literals, escaped characters and bracketed sections are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '"' if !is_bracket => is_literal = !is_literal,
                _ if is_literal => (),
                ']' if is_bracket => is_bracket = false,
                _ if is_bracket => (),
                '[' => is_bracket = true,
                '_' | '\\' => is_escaped = true,
                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    #[inline]
    pub(crate) fn is_number(&self) -> bool {
        matches!(self, Self::Number)
    }

    #[inline]
    pub(crate) fn is_timestamp(&self) -> bool {
        matches!(
            self,
            Self::NumberDateTime1900
                | Self::NumberDate1900
                | Self::NumberDateTime1904
                | Self::NumberDate1904
                | Self::IsoDateTime
        )
    }

    #[inline]
    pub(crate) fn is_time(&self) -> bool {
        matches!(self, Self::NumberTime1900 | Self::NumberTime1904)
    }

    #[inline]
    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// Represents a single cell in a worksheet with position, type, and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the worksheet (shared strings already resolved)
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.kind == CellType::Empty || self.kind == CellType::Error
    }

    /// True for plain numbers without a fractional part.
    pub(crate) fn is_integral(&self) -> bool {
        self.kind.is_number()
            && self.to_double().map(|value| value.fract() == 0.0 && value.abs() < 9.2e18).unwrap_or(false)
    }

    pub(crate) fn to_boolean(&self) -> bool {
        self.value == "1" || self.value.eq_ignore_ascii_case("true")
    }

    pub(crate) fn to_double(&self) -> Result<f64, String> {
        self.value.parse::<f64>().map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    pub(crate) fn to_bigint(&self) -> Result<i64, String> {
        let value = self.to_double()?;
        if value.fract() == 0.0 && value.abs() < 9.2e18 {
            Ok(value as i64)
        } else {
            Err(format!("parse '{}' to bigint failed", self.value))
        }
    }

    /// Converts serial numbers (1900/1904 epochs) and ISO strings to a timestamp.
    pub(crate) fn to_datetime(&self) -> Result<NaiveDateTime, String> {
        match self.kind {
            CellType::IsoDateTime => {
                let value = self.value.trim_end_matches('Z');
                NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|date| date.and_time(NaiveTime::MIN)))
                    .map_err(|_| format!("parse '{}' to datetime failed", self.value))
            }
            kind if kind.is_timestamp() || kind.is_time() || kind.is_number() => {
                serial_to_datetime(self.to_double()?, kind.is_1904())
                    .ok_or_else(|| format!("serial '{}' out of datetime range", self.value))
            }
            _ => Err(format!("parse '{}' to datetime failed", self.value)),
        }
    }

    /// Converts the fractional day part of a serial number to a time of day.
    pub(crate) fn to_time(&self) -> Result<NaiveTime, String> {
        let value = self.to_double()?;
        let micros = (value.fract().abs() * 86_400_000_000f64).round() as i64;
        let micros = micros.min(86_399_999_999);
        NaiveTime::from_num_seconds_from_midnight_opt((micros / 1_000_000) as u32, (micros % 1_000_000) as u32 * 1_000)
            .ok_or_else(|| format!("parse '{}' to time failed", self.value))
    }

    /// The value this cell holds on its own, without any column type applied.
    pub(crate) fn native_value(&self) -> Result<Value, String> {
        let value = match self.kind {
            CellType::Empty | CellType::Error => Value::Null,
            CellType::Boolean => Value::Bool(self.to_boolean()),
            CellType::Number if self.is_integral() => Value::Int(self.to_bigint()?),
            CellType::Number => Value::Float(self.to_double()?),
            CellType::NumberTime1900 | CellType::NumberTime1904 => Value::Time(self.to_time()?),
            CellType::InlineString | CellType::SharedString => Value::Text(self.value.to_owned()),
            _ => Value::Timestamp(self.to_datetime()?),
        };
        Ok(value)
    }
}

/// Converts an Excel serial number to a timestamp.
/// The 1900 system counts the nonexistent 1900-02-29, so serials before 60 shift by a day.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.trunc() as i64;
    let micros = ((serial - serial.trunc()) * 86_400_000_000f64).round() as i64;
    let (epoch, shift) = if is_1904 {
        (NaiveDate::from_ymd_opt(1904, 1, 1)?, 0)
    } else {
        (NaiveDate::from_ymd_opt(1899, 12, 30)?, if days < 60 { 1 } else { 0 })
    };
    epoch
        .and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::try_days(days + shift)?)?
        .checked_add_signed(Duration::microseconds(micros))
}
