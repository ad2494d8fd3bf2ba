//! Map unit handling.

/// Ground units a map or layer is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    Inches,
    Feet,
    Miles,
    NauticalMiles,
    Meters,
    Kilometers,
    #[default]
    DecimalDegrees,
    Pixels,
}

impl Units {
    /// Inches per unit, the conversion constant used for scale arithmetic.
    pub fn inches_per_unit(self) -> f64 {
        match self {
            Units::Inches | Units::Pixels => 1.0,
            Units::Feet => 12.0,
            Units::Miles => 63360.0,
            Units::NauticalMiles => 72913.3858,
            Units::Meters => 39.3701,
            Units::Kilometers => 39370.1,
            Units::DecimalDegrees => 4374754.0,
        }
    }

    /// Parse a unit keyword as it appears in configuration files.
    pub fn parse(s: &str) -> Option<Units> {
        match s.to_ascii_lowercase().as_str() {
            "inches" => Some(Units::Inches),
            "feet" => Some(Units::Feet),
            "miles" => Some(Units::Miles),
            "nauticalmiles" => Some(Units::NauticalMiles),
            "meters" => Some(Units::Meters),
            "kilometers" => Some(Units::Kilometers),
            "dd" | "degrees" => Some(Units::DecimalDegrees),
            "pixels" => Some(Units::Pixels),
            _ => None,
        }
    }
}
