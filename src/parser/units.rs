//! Length units of the metadata block and their dpi conversion.

const CM_PER_INCH: f64 = 2.54;

/// Physical unit the document coordinates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Centimetre,
    Millimetre,
    Metre,
    Inch,
}

impl LengthUnit {
    /// Prefix match, case-sensitive. Millimetres are tested before metres so
    /// that `mm` and `millimetre` never fall through to `m`.
    pub fn from_prefix(unit: &str) -> Option<Self> {
        let unit = unit.trim();
        if unit.starts_with("cm") || unit.starts_with("cen") {
            Some(Self::Centimetre)
        } else if unit.starts_with("mm") || unit.starts_with("mill") {
            Some(Self::Millimetre)
        } else if unit.starts_with('m') {
            Some(Self::Metre)
        } else if unit.starts_with("in") || unit.starts_with("IN") {
            Some(Self::Inch)
        } else {
            None
        }
    }

    /// Dots per inch for `resolution` samples per unit.
    pub fn dpi(self, resolution: f64) -> f64 {
        match self {
            Self::Centimetre => resolution * CM_PER_INCH,
            Self::Millimetre => (resolution / 10.0) * CM_PER_INCH,
            Self::Metre => (resolution * 100.0) * CM_PER_INCH,
            Self::Inch => resolution,
        }
    }
}

/// Dpi for a unit string, `None` when the unit is not recognised.
pub fn resolve_dpi(unit: &str, resolution: f64) -> Option<f64> {
    LengthUnit::from_prefix(unit).map(|u| u.dpi(resolution))
}

/// Factor from document coordinates to pixels; 1 when the dpi is unresolved.
///
/// Coordinates are multiplied by `dpi / 2.54`, not by the dpi itself, so that
/// converting back with the pixel size `2.54 / dpi` returns the document value.
pub fn coordinate_scale(dpi: f64) -> f64 {
    if dpi > 0.0 {
        dpi / CM_PER_INCH
    } else {
        1.0
    }
}
