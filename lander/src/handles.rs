//! Code for document handles like `LDM-151`.

use phf::phf_map;

// Series codes (uppercase) mapped to the full names of the series
static SERIES_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "DMTN" => "Data Management Technical Note",
    "DMTR" => "LSST DM Test Report",
    "ITTN" => "LSST IT Technical Note",
    "LDM" => "LSST Data Management",
    "LPM" => "LSST Project Management",
    "LSE" => "LSST Systems Engineering",
    "OPSTN" => "LSST Operations Technical Note",
    "PSTN" => "Project Science Team Technical Note",
    "RTN" => "Rubin Observatory Technical Note",
    "SITCOMTN" => "Systems Integration, Testing, and Commissioning Technical Note",
    "SMTN" => "Simulations Technical Note",
    "SQR" => "SQuaRE Technical Note",
    "TESTN" => "Documentation Testing Technical Note",
    "TSTN" => "Telescope & Site Technical Note",
};

/// A handle split into its series code and serial number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentHandle {
    pub series: String,
    pub serial: String,
}

impl DocumentHandle {
    /// Splits a handle on its first hyphen. Returns `None` if there is no hyphen.
    #[must_use]
    pub fn parse(handle: &str) -> Option<Self> {
        let (series, serial) = handle.trim().split_once('-')?;
        Some(Self {
            series: series.to_owned(),
            serial: serial.to_owned(),
        })
    }

    /// The full name of the handle's series, if the series is known.
    #[must_use]
    pub fn series_name(&self) -> Option<&'static str> {
        series_name(&self.series)
    }
}

/// Looks up the full name of a document series. Series codes are case-insensitive.
#[must_use]
pub fn series_name(series: &str) -> Option<&'static str> {
    SERIES_NAMES.get(series.to_uppercase().as_str()).copied()
}
