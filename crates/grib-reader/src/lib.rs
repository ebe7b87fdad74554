//! GRIB2 field reader (WMO FM 92 GRIB Edition 2).
//!
//! Opens a downloaded archive file, finds the submessage that carries the
//! requested variable and level, and decodes it into a [`Field`]. Bit-level
//! unpacking is handled by the `grib` crate; this crate only selects
//! submessages, reads the identification header and derives grid geometry.

pub mod field;
pub mod header;
pub mod reader;
pub mod tables;

pub use field::Field;
pub use header::{parse_identification, parse_indicator, HeaderError, Identification, Indicator};
pub use reader::{FieldReader, GribFieldReader};
pub use tables::{ParameterCode, SurfaceCode};
