mod points;

pub mod helpers;
pub mod op;

pub use points::{Points, PointsConversionError, MINOR_UNITS_PER_POINT};
