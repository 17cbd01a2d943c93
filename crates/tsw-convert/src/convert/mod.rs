//! Value, array and point converters.

pub mod array;
pub mod point;
pub mod unicode;
pub mod value;

pub use array::{column_to_masked, FromPrimitive, IntoPrimitive, ItemConvert};
pub use point::{point_array, split_points};
pub use value::{Convert, TryConvert};
