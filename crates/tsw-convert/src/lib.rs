//! Conversion layer between external columnar arrays and store primitives.
//!
//! The pieces, leaves first:
//! - [`dtype`]: compile-time tags for every supported external encoding
//! - [`primitive`]: store-side values, points and typed column buffers
//! - [`mask`] and [`masked_array`]: validity masks and their probe
//! - [`dispatch`]: runtime dtype to compile-time handler selection
//! - [`convert`]: value, array and point converters plus the text codec

pub mod array;
pub mod convert;
pub mod dispatch;
pub mod dtype;
pub mod mask;
pub mod masked_array;
pub mod primitive;

pub use array::{Array, Object};
pub use convert::{FromPrimitive, IntoPrimitive};
pub use dispatch::{by_column_type, by_dtype, ColumnVisitor, DtypeVisitor};
pub use dtype::{Dtype, DtypeDescriptor, DtypeKind};
pub use mask::{Mask, MaskProbe};
pub use masked_array::MaskedArray;
pub use primitive::{ColumnType, Point, Primitive, PrimitiveColumn, TimeRange, Timespec};
