mod colors;
mod serialization;

pub use colors::DataType;
pub use serialization::{
    FileStringDisplay,
    FromFileString,
    SerializationError,
    ToFileString,
    ToHumanString,
};
