mod code;
mod metadata;

pub use self::code::Code;
pub use self::metadata::Metadata;
