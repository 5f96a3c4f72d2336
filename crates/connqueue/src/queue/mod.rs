mod bounded;
mod ring;
mod sync;

pub use bounded::*;
