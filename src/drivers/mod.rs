pub mod flash;

pub use flash::{Flash, FlashError};
