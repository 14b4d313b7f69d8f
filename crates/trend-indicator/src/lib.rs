pub mod ma;
pub mod trailing_stop;


pub use ma::*;
pub use trailing_stop::*;
