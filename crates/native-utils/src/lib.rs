pub mod audio;
pub mod device;
mod player;

pub use player::CpalOutput;
