pub mod codec;
pub mod edition;
pub mod ids;
