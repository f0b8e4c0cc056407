pub mod money;

pub use money::Vnd;
