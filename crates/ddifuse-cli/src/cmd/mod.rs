pub mod fuse;
pub mod key;
pub mod resolve;
