pub mod audio;
pub mod codec;
pub mod pipeline;
pub mod shared;
