pub mod annotation;
pub mod channel;
pub mod handle;

pub use annotation::Annotation;
pub use channel::{ChannelInfo, ChannelType};
pub use handle::{EpochEvent, EpochedHandle, Recording, RecordingHandle};
