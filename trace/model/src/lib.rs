#![allow(clippy::upper_case_acronyms)]

pub mod access;
pub mod classification;
pub mod command;
pub mod device;
pub mod frame;
pub mod resource;

pub use access::{Access, AccessKind};
pub use classification::{FrameBlockUsers, SceneBlockUsers};
pub use command::Command;
pub use device::Device;
pub use frame::{Frame, Job, JobKind, Scene};
pub use resource::Resource;
