//! Data types shared by the capture engine and its hosts.

pub mod roles;
pub mod settings;

pub use roles::{AttributeRole, RoleTables, SamplerName, TextureRole};
pub use settings::{CaptureSettings, TextureResolution};
