//! ECS Components module
//!
//! Contains all engine components

pub mod callback;
pub mod camera;
pub mod lighting;
pub mod model;
pub mod skeleton;
pub mod transform;

pub use callback::{CallbackState, TimedCallbackComponent};
pub use camera::{CameraComponent, CameraPass, CameraPassId, DrawItem, DrawList, Projection};
pub use lighting::{LightFactory, LightVolumeComponent, ShadowCasterComponent, SunlightComponent};
pub use model::ModelComponent;
pub use skeleton::{SkeletalAnimation, SkeletonComponent};
pub use transform::{TransformComponent, TransformFactory};
