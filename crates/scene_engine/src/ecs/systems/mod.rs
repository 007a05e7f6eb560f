//! Built-in simulation systems

pub mod callback_system;
pub mod camera_system;
pub mod skeletal_animator;

pub use callback_system::CallbackSystem;
pub use camera_system::CameraSystem;
pub use skeletal_animator::SkeletalAnimator;
