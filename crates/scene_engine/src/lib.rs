//! # Scene Engine
//!
//! Entity-component-system scene core with a multi-pass draw-list renderer.
//!
//! ## Features
//!
//! - **Generational ECS**: stale handles are detected, destruction is deferred to sync points
//! - **Transform Hierarchy**: lazily evaluated world matrices with dirty propagation
//! - **Camera Passes**: final, planar reflection and refraction views with per-pass draw lists
//! - **Renderers**: models, sun shadow maps and screen-space light volumes
//! - **Backend Agnostic**: rendering goes through the [`GraphicsDevice`](render::GraphicsDevice) trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! let mut scene = Scene::new();
//! scene.add_system(ModelRenderer::new());
//!
//! let mut bus = MessageBus::new();
//! let mut device = RecordingDevice::new();
//! loop {
//!     bus.begin_frame();
//!     for message in bus.poll() {
//!         scene.forward_message(&message);
//!     }
//!     scene.simulate(&mut bus, 1.0 / 60.0);
//!     scene.render(&mut device, None);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod events;
pub mod foundation;
pub mod render;
pub mod scene;

pub use error::{EngineError, EngineResult};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, SceneConfig},
        ecs::{
            components::{
                CameraComponent, CameraPassId, LightFactory, LightVolumeComponent, ModelComponent,
                ShadowCasterComponent, SkeletonComponent, SunlightComponent, TimedCallbackComponent,
                TransformComponent, TransformFactory,
            },
            Component, ComponentMask, Entity, System, SystemContext, World,
        },
        events::{Message, MessageBus, MessageHandler, MessageType},
        foundation::{
            math::{Mat4, Quat, Transform, Vec3, Vec4},
            time::{FrameTimer, Stopwatch},
        },
        render::{
            GraphicsDevice, LightVolumeSystem, Material, MeshData, ModelRenderer, RecordingDevice, RenderFlags,
            Renderable, ShadowMapRenderer,
        },
        scene::Scene,
        EngineError, EngineResult,
    };
}
