//! Scene-level tests driving whole frames

mod frame;
mod scheduling;

use std::rc::Rc;

use crate::ecs::components::{ModelComponent, TransformComponent};
use crate::ecs::{Entity, World};
use crate::foundation::math::Vec3;
use crate::render::culling::AABB;
use crate::render::device::{BufferId, ShaderId, UniformLocation};
use crate::render::material::{BuiltinUniform, Material};
use crate::render::mesh::{MeshData, SubMesh, VertexAttribute, VertexAttributeKind};

fn cube() -> Rc<MeshData> {
    Rc::new(MeshData {
        vertex_buffer: BufferId(1),
        stride: 24,
        vertex_count: 24,
        attributes: vec![
            VertexAttribute { kind: VertexAttributeKind::Position, size: 3, offset: 0 },
            VertexAttribute { kind: VertexAttributeKind::Normal, size: 3, offset: 12 },
        ],
        submeshes: vec![SubMesh::triangles(BufferId(2), 36)],
        bounds: AABB::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)),
    })
}

fn lit_material() -> Rc<Material> {
    Rc::new(
        Material::new("lit", ShaderId(1))
            .with_uniform(BuiltinUniform::WorldView, UniformLocation(0))
            .with_uniform(BuiltinUniform::Projection, UniformLocation(1))
            .with_uniform(BuiltinUniform::SunlightViewProjection, UniformLocation(2))
            .with_uniform(BuiltinUniform::ShadowMap, UniformLocation(3))
            .with_attribute(VertexAttributeKind::Position, 0)
            .with_attribute(VertexAttributeKind::Normal, 1),
    )
}

fn depth_material() -> Rc<Material> {
    Rc::new(
        Material::new("depth", ShaderId(2))
            .with_uniform(BuiltinUniform::ViewProjection, UniformLocation(0))
            .with_attribute(VertexAttributeKind::Position, 0),
    )
}

fn spawn_model(world: &mut World, position: Vec3) -> Entity {
    let entity = world.create_entity();
    world.add_component(entity, TransformComponent::from_position(position));
    world.add_component(
        entity,
        ModelComponent::new(cube(), vec![lit_material()])
            .expect("valid mesh")
            .with_shadow_material(0, depth_material()),
    );
    entity
}
