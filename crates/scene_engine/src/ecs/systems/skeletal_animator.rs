//! Skeletal animation playback
//!
//! Advances each skeleton's playback clock, samples the baked frames with
//! linear interpolation and, while a cross-fade is active, blends the current
//! animation into the next one.

use crate::ecs::components::skeleton::{SkeletalAnimation, SkeletonComponent};
use crate::ecs::{ComponentMask, Entity, System, SystemContext};
use crate::foundation::math::Mat4;

/// Drives [`SkeletonComponent`] playback
#[derive(Debug)]
pub struct SkeletalAnimator {
    signature: ComponentMask,
}

impl Default for SkeletalAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletalAnimator {
    /// Create the system
    pub fn new() -> Self {
        Self {
            signature: ComponentMask::new().with::<SkeletonComponent>(),
        }
    }

    /// Advance one skeleton by `dt` seconds and rebuild its pose
    pub fn advance(skeleton: &mut SkeletonComponent, dt: f32) {
        let Some(current) = skeleton.current else {
            return;
        };
        skeleton.time = skeleton.animations[current].wrap_time(skeleton.time + dt);

        if let Some(next) = skeleton.next {
            skeleton.next_time = skeleton.animations[next].wrap_time(skeleton.next_time + dt);
            skeleton.blend_elapsed += dt;
            if skeleton.blend_elapsed >= skeleton.blend_duration {
                skeleton.current = Some(next);
                skeleton.time = skeleton.next_time;
                skeleton.next = None;
                skeleton.blend_elapsed = 0.0;
                skeleton.blend_duration = 0.0;
                let time = skeleton.time;
                Self::write_pose(skeleton, next, time, None);
                return;
            }
            let blend = (next, skeleton.next_time, skeleton.blend_elapsed / skeleton.blend_duration);
            let time = skeleton.time;
            Self::write_pose(skeleton, current, time, Some(blend));
            return;
        }

        let time = skeleton.time;
        Self::write_pose(skeleton, current, time, None);
    }

    fn write_pose(
        skeleton: &mut SkeletonComponent,
        animation: usize,
        time: f32,
        blend: Option<(usize, f32, f32)>,
    ) {
        let size = skeleton.frame_size;
        let (a0, a1, at) = frame_pair(&skeleton.animations[animation], time);
        let target = blend.map(|(index, next_time, weight)| {
            let (b0, b1, bt) = frame_pair(&skeleton.animations[index], next_time);
            (b0, b1, bt, weight)
        });

        for bone in 0..size {
            let mut matrix = lerp(&skeleton.frames[a0 * size + bone], &skeleton.frames[a1 * size + bone], at);
            if let Some((b0, b1, bt, weight)) = target {
                let other = lerp(&skeleton.frames[b0 * size + bone], &skeleton.frames[b1 * size + bone], bt);
                matrix = lerp(&matrix, &other, weight);
            }
            skeleton.pose[bone] = matrix;
        }
    }
}

/// Absolute frame indices around `time` and the fraction between them
fn frame_pair(animation: &SkeletalAnimation, time: f32) -> (usize, usize, f32) {
    let count = animation.frame_count;
    let position = (time * animation.rate).max(0.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let (whole, fraction) = {
        let whole = position.floor();
        (whole as usize, position - whole)
    };

    let (first, second, fraction) = if animation.looping {
        (whole % count, (whole + 1) % count, fraction)
    } else if whole + 1 >= count {
        (count - 1, count - 1, 0.0)
    } else {
        (whole, whole + 1, fraction)
    };
    (animation.start_frame + first, animation.start_frame + second, fraction)
}

fn lerp(a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
    a + (b - a) * t
}

impl System for SkeletalAnimator {
    fn name(&self) -> &'static str {
        "SkeletalAnimator"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entities: &[Entity], dt: f32) {
        for &entity in entities {
            if let Some(skeleton) = ctx.world.get_component_mut::<SkeletonComponent>(entity) {
                Self::advance(skeleton, dt);
            }
        }
    }
}
