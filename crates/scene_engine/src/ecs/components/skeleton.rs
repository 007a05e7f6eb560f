//! Skeleton component for skinned meshes
//!
//! Stores baked animation frames (`frame_count * frame_size` bone matrices)
//! and the interpolated pose uploaded as the Skinning uniform. Playback state
//! is advanced by [`SkeletalAnimator`](crate::ecs::systems::SkeletalAnimator);
//! other code only reads it.

use crate::ecs::Component;
use crate::foundation::math::Mat4;
use crate::render::mesh::{ResourceError, ResourceResult};

/// A named range of baked frames
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalAnimation {
    /// Lookup name
    pub name: String,
    /// First baked frame
    pub start_frame: usize,
    /// Number of frames in the range
    pub frame_count: usize,
    /// Playback rate in frames per second
    pub rate: f32,
    /// Wrap around at the end instead of holding the last frame
    pub looping: bool,
}

impl SkeletalAnimation {
    /// Looping animation
    pub fn looping(name: impl Into<String>, start_frame: usize, frame_count: usize, rate: f32) -> Self {
        Self {
            name: name.into(),
            start_frame,
            frame_count,
            rate,
            looping: true,
        }
    }

    /// One-shot animation that holds its last frame
    pub fn once(name: impl Into<String>, start_frame: usize, frame_count: usize, rate: f32) -> Self {
        Self {
            looping: false,
            ..Self::looping(name, start_frame, frame_count, rate)
        }
    }

    /// Playback length in seconds (zero for a non-positive rate)
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f32 {
        if self.rate > 0.0 {
            self.frame_count as f32 / self.rate
        } else {
            0.0
        }
    }

    /// Map an unbounded playback clock back into the clip: looping clips
    /// wrap, one-shot clips stop at their end
    pub fn wrap_time(&self, time: f32) -> f32 {
        let duration = self.duration();
        if duration <= 0.0 {
            0.0
        } else if self.looping {
            time.rem_euclid(duration)
        } else {
            time.min(duration)
        }
    }
}

/// Skeleton component
#[derive(Debug, Clone)]
pub struct SkeletonComponent {
    pub(crate) frames: Vec<Mat4>,
    pub(crate) frame_size: usize,
    pub(crate) pose: Vec<Mat4>,
    pub(crate) animations: Vec<SkeletalAnimation>,
    pub(crate) current: Option<usize>,
    pub(crate) next: Option<usize>,
    pub(crate) time: f32,
    pub(crate) next_time: f32,
    pub(crate) blend_elapsed: f32,
    pub(crate) blend_duration: f32,
}

impl Component for SkeletonComponent {}

impl SkeletonComponent {
    /// Create a skeleton from baked frames of `frame_size` bones each
    ///
    /// # Errors
    /// Returns [`ResourceError::InvalidSkeleton`] for empty data or a frame
    /// buffer that is not a whole number of frames.
    pub fn new(frames: Vec<Mat4>, frame_size: usize) -> ResourceResult<Self> {
        if frame_size == 0 || frames.is_empty() || frames.len() % frame_size != 0 {
            let error = ResourceError::InvalidSkeleton(format!(
                "{} matrices do not divide into frames of {frame_size}",
                frames.len()
            ));
            log::warn!("{error}");
            return Err(error);
        }

        Ok(Self {
            pose: frames[..frame_size].to_vec(),
            frames,
            frame_size,
            animations: Vec::new(),
            current: None,
            next: None,
            time: 0.0,
            next_time: 0.0,
            blend_elapsed: 0.0,
            blend_duration: 0.0,
        })
    }

    /// Register an animation; ranges past the baked data are rejected
    pub fn add_animation(&mut self, animation: SkeletalAnimation) -> bool {
        if animation.frame_count == 0 || animation.start_frame + animation.frame_count > self.frame_count() {
            log::warn!(
                "Animation '{}' frames {}..{} exceed the {} baked frames",
                animation.name,
                animation.start_frame,
                animation.start_frame + animation.frame_count,
                self.frame_count()
            );
            return false;
        }
        self.animations.push(animation);
        true
    }

    /// Switch to an animation immediately
    pub fn play(&mut self, name: &str) -> bool {
        let Some(index) = self.find(name) else {
            log::warn!("Unknown animation '{name}'");
            return false;
        };
        self.current = Some(index);
        self.next = None;
        self.time = 0.0;
        self.blend_elapsed = 0.0;
        self.blend_duration = 0.0;
        true
    }

    /// Blend from the current animation into `name` over `duration` seconds
    pub fn cross_fade(&mut self, name: &str, duration: f32) -> bool {
        if self.current.is_none() || duration <= 0.0 {
            return self.play(name);
        }
        let Some(index) = self.find(name) else {
            log::warn!("Unknown animation '{name}'");
            return false;
        };
        self.next = Some(index);
        self.next_time = 0.0;
        self.blend_elapsed = 0.0;
        self.blend_duration = duration;
        true
    }

    /// Number of bones per frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of baked frames
    pub fn frame_count(&self) -> usize {
        self.frames.len() / self.frame_size
    }

    /// Interpolated bone palette for the Skinning uniform
    pub fn pose(&self) -> &[Mat4] {
        &self.pose
    }

    /// Name of the playing animation
    pub fn current_animation(&self) -> Option<&str> {
        self.current.map(|index| self.animations[index].name.as_str())
    }

    /// Whether a cross-fade is in progress
    pub fn is_blending(&self) -> bool {
        self.next.is_some()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.animations.iter().position(|animation| animation.name == name)
    }
}
