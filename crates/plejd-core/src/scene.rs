//! Scene expansion
//!
//! The mesh has no "run scene" frame on this link; a scene is replayed as the
//! ordered list of device commands it stands for. Which commands those are is
//! site data owned by the caller.

use std::collections::HashMap;

use crate::codec::MeshCommand;

/// Source of scene definitions
pub trait SceneBook: Send + Sync {
    /// Commands for `scene`, in the order they must go out, or `None` if the
    /// scene is unknown
    fn steps(&self, scene: u8) -> Option<Vec<MeshCommand>>;
}

/// In-memory scene book
#[derive(Debug, Clone, Default)]
pub struct StaticSceneBook {
    scenes: HashMap<u8, Vec<MeshCommand>>,
}

impl StaticSceneBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scene(mut self, scene: u8, steps: Vec<MeshCommand>) -> Self {
        self.scenes.insert(scene, steps);
        self
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneBook for StaticSceneBook {
    fn steps(&self, scene: u8) -> Option<Vec<MeshCommand>> {
        self.scenes.get(&scene).cloned()
    }
}
