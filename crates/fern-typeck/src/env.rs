//! Scope environment.
//!
//! Frames live in an arena and point at their parent by index. Lookup walks
//! from a frame toward the root, so an inner binding shadows an outer one
//! only for as long as the inner frame is the starting point. The root frame
//! holds the builtins and is sealed once built.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ty::Scheme;

/// Index of a frame in a [`TypeEnv`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(u32);

#[derive(Debug, Default)]
struct Frame {
    parent: Option<FrameId>,
    bindings: FxHashMap<String, Scheme>,
}

#[derive(Debug)]
pub struct TypeEnv {
    frames: Vec<Frame>,
}

impl TypeEnv {
    /// An environment whose root frame is empty.
    pub fn new() -> Self {
        Self::with_root(std::iter::empty::<(String, Scheme)>())
    }

    /// An environment whose root frame holds exactly `bindings`.
    pub fn with_root<I, S>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (S, Scheme)>,
        S: Into<String>,
    {
        let root = Frame {
            parent: None,
            bindings: bindings
                .into_iter()
                .map(|(name, scheme)| (name.into(), scheme))
                .collect(),
        };
        TypeEnv { frames: vec![root] }
    }

    pub fn root(&self) -> FrameId {
        FrameId(0)
    }

    /// Open a new, empty frame under `parent`.
    pub fn child(&mut self, parent: FrameId) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame {
            parent: Some(parent),
            bindings: FxHashMap::default(),
        });
        id
    }

    /// Discard `frame` once its scope has been checked.
    ///
    /// Frames are released innermost first, so `frame` is always the newest.
    ///
    /// # Panics
    ///
    /// Panics on the root frame.
    pub fn release(&mut self, frame: FrameId) {
        assert!(frame != self.root(), "cannot release the root frame");
        debug_assert_eq!(
            frame.0 as usize + 1,
            self.frames.len(),
            "frames must be released innermost first"
        );
        self.frames.truncate(frame.0 as usize);
    }

    /// Bind `name` in `frame`, replacing any binding of the same name there.
    ///
    /// # Panics
    ///
    /// Panics on the root frame, which is immutable after construction.
    pub fn insert(&mut self, frame: FrameId, name: impl Into<String>, scheme: Scheme) {
        assert!(frame != self.root(), "the builtin frame is immutable");
        self.frames[frame.0 as usize]
            .bindings
            .insert(name.into(), scheme);
    }

    /// The innermost binding of `name` visible from `frame`.
    pub fn lookup(&self, frame: FrameId, name: &str) -> Option<&Scheme> {
        let mut current = Some(frame);
        while let Some(id) = current {
            let frame = &self.frames[id.0 as usize];
            if let Some(scheme) = frame.bindings.get(name) {
                return Some(scheme);
            }
            current = frame.parent;
        }
        None
    }

    /// Every scheme visible from `frame`. Shadowed bindings are left out.
    pub fn visible(&self, frame: FrameId) -> Vec<&Scheme> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        let mut current = Some(frame);
        while let Some(id) = current {
            let frame = &self.frames[id.0 as usize];
            for (name, scheme) in &frame.bindings {
                if seen.insert(name.as_str()) {
                    out.push(scheme);
                }
            }
            current = frame.parent;
        }
        out
    }

    /// Number of live frames, the root included.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}
