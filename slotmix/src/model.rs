use std::sync::Arc;

/// How a slot behaves once its clip reaches the end.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    /// Defer to the clip's own loop flag.
    #[default]
    Default,
    /// Play to the end, then stop.
    Once,
    /// Wrap around forever.
    Loop,
    /// Bounce back and forth forever.
    PingPong,
    /// Hold the last frame forever.
    ClampForever,
}

impl WrapMode {
    /// Resolves [`WrapMode::Default`] against a clip's loop flag.
    pub fn resolve(self, looping: bool) -> WrapMode {
        match self {
            Self::Default if looping => Self::Loop,
            Self::Default => Self::Once,
            other => other,
        }
    }
}

/// Opaque clip asset as seen by the mixer: only its length and wrap behavior matter.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipData {
    pub name: String,
    pub length: f32,
    pub looping: bool,
    pub wrap_mode: WrapMode,
}

impl ClipData {
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
            looping: false,
            wrap_mode: WrapMode::Default,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = wrap_mode;
        self
    }

    /// Wrap mode a new slot bound to this clip starts with.
    pub fn effective_wrap_mode(&self) -> WrapMode {
        self.wrap_mode.resolve(self.looping)
    }

    pub fn into_ref(self) -> ClipRef {
        Arc::new(self)
    }
}

/// Shared clip reference. Two references name the same asset only when they point at the same
/// allocation; equal contents are not enough.
pub type ClipRef = Arc<ClipData>;

pub(crate) fn same_clip(a: &ClipRef, b: &ClipRef) -> bool {
    Arc::ptr_eq(a, b)
}
