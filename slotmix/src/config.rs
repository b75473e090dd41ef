/// Mixer-wide settings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "json",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MixerConfig {
    /// Keep disabled slots' playback nodes connected to the mix (paused) instead of
    /// disconnecting them.
    pub keep_stopped_connected: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            keep_stopped_connected: true,
        }
    }
}

#[cfg(feature = "json")]
impl MixerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(json).map_err(|e| crate::Error::JsonParse {
            message: e.to_string(),
        })
    }
}
