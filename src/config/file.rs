//! Configuration file management for sidecoach.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Which audio sources are streamed during a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// System/speaker output only
    #[default]
    SpeakerOnly,
    /// Microphone only
    MicOnly,
    /// Both system output and microphone
    Both,
}

impl AudioMode {
    /// Whether the microphone leg should be opened for this mode.
    pub fn wants_microphone(&self) -> bool {
        matches!(self, Self::MicOnly | Self::Both)
    }
}

impl FromStr for AudioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speaker_only" => Ok(Self::SpeakerOnly),
            "mic_only" => Ok(Self::MicOnly),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "Invalid audio mode '{other}'. Valid values: speaker_only, mic_only, both"
            )),
        }
    }
}

impl std::fmt::Display for AudioMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpeakerOnly => write!(f, "speaker_only"),
            Self::MicOnly => write!(f, "mic_only"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// JPEG compression tier for screen snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ImageQuality {
    /// Compression quality factor on a 0-1 scale.
    pub fn quality_factor(&self) -> f32 {
        match self {
            Self::Low => 0.5,
            Self::Medium => 0.7,
            Self::High => 0.9,
        }
    }
}

impl std::fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Session preferences read at session-start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPreferences {
    /// Assistant profile, e.g. "interview", "sales", "meeting"
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Response language as a BCP-47 tag, e.g. "en-US"
    #[serde(default = "default_language")]
    pub language: String,
    /// Which audio sources to stream: "speaker_only", "mic_only" or "both"
    #[serde(default)]
    pub audio_mode: AudioMode,
    /// Screen snapshot compression tier: "low", "medium" or "high"
    #[serde(default)]
    pub image_quality: ImageQuality,
    /// Extra instructions prepended to the assistant's system prompt
    #[serde(default)]
    pub custom_prompt: String,
}

fn default_profile() -> String {
    "interview".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for SessionPreferences {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            language: default_language(),
            audio_mode: AudioMode::default(),
            image_quality: ImageQuality::default(),
            custom_prompt: String::new(),
        }
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Microphone device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `sidecoach list-devices`
    /// - device name from `sidecoach list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Command that captures system output into a loopback input device.
    /// Only consulted on macOS, where the OS offers no loopback input
    /// without a helper (e.g. a BlackHole wiring script).
    #[serde(default)]
    pub loopback_helper: Option<String>,
}

fn default_device() -> String {
    "default".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            loopback_helper: None,
        }
    }
}

/// Assistant endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the assistant session endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    "https://api.sidecoach.dev/v1".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidecoachConfig {
    #[serde(default)]
    pub session: SessionPreferences,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl SidecoachConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// A missing config file yields the default configuration; the file is
    /// only required once the user wants non-default settings.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If an existing config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(&config_path)?;
        let config: SidecoachConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file.
///
/// # Errors
/// - If the config directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let config_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_path = config_dir
        .join(".config")
        .join("sidecoach")
        .join("sidecoach.toml");

    std::fs::create_dir_all(config_path.parent().unwrap())?;

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_mode_microphone_selection() {
        assert!(!AudioMode::SpeakerOnly.wants_microphone());
        assert!(AudioMode::MicOnly.wants_microphone());
        assert!(AudioMode::Both.wants_microphone());
    }

    #[test]
    fn audio_mode_parses_config_values() {
        assert_eq!("speaker_only".parse::<AudioMode>(), Ok(AudioMode::SpeakerOnly));
        assert_eq!("mic_only".parse::<AudioMode>(), Ok(AudioMode::MicOnly));
        assert_eq!("both".parse::<AudioMode>(), Ok(AudioMode::Both));
        assert!("speakers".parse::<AudioMode>().is_err());
    }

    #[test]
    fn image_quality_factors() {
        assert_eq!(ImageQuality::Low.quality_factor(), 0.5);
        assert_eq!(ImageQuality::Medium.quality_factor(), 0.7);
        assert_eq!(ImageQuality::High.quality_factor(), 0.9);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = SidecoachConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: SidecoachConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.session.profile, "interview");
        assert_eq!(parsed.session.audio_mode, AudioMode::SpeakerOnly);
        assert_eq!(parsed.session.image_quality, ImageQuality::Medium);
        assert_eq!(parsed.audio.device, "default");
    }
}
