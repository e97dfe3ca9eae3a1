use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MediaType {
    #[default]
    Default,
    Audio,
    Video,
    StreamAudio,
    StreamVideo,
    Image,
    Other,
}

impl MediaType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::StreamAudio => "stream audio",
            Self::StreamVideo => "stream video",
            Self::Image => "image",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Loop {
    #[default]
    None,
    List,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    Created,
    NotEmpty,
    Starting,
    Playing,
    Paused,
    Stopped,
    PlaybackEnded,
    Released,
}

impl QueueState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::NotEmpty => "not empty",
            Self::Starting => "starting",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::PlaybackEnded => "playback ended",
            Self::Released => "released",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Released
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Created,
    Preparing,
    Prepared,
    Playing,
    Paused,
    Stopped,
    TrackEnded,
    Released,
}

impl EngineState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Preparing => "preparing",
            Self::Prepared => "prepared",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::TrackEnded => "track ended",
            Self::Released => "released",
        }
    }

    pub fn can_play(self) -> bool {
        matches!(self, Self::Prepared | Self::Paused)
    }

    pub fn can_pause(self) -> bool {
        matches!(self, Self::Playing | Self::Preparing)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Released
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub locator: String,
    #[serde(default)]
    pub artwork: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            locator: locator.into(),
            artwork: None,
            media_type: MediaType::Default,
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Title: {}    Artist: {}", self.title, self.artist)
    }
}
