//! Background Music Domain
//!
//! A looping ambience channel and a short-lived preview channel, both driven
//! through [`MediaElement`](crate::backend::MediaElement)s and kept apart from
//! the narration clock. Failures on either channel surface as a
//! [`ChannelStatus`], never as an error from the narration path.

mod controller;
mod status;
mod track;

pub use controller::BackgroundMusicController;
pub use status::{AudioIssue, BackgroundEvent, ChannelStatus, IssueKind};
pub use track::{BackgroundTrack, TrackCatalog, TrackCategory, TrackPreferences, NONE_TRACK_ID};
