#![forbid(unsafe_code)]

//! YouTube audio extraction over HTTP: resolves a video to its best audio
//! stream through yt-dlp and reports (or relays) it.

pub mod api;
pub mod config;
pub mod diagnostics;
pub mod extractor;
pub mod formats;
pub mod normalize;
pub mod relay;
pub mod response;

#[cfg(test)]
mod test_support;
