//! Live-browser host for the readiness observer.
//!
//! A chromium page is probed by evaluating a snapshot script, and page
//! activity (DOM mutations, load events, router events, same-document
//! navigations) is pumped into the observer as [`nextwatch_core::HostEvent`]s.

pub mod shared;
mod chromium;

pub use chromium::{
    Attachment, BrowserSession, ChromiumProbe, HOST_EVENT_BUFFER, LaunchOptions, attach, launch, open_page,
    route_from_url, spawn_pump, wait_until_ready,
};
pub use shared::PumpConfig;
